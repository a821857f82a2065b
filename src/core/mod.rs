mod engine;
mod error;
mod schedule;
mod types;

pub use engine::{annuity_payment, simulate};
pub use error::ConfigurationError;
pub use schedule::SlabSchedule;
pub use types::{LedgerRow, SimulationConfig, SimulationOutcome, SimulationSummary, SurplusPolicy};
