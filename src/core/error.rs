use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("slab schedule has {amounts} amounts but {months} months")]
    MismatchedSlabs { amounts: usize, months: usize },

    #[error("slab {index} has non-positive or out-of-range month {month}")]
    NonPositiveMonth { index: usize, month: i64 },

    #[error("slab {index} has invalid amount {amount}; amounts must be finite and >= 0")]
    InvalidAmount { index: usize, amount: f64 },

    #[error("slab at month {month} falls outside a tenure of {tenure_months} months")]
    SlabBeyondTenure { month: u32, tenure_months: u32 },

    #[error("tenure must be at least one month")]
    NonPositiveTenure,

    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },
}
