use super::error::ConfigurationError;
use super::schedule::SlabSchedule;
use super::types::{
    LedgerRow, SimulationConfig, SimulationOutcome, SimulationSummary, SurplusPolicy,
};

/// Share of an allocatable surplus that goes to the loan (or to reinvestment).
/// The remainder tops up the emergency fund when that feature is enabled.
const SURPLUS_PRINCIPAL_SHARE: f64 = 0.8;

/// Balances below this are treated as fully repaid.
const BALANCE_EPSILON: f64 = 1e-4;

#[derive(Debug, Default)]
struct LoanState {
    principal: f64,
    disbursed: f64,
    prepaid: f64,
    reinvested: f64,
    interest_paid: f64,
    emi_paid: f64,
    emergency_fund: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Instalment {
    emi: f64,
    interest: f64,
    principal: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct SurplusAllocation {
    prepayment: f64,
    reinvested: f64,
    emergency: f64,
}

pub fn simulate(
    config: &SimulationConfig,
    schedule: &SlabSchedule,
) -> Result<SimulationOutcome, ConfigurationError> {
    validate_config(config, schedule)?;

    let periodic_rate = config.periodic_rate();
    let last_slab_month = schedule.last_month().unwrap_or(0);
    let mut state = LoanState::default();
    let mut rows = Vec::with_capacity(config.tenure_months.min(1_200) as usize);
    let mut closure_month = None;

    for month in 1..=config.tenure_months {
        let disbursement = schedule.amount_at(month);
        if disbursement > 0.0 {
            tracing::debug!(target: "loan.simulate", month, disbursement, "slab disbursed");
        }
        state.principal += disbursement;
        state.disbursed += disbursement;
        let opening_principal = state.principal;

        let adjusted_salary = adjusted_salary(config, month);
        let sip_amount = config.sip_share * adjusted_salary;
        let emergency_contribution = config
            .emergency_share
            .map_or(0.0, |share| share * adjusted_salary);

        let remaining_periods = config.tenure_months - month + 1;
        let instalment = compute_instalment(
            config,
            opening_principal,
            periodic_rate,
            remaining_periods,
            adjusted_salary,
        );

        let surplus = adjusted_salary
            - config.monthly_expenses
            - sip_amount
            - emergency_contribution
            - instalment.emi;
        let after_emi = (opening_principal - instalment.principal).max(0.0);
        let allocation = allocate_surplus(config, surplus, opening_principal, after_emi);

        state.principal = after_emi - allocation.prepayment;
        if state.principal < BALANCE_EPSILON {
            state.principal = 0.0;
        }
        state.prepaid += allocation.prepayment;
        state.reinvested += allocation.reinvested;
        state.interest_paid += instalment.interest;
        state.emi_paid += instalment.emi;
        state.emergency_fund += emergency_contribution + allocation.emergency;

        rows.push(LedgerRow {
            month,
            disbursement,
            opening_principal,
            adjusted_salary,
            sip_amount,
            emergency_contribution,
            emi: instalment.emi,
            interest_paid: instalment.interest,
            principal_paid: instalment.principal,
            surplus,
            prepayment_amount: allocation.prepayment,
            reinvested_amount: allocation.reinvested,
            emergency_from_surplus: allocation.emergency,
            emergency_fund_balance: state.emergency_fund,
            remaining_principal: state.principal,
        });

        if state.principal == 0.0 && state.disbursed > 0.0 && month >= last_slab_month {
            closure_month = Some(month);
            break;
        }
    }

    let summary = SimulationSummary {
        total_interest_paid: state.interest_paid,
        total_prepaid: state.prepaid,
        total_reinvested: state.reinvested,
        total_disbursed: state.disbursed,
        total_emi_paid: state.emi_paid,
        emergency_fund_balance: state.emergency_fund,
        final_principal: state.principal,
        months_simulated: rows.len() as u32,
        closure_month,
        closed: state.principal == 0.0,
    };

    if summary.closed {
        tracing::info!(
            target: "loan.simulate",
            months = summary.months_simulated,
            interest = summary.total_interest_paid,
            prepaid = summary.total_prepaid,
            "loan closed"
        );
    } else {
        tracing::info!(
            target: "loan.simulate",
            months = summary.months_simulated,
            outstanding = summary.final_principal,
            "tenure exhausted with outstanding principal"
        );
    }

    Ok(SimulationOutcome { summary, rows })
}

/// Level payment that amortizes `principal` over `periods` at `periodic_rate`.
/// A zero rate degenerates to straight-line repayment.
pub fn annuity_payment(principal: f64, periodic_rate: f64, periods: u32) -> f64 {
    if principal <= 0.0 {
        return 0.0;
    }
    let n = periods.max(1) as f64;
    if periodic_rate.abs() < 1e-12 {
        return principal / n;
    }

    let denom = 1.0 - (1.0 + periodic_rate).powf(-n);
    if denom.abs() <= 1e-15 {
        principal / n
    } else {
        principal * periodic_rate / denom
    }
}

fn validate_config(
    config: &SimulationConfig,
    schedule: &SlabSchedule,
) -> Result<(), ConfigurationError> {
    if config.tenure_months == 0 {
        return Err(ConfigurationError::NonPositiveTenure);
    }

    for (field, value) in [
        ("annual_interest_rate", config.annual_interest_rate),
        ("base_monthly_salary", config.base_monthly_salary),
        ("annual_inflation_rate", config.annual_inflation_rate),
        ("monthly_expenses", config.monthly_expenses),
        ("sip_share", config.sip_share),
        ("surplus_threshold", config.surplus_threshold),
    ] {
        if !value.is_finite() {
            return Err(ConfigurationError::NonFinite { field, value });
        }
    }
    if let Some(value) = config.emergency_share.filter(|v| !v.is_finite()) {
        return Err(ConfigurationError::NonFinite {
            field: "emergency_share",
            value,
        });
    }
    if let Some(value) = config.max_emi_share.filter(|v| !v.is_finite()) {
        return Err(ConfigurationError::NonFinite {
            field: "max_emi_share",
            value,
        });
    }

    if let Some(month) = schedule.last_month().filter(|&m| m > config.tenure_months) {
        return Err(ConfigurationError::SlabBeyondTenure {
            month,
            tenure_months: config.tenure_months,
        });
    }
    Ok(())
}

/// Salary is revised once a year; months 1-12 earn the base salary.
fn adjusted_salary(config: &SimulationConfig, month: u32) -> f64 {
    let year = (month - 1) / 12;
    config.base_monthly_salary * (1.0 + config.annual_inflation_rate).powi(year as i32)
}

fn compute_instalment(
    config: &SimulationConfig,
    principal: f64,
    periodic_rate: f64,
    remaining_periods: u32,
    salary: f64,
) -> Instalment {
    if principal <= 0.0 {
        return Instalment::default();
    }

    let mut emi = annuity_payment(principal, periodic_rate, remaining_periods);
    if let Some(cap_share) = config.max_emi_share {
        emi = emi.min((cap_share * salary).max(0.0));
    }
    let interest = principal * periodic_rate;
    Instalment {
        emi,
        interest,
        principal: emi - interest,
    }
}

fn allocate_surplus(
    config: &SimulationConfig,
    surplus: f64,
    opening_principal: f64,
    principal_after_emi: f64,
) -> SurplusAllocation {
    if surplus <= config.surplus_threshold || opening_principal <= 0.0 {
        return SurplusAllocation::default();
    }

    let principal_share = surplus * SURPLUS_PRINCIPAL_SHARE;
    let emergency = if config.emergency_enabled() {
        surplus - principal_share
    } else {
        0.0
    };

    match config.surplus_policy {
        SurplusPolicy::PrepayLoan => SurplusAllocation {
            prepayment: principal_share.min(principal_after_emi),
            reinvested: 0.0,
            emergency,
        },
        SurplusPolicy::ReinvestSurplus => SurplusAllocation {
            prepayment: 0.0,
            reinvested: principal_share,
            emergency,
        },
    }
}
