use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurplusPolicy {
    PrepayLoan,
    ReinvestSurplus,
}

/// Loan and household parameters. Rates and shares are fractions
/// (7.5% is `0.075`). Salary and expenses are taken as given; callers are
/// expected to pass non-negative amounts.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub tenure_months: u32,
    pub annual_interest_rate: f64,
    pub base_monthly_salary: f64,
    pub annual_inflation_rate: f64,
    pub monthly_expenses: f64,
    pub sip_share: f64,
    pub emergency_share: Option<f64>,
    pub max_emi_share: Option<f64>,
    /// Surplus must exceed this amount before any of it is allocated.
    pub surplus_threshold: f64,
    pub surplus_policy: SurplusPolicy,
}

impl SimulationConfig {
    pub fn periodic_rate(&self) -> f64 {
        self.annual_interest_rate / 12.0
    }

    pub fn emergency_enabled(&self) -> bool {
        self.emergency_share.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub month: u32,
    pub disbursement: f64,
    pub opening_principal: f64,
    pub adjusted_salary: f64,
    pub sip_amount: f64,
    pub emergency_contribution: f64,
    pub emi: f64,
    pub interest_paid: f64,
    pub principal_paid: f64,
    pub surplus: f64,
    pub prepayment_amount: f64,
    pub reinvested_amount: f64,
    pub emergency_from_surplus: f64,
    pub emergency_fund_balance: f64,
    pub remaining_principal: f64,
}

impl LedgerRow {
    /// Copy with every money column rounded to whole currency units.
    pub fn rounded(&self) -> Self {
        Self {
            month: self.month,
            disbursement: self.disbursement.round(),
            opening_principal: self.opening_principal.round(),
            adjusted_salary: self.adjusted_salary.round(),
            sip_amount: self.sip_amount.round(),
            emergency_contribution: self.emergency_contribution.round(),
            emi: self.emi.round(),
            interest_paid: self.interest_paid.round(),
            principal_paid: self.principal_paid.round(),
            surplus: self.surplus.round(),
            prepayment_amount: self.prepayment_amount.round(),
            reinvested_amount: self.reinvested_amount.round(),
            emergency_from_surplus: self.emergency_from_surplus.round(),
            emergency_fund_balance: self.emergency_fund_balance.round(),
            remaining_principal: self.remaining_principal.round(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub total_interest_paid: f64,
    pub total_prepaid: f64,
    pub total_reinvested: f64,
    pub total_disbursed: f64,
    pub total_emi_paid: f64,
    pub emergency_fund_balance: f64,
    pub final_principal: f64,
    pub months_simulated: u32,
    pub closure_month: Option<u32>,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub summary: SimulationSummary,
    pub rows: Vec<LedgerRow>,
}

impl SimulationOutcome {
    pub fn display_rows(&self) -> Vec<LedgerRow> {
        self.rows.iter().map(LedgerRow::rounded).collect()
    }
}
