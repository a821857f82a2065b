use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum, error::ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::net::TcpListener;

use crate::core::{
    LedgerRow, SimulationConfig, SimulationOutcome, SimulationSummary, SlabSchedule,
    SurplusPolicy, simulate,
};
use crate::export::ledger_csv_string;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliSurplusPolicy {
    PrepayLoan,
    ReinvestSurplus,
}

impl From<CliSurplusPolicy> for SurplusPolicy {
    fn from(value: CliSurplusPolicy) -> Self {
        match value {
            CliSurplusPolicy::PrepayLoan => SurplusPolicy::PrepayLoan,
            CliSurplusPolicy::ReinvestSurplus => SurplusPolicy::ReinvestSurplus,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiSurplusPolicy {
    #[serde(alias = "prepayLoan", alias = "prepay_loan", alias = "prepay")]
    PrepayLoan,
    #[serde(alias = "reinvestSurplus", alias = "reinvest_surplus", alias = "reinvest")]
    ReinvestSurplus,
}

impl From<ApiSurplusPolicy> for CliSurplusPolicy {
    fn from(value: ApiSurplusPolicy) -> Self {
        match value {
            ApiSurplusPolicy::PrepayLoan => CliSurplusPolicy::PrepayLoan,
            ApiSurplusPolicy::ReinvestSurplus => CliSurplusPolicy::ReinvestSurplus,
        }
    }
}

/// Slab lists arrive either as JSON arrays or as comma-separated strings
/// (query strings and form-style clients).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ListInput<T> {
    Delimited(String),
    Items(Vec<T>),
}

impl<T: FromStr> ListInput<T> {
    fn into_values(self, name: &str) -> Result<Vec<T>, String> {
        match self {
            ListInput::Items(items) => Ok(items),
            ListInput::Delimited(raw) => parse_delimited(&raw, name),
        }
    }
}

fn parse_delimited<T: FromStr>(raw: &str, name: &str) -> Result<Vec<T>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| format!("{name}: could not parse '{s}'"))
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    slab_amounts: Option<ListInput<f64>>,
    slab_months: Option<ListInput<i64>>,
    tenure_years: Option<u32>,
    interest_rate: Option<f64>,
    monthly_salary: Option<f64>,
    inflation_rate: Option<f64>,
    expenses: Option<f64>,
    sip_percent: Option<f64>,
    emergency_percent: Option<f64>,
    max_emi_percent: Option<f64>,
    surplus_threshold: Option<f64>,
    surplus_policy: Option<ApiSurplusPolicy>,
}

#[derive(Parser, Debug)]
#[command(
    name = "homeloan",
    about = "Month-by-month projection of a slab-disbursed home loan against an inflating salary"
)]
struct Cli {
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [750_000.0, 1_500_000.0, 1_500_000.0, 1_200_000.0, 1_200_000.0, 1_200_000.0],
        help = "Slab amounts, comma-separated"
    )]
    slab_amounts: Vec<f64>,
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        default_values_t = [1, 2, 6, 12, 18, 24],
        help = "Disbursement month of each slab, comma-separated and paired with --slab-amounts"
    )]
    slab_months: Vec<i64>,
    #[arg(long, default_value_t = 20, help = "Loan tenure in years")]
    tenure_years: u32,
    #[arg(long, default_value_t = 7.5, help = "Annual interest rate in percent")]
    interest_rate: f64,
    #[arg(long, default_value_t = 150_000.0, help = "Initial monthly salary")]
    monthly_salary: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Annual salary inflation in percent, applied once per year"
    )]
    inflation_rate: f64,
    #[arg(long, default_value_t = 30_000.0, help = "Fixed monthly expenses")]
    expenses: f64,
    #[arg(long, default_value_t = 20.0, help = "SIP contribution in percent of salary")]
    sip_percent: f64,
    #[arg(
        long,
        help = "Emergency buffer contribution in percent of salary; enables the emergency fund"
    )]
    emergency_percent: Option<f64>,
    #[arg(long, default_value = "50", help = "Cap on EMI in percent of salary")]
    max_emi_percent: Option<f64>,
    #[arg(
        long,
        default_value_t = 5_000.0,
        help = "Monthly surplus must exceed this before it is prepaid or reinvested"
    )]
    surplus_threshold: f64,
    #[arg(long, value_enum, default_value_t = CliSurplusPolicy::PrepayLoan)]
    surplus_policy: CliSurplusPolicy,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug)]
struct ApiRequest {
    config: SimulationConfig,
    schedule: SlabSchedule,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    surplus_policy: SurplusPolicy,
    tenure_months: u32,
    slab_count: usize,
    summary: SimulationSummary,
    rows: Vec<LedgerRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(cli: &Cli) -> Result<ApiRequest, String> {
    if !(1..=100).contains(&cli.tenure_years) {
        return Err("--tenure-years must be between 1 and 100".to_string());
    }

    if !cli.interest_rate.is_finite() || cli.interest_rate < 0.0 {
        return Err("--interest-rate must be >= 0".to_string());
    }

    if !cli.monthly_salary.is_finite() || cli.monthly_salary < 0.0 {
        return Err("--monthly-salary must be >= 0".to_string());
    }

    if !cli.inflation_rate.is_finite() || cli.inflation_rate <= -100.0 {
        return Err("--inflation-rate must be > -100".to_string());
    }

    if !cli.expenses.is_finite() || cli.expenses < 0.0 {
        return Err("--expenses must be >= 0".to_string());
    }

    if !(0.0..=50.0).contains(&cli.sip_percent) {
        return Err("--sip-percent must be between 0 and 50".to_string());
    }

    if let Some(pct) = cli.emergency_percent {
        if !(0.0..=50.0).contains(&pct) {
            return Err("--emergency-percent must be between 0 and 50".to_string());
        }
    }

    if let Some(pct) = cli.max_emi_percent {
        if !(0.0..=100.0).contains(&pct) {
            return Err("--max-emi-percent must be between 0 and 100".to_string());
        }
    }

    if !cli.surplus_threshold.is_finite() || cli.surplus_threshold < 0.0 {
        return Err("--surplus-threshold must be >= 0".to_string());
    }

    let schedule = SlabSchedule::from_pairs(&cli.slab_amounts, &cli.slab_months)
        .map_err(|e| format!("invalid slab schedule: {e}"))?;

    let config = SimulationConfig {
        tenure_months: cli.tenure_years * 12,
        annual_interest_rate: cli.interest_rate / 100.0,
        base_monthly_salary: cli.monthly_salary,
        annual_inflation_rate: cli.inflation_rate / 100.0,
        monthly_expenses: cli.expenses,
        sip_share: cli.sip_percent / 100.0,
        emergency_share: cli.emergency_percent.map(|p| p / 100.0),
        max_emi_share: cli.max_emi_percent.map(|p| p / 100.0),
        surplus_threshold: cli.surplus_threshold,
        surplus_policy: cli.surplus_policy.into(),
    };

    Ok(ApiRequest { config, schedule })
}

/// Parses command-line flags, runs one simulation and renders it in the
/// requested format. `--help` output is returned as the rendered text.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return Ok(e.to_string());
        }
        Err(e) => return Err(e.to_string()),
    };
    let request = build_request(&cli)?;
    let outcome = simulate(&request.config, &request.schedule).map_err(|e| e.to_string())?;

    match cli.format {
        OutputFormat::Table => Ok(render_table(&outcome)),
        OutputFormat::Json => {
            let response = build_simulate_response(&request, outcome);
            serde_json::to_string_pretty(&response).map_err(|e| e.to_string())
        }
        OutputFormat::Csv => ledger_csv_string(&outcome.rows).map_err(|e| e.to_string()),
    }
}

fn render_table(outcome: &SimulationOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5} {:>12} {:>12} {:>10} {:>9} {:>9} {:>9} {:>9} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "Month",
        "Disbursed",
        "Opening",
        "Salary",
        "SIP",
        "EMI",
        "Interest",
        "Principal",
        "Prepaid",
        "Reinvested",
        "Emergency",
        "EmergFund",
        "Remaining"
    );
    for row in outcome.display_rows() {
        let _ = writeln!(
            out,
            "{:>5} {:>12.0} {:>12.0} {:>10.0} {:>9.0} {:>9.0} {:>9.0} {:>9.0} {:>10.0} {:>10.0} {:>10.0} {:>10.0} {:>12.0}",
            row.month,
            row.disbursement,
            row.opening_principal,
            row.adjusted_salary,
            row.sip_amount,
            row.emi,
            row.interest_paid,
            row.principal_paid,
            row.prepayment_amount,
            row.reinvested_amount,
            row.emergency_contribution + row.emergency_from_surplus,
            row.emergency_fund_balance,
            row.remaining_principal
        );
    }

    let summary = &outcome.summary;
    let _ = writeln!(out);
    let _ = writeln!(out, "Total disbursed:     {:.0}", summary.total_disbursed);
    let _ = writeln!(out, "Total interest paid: {:.0}", summary.total_interest_paid);
    let _ = writeln!(out, "Total prepaid:       {:.0}", summary.total_prepaid);
    let _ = writeln!(out, "Total reinvested:    {:.0}", summary.total_reinvested);
    let _ = writeln!(out, "Emergency fund:      {:.0}", summary.emergency_fund_balance);
    match summary.closure_month {
        Some(month) => {
            let _ = writeln!(out, "Loan closed in month {month}");
        }
        None if summary.closed => {
            let _ = writeln!(out, "Nothing was disbursed");
        }
        None => {
            let _ = writeln!(
                out,
                "Loan open after {} months, outstanding {:.0}",
                summary.months_simulated, summary.final_principal
            );
        }
    }
    out
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(target: "loan.api", %addr, "home loan HTTP API listening");
    tracing::info!(target: "loan.api", "local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/simulate.csv",
            get(simulate_csv_get_handler).post(simulate_csv_post_handler),
        )
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn simulate_csv_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_csv_handler_impl(payload)
}

async fn simulate_csv_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_csv_handler_impl(payload)
}

fn run_payload(payload: SimulatePayload) -> Result<(ApiRequest, SimulationOutcome), String> {
    let request = api_request_from_payload(payload)?;
    let outcome = simulate(&request.config, &request.schedule).map_err(|e| e.to_string())?;
    Ok((request, outcome))
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    match run_payload(payload) {
        Ok((request, outcome)) => {
            json_response(StatusCode::OK, build_simulate_response(&request, outcome))
        }
        Err(msg) => {
            tracing::debug!(target: "loan.api", error = %msg, "rejected simulate request");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn simulate_csv_handler_impl(payload: SimulatePayload) -> Response {
    let (_, outcome) = match run_payload(payload) {
        Ok(result) => result,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match ledger_csv_string(&outcome.rows) {
        Ok(body) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"amortization.csv\"",
                ),
            ],
            body,
        )),
        Err(e) => {
            tracing::error!(target: "loan.api", error = %e, "failed to encode ledger csv");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode ledger")
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.slab_amounts {
        cli.slab_amounts = v.into_values("slabAmounts")?;
    }
    if let Some(v) = payload.slab_months {
        cli.slab_months = v.into_values("slabMonths")?;
    }
    if let Some(v) = payload.tenure_years {
        cli.tenure_years = v;
    }
    if let Some(v) = payload.interest_rate {
        cli.interest_rate = v;
    }
    if let Some(v) = payload.monthly_salary {
        cli.monthly_salary = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.expenses {
        cli.expenses = v;
    }
    if let Some(v) = payload.sip_percent {
        cli.sip_percent = v;
    }
    if let Some(v) = payload.emergency_percent {
        cli.emergency_percent = Some(v);
    }
    if let Some(v) = payload.max_emi_percent {
        cli.max_emi_percent = Some(v);
    }
    if let Some(v) = payload.surplus_threshold {
        cli.surplus_threshold = v;
    }
    if let Some(v) = payload.surplus_policy {
        cli.surplus_policy = v.into();
    }

    build_request(&cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        slab_amounts: vec![
            750_000.0,
            1_500_000.0,
            1_500_000.0,
            1_200_000.0,
            1_200_000.0,
            1_200_000.0,
        ],
        slab_months: vec![1, 2, 6, 12, 18, 24],
        tenure_years: 20,
        interest_rate: 7.5,
        monthly_salary: 150_000.0,
        inflation_rate: 6.0,
        expenses: 30_000.0,
        sip_percent: 20.0,
        emergency_percent: None,
        max_emi_percent: Some(50.0),
        surplus_threshold: 5_000.0,
        surplus_policy: CliSurplusPolicy::PrepayLoan,
        format: OutputFormat::Json,
    }
}

fn build_simulate_response(request: &ApiRequest, outcome: SimulationOutcome) -> SimulateResponse {
    SimulateResponse {
        surplus_policy: request.config.surplus_policy,
        tenure_months: request.config.tenure_months,
        slab_count: request.schedule.len(),
        rows: outcome.display_rows(),
        summary: outcome.summary,
    }
}
