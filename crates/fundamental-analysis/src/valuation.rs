use analysis_core::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_TERMINAL_GROWTH: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    /// Discounted explicit cash flows plus discounted terminal value
    pub enterprise_value: f64,
    /// `None` when no share count was supplied
    pub equity_value_per_share: Option<f64>,
}

fn validate_rates(discount_rate: f64, terminal_growth_rate: f64) -> AnalysisResult<()> {
    if !discount_rate.is_finite() || !terminal_growth_rate.is_finite() {
        return Err(AnalysisError::InvalidInput(format!(
            "rates must be finite (discount {}, growth {})",
            discount_rate, terminal_growth_rate
        )));
    }
    if discount_rate == terminal_growth_rate {
        return Err(AnalysisError::InvalidInput(format!(
            "discount rate equals terminal growth rate ({})",
            discount_rate
        )));
    }
    if 1.0 + discount_rate == 0.0 {
        return Err(AnalysisError::InvalidInput(
            "discount rate of -100% cannot discount".into(),
        ));
    }
    Ok(())
}

/// Gordon growth value of the flows after `last_cash_flow`, as of its period.
pub fn terminal_value(
    last_cash_flow: f64,
    discount_rate: f64,
    terminal_growth_rate: f64,
) -> AnalysisResult<f64> {
    validate_rates(discount_rate, terminal_growth_rate)?;
    Ok(last_cash_flow * (1.0 + terminal_growth_rate) / (discount_rate - terminal_growth_rate))
}

/// Present value of `cash_flows` (first entry one period out) plus the
/// terminal value of the last one, discounted back `cash_flows.len()` periods.
pub fn dcf(cash_flows: &[f64], discount_rate: f64, terminal_growth_rate: f64) -> AnalysisResult<f64> {
    validate_rates(discount_rate, terminal_growth_rate)?;
    let Some(&last) = cash_flows.last() else {
        return Ok(0.0);
    };
    if let Some(bad) = cash_flows.iter().find(|cf| !cf.is_finite()) {
        return Err(AnalysisError::InvalidInput(format!("non-finite cash flow {}", bad)));
    }

    let explicit: f64 = cash_flows
        .iter()
        .enumerate()
        .map(|(i, cf)| cf / (1.0 + discount_rate).powi(i as i32 + 1))
        .sum();

    let terminal = terminal_value(last, discount_rate, terminal_growth_rate)?;
    let terminal_pv = terminal / (1.0 + discount_rate).powi(cash_flows.len() as i32);

    debug!(explicit, terminal_pv, periods = cash_flows.len(), "DCF computed");
    Ok(explicit + terminal_pv)
}

/// `(enterprise_value - net_debt) / shares_outstanding`, or 0.0 without shares.
pub fn intrinsic_value_per_share(enterprise_value: f64, net_debt: f64, shares_outstanding: f64) -> f64 {
    if shares_outstanding == 0.0 {
        return 0.0;
    }
    (enterprise_value - net_debt) / shares_outstanding
}

/// Earnings backed by cash: operating cash flow above net income.
pub fn earnings_quality(net_income: f64, operating_cash_flow: f64) -> bool {
    operating_cash_flow > net_income
}

/// Enterprise value from projected cash flows, plus the per-share figure
/// when a share count is known.
pub fn value_company(
    cash_flows: &[f64],
    discount_rate: f64,
    terminal_growth_rate: f64,
    net_debt: f64,
    shares_outstanding: Option<f64>,
) -> AnalysisResult<ValuationResult> {
    let enterprise_value = dcf(cash_flows, discount_rate, terminal_growth_rate)?;
    Ok(ValuationResult {
        enterprise_value,
        equity_value_per_share: shares_outstanding
            .map(|shares| intrinsic_value_per_share(enterprise_value, net_debt, shares)),
    })
}
