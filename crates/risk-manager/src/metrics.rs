//! Drawdown and historical Value-at-Risk.
//!
//! All results are fractions (0.25 = 25%), not percentages.

use analysis_core::stats::simple_returns;
use tracing::debug;

use crate::models::{RiskLimits, RiskMetrics};

pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Largest decline from a running peak, as a fraction of that peak.
///
/// Single forward pass; 0.0 for empty input or a never-falling series.
pub fn max_drawdown(prices: &[f64]) -> f64 {
    let Some(&first) = prices.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0;

    for &price in prices {
        if price > peak {
            peak = price;
        }
        if peak > 0.0 {
            let drawdown = (peak - price) / peak;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }
    }

    max_dd
}

/// Historical-simulation VaR.
///
/// Sorts `returns` ascending and reports the loss at
/// `floor((1 - confidence_level) * n)`, floored at 0.0 so a net-positive
/// tail never reports a negative VaR. Empty input gives 0.0.
pub fn value_at_risk(returns: &[f64], confidence_level: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    // Negative or NaN products saturate to 0 in the cast
    let index = (((1.0 - confidence_level) * sorted.len() as f64).floor() as usize)
        .min(sorted.len() - 1);

    (-sorted[index]).max(0.0)
}

/// True when either limit is exceeded (strictly greater than).
pub fn check_violation(
    current_drawdown: f64,
    max_allowed_drawdown: f64,
    current_var: f64,
    max_allowed_var: f64,
) -> bool {
    if current_drawdown > max_allowed_drawdown {
        debug!(current_drawdown, max_allowed_drawdown, "Drawdown limit exceeded");
        return true;
    }
    if current_var > max_allowed_var {
        debug!(current_var, max_allowed_var, "VaR limit exceeded");
        return true;
    }
    false
}

impl RiskMetrics {
    /// Both metrics from one price series; returns are derived internally.
    pub fn from_prices(prices: &[f64], confidence_level: f64) -> Self {
        let returns = simple_returns(prices);
        Self {
            max_drawdown: max_drawdown(prices),
            value_at_risk: value_at_risk(&returns, confidence_level),
        }
    }

    pub fn violates(&self, limits: &RiskLimits) -> bool {
        limits.is_violated_by(self.max_drawdown, self.value_at_risk)
    }
}

impl RiskLimits {
    pub fn is_violated_by(&self, current_drawdown: f64, current_var: f64) -> bool {
        check_violation(current_drawdown, self.max_drawdown, current_var, self.max_var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        // Peak 110, trough 85
        let dd = max_drawdown(&[100.0, 105.0, 110.0, 90.0, 85.0, 95.0, 100.0]);
        assert_relative_eq!(dd, 25.0 / 110.0, epsilon = 1e-12);
    }

    #[test]
    fn test_max_drawdown_edge_cases() {
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_eq!(max_drawdown(&[42.0]), 0.0);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0, 4.0]), 0.0);
        assert_relative_eq!(max_drawdown(&[100.0, 50.0, 200.0, 150.0]), 0.5);
    }

    #[test]
    fn test_var_worst_return_at_95() {
        // floor(0.05 * 5) = 0: the worst observed return
        let var = value_at_risk(&[-0.05, 0.02, 0.03, -0.01, -0.02], 0.95);
        assert_relative_eq!(var, 0.05);
    }

    #[test]
    fn test_var_index_from_confidence() {
        let returns: Vec<f64> = (1..=100).map(|i| -(i as f64) / 1000.0).collect();
        // Sorted ascending the 6th entry (index 5) is -0.095
        assert_relative_eq!(value_at_risk(&returns, 0.95), 0.095, epsilon = 1e-12);
        assert_relative_eq!(value_at_risk(&returns, 0.99), 0.099, epsilon = 1e-12);
    }

    #[test]
    fn test_var_floored_at_zero() {
        assert_eq!(value_at_risk(&[0.01, 0.02, 0.03], 0.95), 0.0);
        assert_eq!(value_at_risk(&[], 0.95), 0.0);
    }

    #[test]
    fn test_var_confidence_out_of_range_is_clamped() {
        let returns = [-0.04, -0.01, 0.02];
        // Index past the end clamps to the best return, floored at 0
        assert_eq!(value_at_risk(&returns, -1.0), 0.0);
        // Negative index saturates to the worst return
        assert_relative_eq!(value_at_risk(&returns, 1.5), 0.04);
    }

    #[test]
    fn test_check_violation_is_strict() {
        assert!(!check_violation(0.10, 0.10, 0.0, 1.0));
        assert!(check_violation(0.11, 0.10, 0.0, 1.0));
        assert!(check_violation(0.05, 0.10, 0.06, 0.05));
        assert!(!check_violation(0.05, 0.10, 0.05, 0.05));
    }
}
