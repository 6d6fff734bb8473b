use serde::{Deserialize, Serialize};

/// Downside risk of one price series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Largest peak-to-trough decline as a fraction of the peak, in [0, 1]
    pub max_drawdown: f64,
    /// Historical VaR as a positive loss fraction, never negative
    pub value_at_risk: f64,
}

/// Thresholds a position or portfolio must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_drawdown: f64,
    #[serde(default = "default_max_var")]
    pub max_var: f64,
}

fn default_max_var() -> f64 {
    1.0
}

impl RiskLimits {
    /// Drawdown limit only; a VaR limit of 1.0 can never be exceeded.
    pub fn new(max_drawdown: f64) -> Self {
        Self {
            max_drawdown,
            max_var: default_max_var(),
        }
    }

    pub fn with_max_var(mut self, max_var: f64) -> Self {
        self.max_var = max_var;
        self
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self::new(0.20)
    }
}
