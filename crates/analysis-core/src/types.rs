use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AnalysisError;

/// Market regime classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Bull,
    Bear,
    Sideways,
    /// Acute bear market with extreme volatility
    Crisis,
    /// Unable to classify (insufficient data)
    Unknown,
}

impl Regime {
    pub fn name(&self) -> &'static str {
        match self {
            Regime::Bull => "bull",
            Regime::Bear => "bear",
            Regime::Sideways => "sideways",
            Regime::Crisis => "crisis",
            Regime::Unknown => "unknown",
        }
    }

    /// Severity rank: bull < sideways < bear < crisis. Unknown ranks 0.
    pub fn severity(&self) -> u8 {
        match self {
            Regime::Unknown => 0,
            Regime::Bull => 1,
            Regime::Sideways => 2,
            Regime::Bear => 3,
            Regime::Crisis => 4,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Regime {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bull" => Ok(Regime::Bull),
            "bear" => Ok(Regime::Bear),
            "sideways" => Ok(Regime::Sideways),
            "crisis" => Ok(Regime::Crisis),
            "unknown" => Ok(Regime::Unknown),
            other => Err(AnalysisError::InvalidInput(format!("unknown regime label '{}'", other))),
        }
    }
}

/// Price direction relative to its moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Neutral,
    /// Not enough history to classify a regime at all
    InsufficientData,
}

impl Trend {
    pub fn name(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Neutral => "neutral",
            Trend::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Which classification path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    TrainedModel,
    RuleBased,
    InsufficientData,
}

/// Feature row shared by training and inference.
///
/// Field order is part of the artifact contract: `[return, volatility, momentum]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub last_return: f64,
    pub volatility: f64,
    pub momentum: f64,
}

impl FeatureVector {
    pub const LEN: usize = 3;
    pub const NAMES: [&'static str; 3] = ["return", "volatility", "momentum"];

    pub fn new(last_return: f64, volatility: f64, momentum: f64) -> Self {
        Self {
            last_return,
            volatility,
            momentum,
        }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.last_return, self.volatility, self.momentum]
    }

    pub fn from_array(row: [f64; 3]) -> Self {
        Self::new(row[0], row[1], row[2])
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Most likely hidden state for one observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatePrediction {
    pub state: usize,
    /// Posterior probability of `state` (0.0 to 1.0)
    pub probability: f64,
}

/// Regime detection output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeResult {
    pub regime: Regime,
    pub confidence: f64, // 0.0 to 1.0
    /// Annualized volatility of recent returns
    pub volatility: f64,
    pub trend: Trend,
    pub method: DetectionMethod,
}

impl RegimeResult {
    pub fn insufficient_data() -> Self {
        Self {
            regime: Regime::Unknown,
            confidence: 0.0,
            volatility: 0.0,
            trend: Trend::InsufficientData,
            method: DetectionMethod::InsufficientData,
        }
    }
}
