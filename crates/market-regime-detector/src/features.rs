//! Feature extraction from closing prices.
//!
//! Pure functions; the same definitions feed the offline trainer, so any
//! change here invalidates previously trained artifacts.

use analysis_core::stats::{annualize, population_std_dev, simple_returns, trailing_sma};
use analysis_core::{FeatureVector, Trend};

pub const VOLATILITY_WINDOW: usize = 20;
pub const TREND_WINDOW: usize = 20;
pub const MOMENTUM_WINDOW: usize = 50;

/// Price must clear the SMA by 1.5% to count as a trend.
pub const TREND_UPPER_BAND: f64 = 1.015;
pub const TREND_LOWER_BAND: f64 = 0.985;

/// Annualized standard deviation of the most recent `window` returns,
/// or of all returns when fewer are available.
pub fn volatility(returns: &[f64], window: usize) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let start = returns.len().saturating_sub(window);
    annualize(population_std_dev(&returns[start..]))
}

/// Compare the current price with the SMA of the last `window` prices.
pub fn trend(prices: &[f64], window: usize) -> Trend {
    let (Some(sma), Some(&current)) = (trailing_sma(prices, window), prices.last()) else {
        return Trend::Neutral;
    };

    if current > sma * TREND_UPPER_BAND {
        Trend::Up
    } else if current < sma * TREND_LOWER_BAND {
        Trend::Down
    } else {
        Trend::Neutral
    }
}

/// Distance of the current price from its `window` SMA, as a fraction of the SMA.
pub fn momentum(prices: &[f64], window: usize) -> f64 {
    match (trailing_sma(prices, window), prices.last()) {
        (Some(sma), Some(&current)) if sma != 0.0 => (current - sma) / sma,
        _ => 0.0,
    }
}

/// All features derived from one price series.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSnapshot {
    pub returns: Vec<f64>,
    pub volatility: f64,
    pub trend: Trend,
    pub momentum: f64,
}

impl FeatureSnapshot {
    pub fn from_prices(prices: &[f64]) -> Self {
        let returns = simple_returns(prices);
        let volatility = volatility(&returns, VOLATILITY_WINDOW);
        Self {
            returns,
            volatility,
            trend: trend(prices, TREND_WINDOW),
            momentum: momentum(prices, MOMENTUM_WINDOW),
        }
    }

    /// `[latest return, volatility, momentum]`, or `None` without any return.
    pub fn feature_vector(&self) -> Option<FeatureVector> {
        self.returns
            .last()
            .map(|&r| FeatureVector::new(r, self.volatility, self.momentum))
    }
}
