//! Deterministic regime classification over (volatility, trend, momentum).
//!
//! Branches are evaluated top to bottom and the first match wins.

use analysis_core::{Regime, Trend};

/// Annualized volatility bands
pub const LOW_VOL_THRESHOLD: f64 = 0.12;
pub const MED_VOL_THRESHOLD: f64 = 0.20;
pub const HIGH_VOL_THRESHOLD: f64 = 0.30;

/// Momentum below this in high volatility marks a crisis even without a down trend.
pub const CRISIS_MOMENTUM_THRESHOLD: f64 = -0.10;

/// Momentum needed to confirm a trend in low volatility.
pub const LOW_VOL_MOMENTUM_THRESHOLD: f64 = 0.02;

/// Classify a regime from features, returning `(regime, confidence)`.
pub fn classify(volatility: f64, trend: Trend, momentum: f64) -> (Regime, f64) {
    // High volatility
    if volatility > HIGH_VOL_THRESHOLD {
        if trend == Trend::Down || momentum < CRISIS_MOMENTUM_THRESHOLD {
            return (Regime::Crisis, 0.88);
        }
        return (Regime::Bear, 0.75);
    }

    // Medium-high volatility
    if volatility > MED_VOL_THRESHOLD {
        return match trend {
            Trend::Down => (Regime::Bear, 0.72),
            Trend::Up => (Regime::Bull, 0.58),
            _ => (Regime::Sideways, 0.55),
        };
    }

    // Low volatility
    if volatility < LOW_VOL_THRESHOLD {
        if trend == Trend::Up && momentum > LOW_VOL_MOMENTUM_THRESHOLD {
            return (Regime::Bull, 0.82);
        }
        if trend == Trend::Down && momentum < -LOW_VOL_MOMENTUM_THRESHOLD {
            return (Regime::Bear, 0.65);
        }
        return (Regime::Sideways, 0.70);
    }

    // Medium-low volatility
    if trend == Trend::Up && momentum > 0.0 {
        (Regime::Bull, 0.68)
    } else if trend == Trend::Down && momentum < 0.0 {
        (Regime::Bear, 0.62)
    } else {
        (Regime::Sideways, 0.55)
    }
}
