/// Numeric helpers shared by the feature extractor, the trainer and the risk engine.
///
/// All functions are total: empty or too-short input yields a neutral value
/// (0.0 or an empty vector) rather than NaN.
use statrs::statistics::Statistics;

/// Trading days per year used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.mean()
}

/// Population standard deviation (divides by n, not n - 1).
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.population_std_dev()
}

/// Simple moving average over the trailing `window` values.
/// Returns `None` when fewer than `window` values are available.
pub fn trailing_sma(data: &[f64], window: usize) -> Option<f64> {
    if window == 0 || data.len() < window {
        return None;
    }
    Some(mean(&data[data.len() - window..]))
}

/// Simple period-over-period returns; length is `prices.len() - 1`.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

/// Annualize a daily standard deviation.
pub fn annualize(daily_std: f64) -> f64 {
    daily_std * TRADING_DAYS_PER_YEAR.sqrt()
}
