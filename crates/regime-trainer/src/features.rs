use analysis_core::stats::{annualize, mean, population_std_dev, simple_returns};
use analysis_core::{AnalysisError, AnalysisResult};
use market_regime_detector::features::{MOMENTUM_WINDOW, VOLATILITY_WINDOW};
use market_regime_detector::model::Observation;

/// Annualized volatility of `returns[i - window..i]` for every `i >= window`.
pub fn rolling_volatility(returns: &[f64], window: usize) -> Vec<f64> {
    (window..returns.len())
        .map(|i| annualize(population_std_dev(&returns[i - window..i])))
        .collect()
}

/// `(price_i - SMA(prices[i - window..i])) / SMA` for every `i >= window`.
pub fn rolling_momentum(prices: &[f64], window: usize) -> Vec<f64> {
    (window..prices.len())
        .map(|i| {
            let sma = mean(&prices[i - window..i]);
            if sma == 0.0 {
                0.0
            } else {
                (prices[i] - sma) / sma
            }
        })
        .collect()
}

/// Stack `[return, volatility, momentum]` rows, truncated to the shortest
/// derived series and keeping the most recent values.
pub fn build_feature_matrix(prices: &[f64]) -> AnalysisResult<Vec<Observation>> {
    let returns = simple_returns(prices);
    let volatility = rolling_volatility(&returns, VOLATILITY_WINDOW);
    let momentum = rolling_momentum(prices, MOMENTUM_WINDOW);

    let len = returns.len().min(volatility.len()).min(momentum.len());
    if len == 0 {
        return Err(AnalysisError::InsufficientData(format!(
            "{} prices yield no complete feature rows (need more than {})",
            prices.len(),
            MOMENTUM_WINDOW
        )));
    }

    let tail = |series: &[f64]| series[series.len() - len..].to_vec();
    let (returns, volatility, momentum) = (tail(&returns), tail(&volatility), tail(&momentum));

    Ok((0..len)
        .map(|i| [returns[i], volatility[i], momentum[i]])
        .collect())
}
