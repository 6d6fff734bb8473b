use analysis_core::{DetectionMethod, Regime, RegimeResult, StateModel};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::artifact::RegimeModelArtifact;
use crate::config::DetectorConfig;
use crate::features::FeatureSnapshot;
use crate::strategy::{RegimeStrategy, RuleBasedStrategy, TrainedModelStrategy};

/// Minimum closing prices needed before any feature is computed.
pub const MIN_PRICES: usize = 50;

/// Market regime detector
///
/// Holds one classification strategy for its whole lifetime: a trained model
/// when an artifact was available at construction, rules otherwise. Immutable
/// after construction, so a shared reference can serve concurrent callers.
pub struct MarketRegimeDetector {
    strategy: Box<dyn RegimeStrategy>,
    min_prices: usize,
}

impl MarketRegimeDetector {
    /// Rule-based detector
    pub fn new() -> Self {
        Self::with_strategy(Box::new(RuleBasedStrategy))
    }

    pub fn with_strategy(strategy: Box<dyn RegimeStrategy>) -> Self {
        Self {
            strategy,
            min_prices: MIN_PRICES,
        }
    }

    pub fn with_artifact(artifact: RegimeModelArtifact) -> Self {
        Self::with_strategy(Box::new(TrainedModelStrategy::from_artifact(artifact)))
    }

    pub fn with_model(model: Arc<dyn StateModel>, regime_map: BTreeMap<usize, Regime>) -> Self {
        Self::with_strategy(Box::new(TrainedModelStrategy::new(model, regime_map)))
    }

    /// Load the configured artifact; a missing or invalid one leaves the
    /// detector in rule-only mode.
    pub fn from_config(config: &DetectorConfig) -> Self {
        match RegimeModelArtifact::load(&config.model_path) {
            Ok(artifact) => Self::with_artifact(artifact),
            Err(e) => {
                warn!(
                    path = %config.model_path.display(),
                    error = %e,
                    "Could not load regime model, using rule-based detection"
                );
                Self::new()
            }
        }
    }

    /// Which path `detect_regime` takes for sufficiently long input.
    pub fn mode(&self) -> DetectionMethod {
        self.strategy.method()
    }

    pub fn detect_regime(&self, prices: &[f64]) -> RegimeResult {
        if prices.len() < self.min_prices {
            debug!(
                count = prices.len(),
                required = self.min_prices,
                "Insufficient prices for regime detection"
            );
            return RegimeResult::insufficient_data();
        }
        if let Some(index) = prices.iter().position(|p| !p.is_finite() || *p <= 0.0) {
            debug!(
                index,
                price = prices[index],
                "Non-positive or non-finite price, regime unavailable"
            );
            return RegimeResult::insufficient_data();
        }

        let features = FeatureSnapshot::from_prices(prices);
        let classification = self.strategy.classify(&features);

        RegimeResult {
            regime: classification.regime,
            confidence: classification.confidence,
            volatility: features.volatility,
            trend: features.trend,
            method: classification.method,
        }
    }
}

impl Default for MarketRegimeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GaussianHmm;
    use analysis_core::{AnalysisError, AnalysisResult, FeatureVector, StatePrediction, Trend};
    use approx::assert_relative_eq;
    use chrono::Utc;
    use std::thread;

    fn geometric_prices(count: usize, growth: f64) -> Vec<f64> {
        (0..count).map(|i| 100.0 * growth.powi(i as i32)).collect()
    }

    /// Flat but violent: 100, 105, 100, 105, ...
    fn choppy_prices(count: usize) -> Vec<f64> {
        (0..count).map(|i| if i % 2 == 0 { 100.0 } else { 105.0 }).collect()
    }

    fn three_state_artifact() -> RegimeModelArtifact {
        let diag = [[0.01, 0.0, 0.0], [0.0, 0.01, 0.0], [0.0, 0.0, 0.01]];
        let model = GaussianHmm {
            start_prob: vec![1.0 / 3.0; 3],
            trans_mat: vec![vec![1.0 / 3.0; 3]; 3],
            means: vec![[0.002, 0.05, 0.05], [0.0, 0.15, 0.0], [-0.002, 0.35, -0.05]],
            covars: vec![diag; 3],
        };
        let regime_map = BTreeMap::from([(0, Regime::Bull), (1, Regime::Sideways), (2, Regime::Bear)]);
        RegimeModelArtifact::new(model, regime_map, "test", Utc::now())
    }

    #[test]
    fn test_insufficient_data() {
        let detector = MarketRegimeDetector::new();
        for count in [0, 1, 10, 49] {
            let result = detector.detect_regime(&geometric_prices(count, 1.01));
            assert_eq!(result.regime, Regime::Unknown);
            assert_eq!(result.confidence, 0.0);
            assert_eq!(result.volatility, 0.0);
            assert_eq!(result.trend, Trend::InsufficientData);
        }

        // Also short-circuits with a model loaded
        let detector = MarketRegimeDetector::with_artifact(three_state_artifact());
        let result = detector.detect_regime(&geometric_prices(49, 1.002));
        assert_eq!(result.method, DetectionMethod::InsufficientData);
    }

    #[test]
    fn test_bad_prices_yield_unknown() {
        let rules = MarketRegimeDetector::new();
        let model = MarketRegimeDetector::with_artifact(three_state_artifact());

        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            for index in [0, 55, 59] {
                let mut prices = geometric_prices(60, 1.002);
                prices[index] = bad;

                for detector in [&rules, &model] {
                    let result = detector.detect_regime(&prices);
                    assert_eq!(result.regime, Regime::Unknown);
                    assert_eq!(result.confidence, 0.0);
                    assert_eq!(result.volatility, 0.0);
                    assert_eq!(result.trend, Trend::InsufficientData);
                    assert_eq!(result.method, DetectionMethod::InsufficientData);
                }
            }
        }
    }

    #[test]
    fn test_steady_uptrend_is_bull() {
        let detector = MarketRegimeDetector::new();
        let result = detector.detect_regime(&geometric_prices(100, 1.002));

        assert_eq!(result.regime, Regime::Bull);
        assert_relative_eq!(result.confidence, 0.82);
        assert_eq!(result.trend, Trend::Up);
        assert!(result.volatility < 1e-9);
        assert_eq!(result.method, DetectionMethod::RuleBased);
    }

    #[test]
    fn test_steady_downtrend_is_bear() {
        let detector = MarketRegimeDetector::new();
        let result = detector.detect_regime(&geometric_prices(100, 0.998));

        assert_eq!(result.regime, Regime::Bear);
        assert_relative_eq!(result.confidence, 0.65);
        assert_eq!(result.trend, Trend::Down);
    }

    #[test]
    fn test_flat_is_sideways() {
        let detector = MarketRegimeDetector::new();
        let result = detector.detect_regime(&[100.0; 60]);

        assert_eq!(result.regime, Regime::Sideways);
        assert_relative_eq!(result.confidence, 0.70);
        assert_eq!(result.trend, Trend::Neutral);
    }

    #[test]
    fn test_choppy_market() {
        let detector = MarketRegimeDetector::new();

        // Ends on a drop: price below its SMA
        let result = detector.detect_regime(&choppy_prices(61));
        assert_eq!(result.regime, Regime::Crisis);
        assert_eq!(result.trend, Trend::Down);
        assert!(result.volatility > 0.30);

        // Ends on a rally: above the SMA, modest momentum
        let result = detector.detect_regime(&choppy_prices(60));
        assert_eq!(result.regime, Regime::Bear);
        assert_relative_eq!(result.confidence, 0.75);
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let prices = choppy_prices(61);
        let rules = MarketRegimeDetector::new();
        assert_eq!(rules.detect_regime(&prices), rules.detect_regime(&prices));

        let model = MarketRegimeDetector::with_artifact(three_state_artifact());
        let up = geometric_prices(120, 1.002);
        assert_eq!(model.detect_regime(&up), model.detect_regime(&up));
    }

    #[test]
    fn test_trained_model_path() {
        let detector = MarketRegimeDetector::with_artifact(three_state_artifact());
        assert_eq!(detector.mode(), DetectionMethod::TrainedModel);

        let result = detector.detect_regime(&geometric_prices(100, 1.002));
        assert_eq!(result.method, DetectionMethod::TrainedModel);
        assert_eq!(result.regime, Regime::Bull);
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
    }

    #[test]
    fn test_trained_model_crisis_override() {
        let detector = MarketRegimeDetector::with_artifact(three_state_artifact());
        let result = detector.detect_regime(&choppy_prices(61));

        // Volatility is far above every state mean, the bear state is closest
        assert_eq!(result.method, DetectionMethod::TrainedModel);
        assert_eq!(result.regime, Regime::Crisis);
        assert!(result.confidence <= 0.95);
    }

    struct FailingModel;

    impl StateModel for FailingModel {
        fn predict_state(&self, _features: &FeatureVector) -> AnalysisResult<StatePrediction> {
            Err(AnalysisError::InferenceFailure("model raised".into()))
        }
    }

    #[test]
    fn test_inference_failure_falls_back() {
        let detector = MarketRegimeDetector::with_model(
            Arc::new(FailingModel),
            BTreeMap::from([(0, Regime::Bull)]),
        );
        let result = detector.detect_regime(&geometric_prices(100, 1.002));

        assert_eq!(result.method, DetectionMethod::RuleBased);
        assert_eq!(result.regime, Regime::Bull);
        assert_relative_eq!(result.confidence, 0.82);
        assert_eq!(detector.mode(), DetectionMethod::TrainedModel);
    }

    #[test]
    fn test_from_config_missing_artifact_uses_rules() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig {
            model_path: dir.path().join("missing.json"),
        };
        let detector = MarketRegimeDetector::from_config(&config);
        assert_eq!(detector.mode(), DetectionMethod::RuleBased);
    }

    #[test]
    fn test_from_config_corrupt_artifact_uses_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regime_hmm.json");
        std::fs::write(&path, b"\x00garbage").unwrap();

        let detector = MarketRegimeDetector::from_config(&DetectorConfig { model_path: path });
        assert_eq!(detector.mode(), DetectionMethod::RuleBased);
    }

    #[test]
    fn test_from_config_loads_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regime_hmm.json");
        three_state_artifact().save(&path).unwrap();

        let detector = MarketRegimeDetector::from_config(&DetectorConfig { model_path: path });
        assert_eq!(detector.mode(), DetectionMethod::TrainedModel);
    }

    #[test]
    fn test_shared_across_threads() {
        let detector = Arc::new(MarketRegimeDetector::with_artifact(three_state_artifact()));
        let expected = detector.detect_regime(&geometric_prices(100, 1.002));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let detector = Arc::clone(&detector);
                thread::spawn(move || detector.detect_regime(&geometric_prices(100, 1.002)))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
