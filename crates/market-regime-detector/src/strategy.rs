//! Classification strategies, chosen once when the detector is built.

use analysis_core::{AnalysisError, AnalysisResult, DetectionMethod, Regime, StateModel};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::artifact::RegimeModelArtifact;
use crate::features::FeatureSnapshot;
use crate::rules::{self, HIGH_VOL_THRESHOLD};

/// Confidence bump and cap applied when a bear state is upgraded to crisis.
pub const CRISIS_CONFIDENCE_BOOST: f64 = 0.1;
pub const CRISIS_CONFIDENCE_CAP: f64 = 0.95;

/// Outcome of one classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub regime: Regime,
    pub confidence: f64,
    pub method: DetectionMethod,
}

pub trait RegimeStrategy: Send + Sync {
    fn classify(&self, features: &FeatureSnapshot) -> Classification;

    fn method(&self) -> DetectionMethod;
}

/// Deterministic decision tree over volatility, trend and momentum.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedStrategy;

impl RegimeStrategy for RuleBasedStrategy {
    fn classify(&self, features: &FeatureSnapshot) -> Classification {
        let (regime, confidence) =
            rules::classify(features.volatility, features.trend, features.momentum);
        Classification {
            regime,
            confidence,
            method: DetectionMethod::RuleBased,
        }
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::RuleBased
    }
}

/// Queries a trained state model; any inference error falls back to the rules
/// for that call only.
pub struct TrainedModelStrategy {
    model: Arc<dyn StateModel>,
    regime_map: BTreeMap<usize, Regime>,
    fallback: RuleBasedStrategy,
}

impl TrainedModelStrategy {
    pub fn new(model: Arc<dyn StateModel>, regime_map: BTreeMap<usize, Regime>) -> Self {
        Self {
            model,
            regime_map,
            fallback: RuleBasedStrategy,
        }
    }

    pub fn from_artifact(artifact: RegimeModelArtifact) -> Self {
        Self::new(Arc::new(artifact.model), artifact.regime_map)
    }

    fn infer(&self, features: &FeatureSnapshot) -> AnalysisResult<(Regime, f64)> {
        let vector = features
            .feature_vector()
            .ok_or_else(|| AnalysisError::InferenceFailure("no returns to build features".into()))?;

        let prediction = self.model.predict_state(&vector)?;
        let regime = *self.regime_map.get(&prediction.state).ok_or_else(|| {
            AnalysisError::InferenceFailure(format!(
                "state {} has no regime mapping",
                prediction.state
            ))
        })?;

        Ok(apply_crisis_override(
            regime,
            prediction.probability,
            features.volatility,
        ))
    }
}

impl RegimeStrategy for TrainedModelStrategy {
    fn classify(&self, features: &FeatureSnapshot) -> Classification {
        match self.infer(features) {
            Ok((regime, confidence)) => Classification {
                regime,
                confidence,
                method: DetectionMethod::TrainedModel,
            },
            Err(e) => {
                warn!(error = %e, "Regime model inference failed, using rules");
                self.fallback.classify(features)
            }
        }
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::TrainedModel
    }
}

/// Trained states do not separate ordinary bear markets from crises;
/// extreme volatility does.
pub fn apply_crisis_override(regime: Regime, confidence: f64, volatility: f64) -> (Regime, f64) {
    if volatility > HIGH_VOL_THRESHOLD && regime == Regime::Bear {
        (
            Regime::Crisis,
            (confidence + CRISIS_CONFIDENCE_BOOST).min(CRISIS_CONFIDENCE_CAP),
        )
    } else {
        (regime, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{FeatureVector, StatePrediction, Trend};
    use approx::assert_relative_eq;

    struct FixedModel(AnalysisResult<StatePrediction>);

    impl StateModel for FixedModel {
        fn predict_state(&self, _features: &FeatureVector) -> AnalysisResult<StatePrediction> {
            self.0.clone()
        }
    }

    fn regime_map() -> BTreeMap<usize, Regime> {
        BTreeMap::from([(0, Regime::Bull), (1, Regime::Sideways), (2, Regime::Bear)])
    }

    fn snapshot(volatility: f64, trend: Trend, momentum: f64) -> FeatureSnapshot {
        FeatureSnapshot {
            returns: vec![0.01, -0.02],
            volatility,
            trend,
            momentum,
        }
    }

    fn strategy(result: AnalysisResult<StatePrediction>) -> TrainedModelStrategy {
        TrainedModelStrategy::new(Arc::new(FixedModel(result)), regime_map())
    }

    #[test]
    fn test_model_state_is_mapped() {
        let s = strategy(Ok(StatePrediction { state: 0, probability: 0.77 }));
        let c = s.classify(&snapshot(0.10, Trend::Up, 0.05));
        assert_eq!(c.regime, Regime::Bull);
        assert_relative_eq!(c.confidence, 0.77);
        assert_eq!(c.method, DetectionMethod::TrainedModel);
    }

    #[test]
    fn test_bear_upgraded_to_crisis_in_high_volatility() {
        let s = strategy(Ok(StatePrediction { state: 2, probability: 0.80 }));
        let c = s.classify(&snapshot(0.45, Trend::Down, -0.2));
        assert_eq!(c.regime, Regime::Crisis);
        assert_relative_eq!(c.confidence, 0.90, epsilon = 1e-12);

        let capped = strategy(Ok(StatePrediction { state: 2, probability: 0.90 }));
        let c = capped.classify(&snapshot(0.45, Trend::Down, -0.2));
        assert_relative_eq!(c.confidence, 0.95);
    }

    #[test]
    fn test_bear_kept_below_high_volatility() {
        let s = strategy(Ok(StatePrediction { state: 2, probability: 0.80 }));
        let c = s.classify(&snapshot(0.30, Trend::Down, -0.2));
        assert_eq!(c.regime, Regime::Bear);
        assert_relative_eq!(c.confidence, 0.80);
    }

    #[test]
    fn test_non_bear_not_upgraded() {
        let s = strategy(Ok(StatePrediction { state: 1, probability: 0.6 }));
        let c = s.classify(&snapshot(0.50, Trend::Down, -0.2));
        assert_eq!(c.regime, Regime::Sideways);
    }

    #[test]
    fn test_inference_error_falls_back_to_rules() {
        let s = strategy(Err(AnalysisError::InferenceFailure("boom".into())));
        let c = s.classify(&snapshot(0.35, Trend::Down, 0.0));
        assert_eq!(c.method, DetectionMethod::RuleBased);
        assert_eq!((c.regime, c.confidence), (Regime::Crisis, 0.88));

        // The model is still consulted on the next call
        assert_eq!(s.method(), DetectionMethod::TrainedModel);
    }

    #[test]
    fn test_unmapped_state_falls_back_to_rules() {
        let s = strategy(Ok(StatePrediction { state: 9, probability: 0.99 }));
        let c = s.classify(&snapshot(0.08, Trend::Neutral, 0.0));
        assert_eq!(c.method, DetectionMethod::RuleBased);
        assert_eq!(c.regime, Regime::Sideways);
    }
}
