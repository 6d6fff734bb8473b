use crate::{AnalysisResult, FeatureVector, StatePrediction};

/// Narrow seam over a trained probabilistic state model.
///
/// The classifier only needs the most likely hidden state for one feature
/// vector and its posterior probability; which model produced it is opaque.
pub trait StateModel: Send + Sync {
    fn predict_state(&self, features: &FeatureVector) -> AnalysisResult<StatePrediction>;
}
