use analysis_core::{AnalysisError, AnalysisResult, FeatureVector, Regime};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::model::GaussianHmm;

/// Trained regime model plus the state-to-regime mapping.
///
/// Written once by the trainer, loaded read-only by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeModelArtifact {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    /// Feature order the model was trained on
    pub feature_names: Vec<String>,
    pub regime_map: BTreeMap<usize, Regime>,
    pub model: GaussianHmm,
}

impl RegimeModelArtifact {
    pub fn new(
        model: GaussianHmm,
        regime_map: BTreeMap<usize, Regime>,
        version: impl Into<String>,
        trained_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: version.into(),
            trained_at,
            feature_names: FeatureVector::NAMES.iter().map(|s| s.to_string()).collect(),
            regime_map,
            model,
        }
    }

    /// Reject artifacts that the online feature pipeline cannot query.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.feature_names != FeatureVector::NAMES {
            return Err(AnalysisError::ModelUnavailable(format!(
                "feature order {:?} does not match {:?}",
                self.feature_names,
                FeatureVector::NAMES
            )));
        }
        self.model
            .validate()
            .map_err(|e| AnalysisError::ModelUnavailable(e.to_string()))?;

        let n_states = self.model.n_states();
        if let Some(state) = self.regime_map.keys().find(|&&s| s >= n_states) {
            return Err(AnalysisError::ModelUnavailable(format!(
                "regime map references state {} but model has {} states",
                state, n_states
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> AnalysisResult<Self> {
        let artifact: Self = serde_json::from_str(json)
            .map_err(|e| AnalysisError::ModelUnavailable(format!("corrupt artifact: {}", e)))?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn to_json(&self) -> AnalysisResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::Training(format!("failed to serialize artifact: {}", e)))
    }

    /// Load and validate an artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            AnalysisError::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let artifact = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            version = %artifact.version,
            trained_at = %artifact.trained_at,
            "Loaded trained regime model"
        );
        Ok(artifact)
    }

    /// Write the artifact, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> AnalysisResult<()> {
        let path = path.as_ref();
        self.validate()?;
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AnalysisError::Training(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(path, json).map_err(|e| {
            AnalysisError::Training(format!("cannot write {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), version = %self.version, "Saved regime model artifact");
        Ok(())
    }
}
