use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL_PATH: &str = "models/regime_hmm.json";

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Trained artifact location (`REGIME_MODEL_PATH`)
    pub model_path: PathBuf,
}

impl DetectorConfig {
    pub fn from_env() -> Self {
        Self {
            model_path: env::var("REGIME_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH)),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}
