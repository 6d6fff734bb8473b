pub mod artifact;
pub mod config;
pub mod detector;
pub mod features;
pub mod model;
pub mod rules;
pub mod strategy;

pub use artifact::RegimeModelArtifact;
pub use config::DetectorConfig;
pub use detector::MarketRegimeDetector;
pub use features::FeatureSnapshot;
pub use model::GaussianHmm;
pub use strategy::{RegimeStrategy, RuleBasedStrategy, TrainedModelStrategy};
