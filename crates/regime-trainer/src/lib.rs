//! Offline training of the regime model artifact.
//!
//! Pipeline: closing prices -> `[return, volatility, momentum]` rows ->
//! 3-state Gaussian HMM (Baum-Welch) -> states ranked by volatility ->
//! `RegimeModelArtifact`.

pub mod config;
pub mod data;
pub mod features;
pub mod fit;
pub mod labeling;
pub mod pipeline;

pub use config::TrainerConfig;
pub use fit::{FitOptions, FitReport};
pub use pipeline::{train, TrainingOutcome};
