use analysis_core::{AnalysisError, AnalysisResult};
use chrono::{DateTime, Utc};
use market_regime_detector::RegimeModelArtifact;
use tracing::info;

use crate::config::TrainerConfig;
use crate::features::build_feature_matrix;
use crate::fit::fit;
use crate::labeling::{map_states_to_regimes, StateSummary};

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: RegimeModelArtifact,
    pub summary: Vec<StateSummary>,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Fit and label a regime model from closing prices, oldest first.
///
/// Nothing is written here; the caller decides where the artifact goes.
pub fn train(
    prices: &[f64],
    config: &TrainerConfig,
    trained_at: DateTime<Utc>,
) -> AnalysisResult<TrainingOutcome> {
    if let Some(bad) = prices.iter().find(|p| !p.is_finite() || **p <= 0.0) {
        return Err(AnalysisError::InvalidInput(format!(
            "closing prices must be finite and positive, found {}",
            bad
        )));
    }

    let observations = build_feature_matrix(prices)?;
    info!(
        prices = prices.len(),
        rows = observations.len(),
        "Built training feature matrix"
    );

    let report = fit(&observations, &config.fit_options())?;
    let (regime_map, summary) = map_states_to_regimes(&report.model, &observations)?;

    for state in &summary {
        info!(
            state = state.state,
            regime = %state.regime,
            samples = state.samples,
            share = state.share,
            mean_volatility = state.mean_volatility,
            "Regime state"
        );
    }

    let artifact = RegimeModelArtifact::new(report.model, regime_map, config.version.clone(), trained_at);
    artifact.validate()?;

    Ok(TrainingOutcome {
        artifact,
        summary,
        log_likelihood: report.log_likelihood,
        iterations: report.iterations,
        converged: report.converged,
    })
}
