use analysis_core::{AnalysisError, AnalysisResult, Regime};
use market_regime_detector::model::{GaussianHmm, Observation};
use serde::Serialize;
use std::collections::BTreeMap;

/// Column of the volatility feature in a training row.
const VOLATILITY_COLUMN: usize = 1;

/// Labels assigned by ascending mean volatility. Training never emits `Crisis`.
pub const REGIMES_BY_VOLATILITY: [Regime; 3] = [Regime::Bull, Regime::Sideways, Regime::Bear];

/// Per-state share of the training sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub state: usize,
    pub regime: Regime,
    pub samples: usize,
    pub share: f64,
    pub mean_volatility: f64,
}

/// Mean volatility of the rows decoded into each state. A state that
/// decodes no rows falls back to its emission mean.
fn state_volatilities(model: &GaussianHmm, observations: &[Observation], states: &[usize]) -> Vec<f64> {
    (0..model.n_states())
        .map(|state| {
            let vols: Vec<f64> = observations
                .iter()
                .zip(states)
                .filter(|(_, &s)| s == state)
                .map(|(row, _)| row[VOLATILITY_COLUMN])
                .collect();
            if vols.is_empty() {
                model.means[state][VOLATILITY_COLUMN]
            } else {
                analysis_core::stats::mean(&vols)
            }
        })
        .collect()
}

/// Rank states by mean volatility: lowest bull, middle sideways, highest bear.
pub fn map_states_to_regimes(
    model: &GaussianHmm,
    observations: &[Observation],
) -> AnalysisResult<(BTreeMap<usize, Regime>, Vec<StateSummary>)> {
    if model.n_states() != REGIMES_BY_VOLATILITY.len() {
        return Err(AnalysisError::Training(format!(
            "expected {} states, model has {}",
            REGIMES_BY_VOLATILITY.len(),
            model.n_states()
        )));
    }

    let states = model
        .decode(observations)
        .map_err(|e| AnalysisError::Training(e.to_string()))?;
    let volatilities = state_volatilities(model, observations, &states);

    let mut ranked: Vec<usize> = (0..model.n_states()).collect();
    ranked.sort_by(|&a, &b| volatilities[a].total_cmp(&volatilities[b]));

    let regime_map: BTreeMap<usize, Regime> = ranked
        .iter()
        .zip(REGIMES_BY_VOLATILITY)
        .map(|(&state, regime)| (state, regime))
        .collect();

    let total = states.len().max(1) as f64;
    let summary = ranked
        .iter()
        .map(|&state| {
            let samples = states.iter().filter(|&&s| s == state).count();
            StateSummary {
                state,
                regime: regime_map[&state],
                samples,
                share: samples as f64 / total,
                mean_volatility: volatilities[state],
            }
        })
        .collect();

    Ok((regime_map, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIAG: [[f64; 3]; 3] = [[0.01, 0.0, 0.0], [0.0, 0.01, 0.0], [0.0, 0.0, 0.01]];

    /// States deliberately out of volatility order: 0 = high, 1 = low, 2 = mid
    fn shuffled_model() -> GaussianHmm {
        GaussianHmm {
            start_prob: vec![1.0 / 3.0; 3],
            trans_mat: vec![vec![1.0 / 3.0; 3]; 3],
            means: vec![[0.0, 0.50, 0.0], [0.0, 0.05, 0.0], [0.0, 0.20, 0.0]],
            covars: vec![DIAG; 3],
        }
    }

    #[test]
    fn test_states_ranked_by_volatility() {
        let rows = vec![
            [0.0, 0.05, 0.0],
            [0.0, 0.06, 0.0],
            [0.0, 0.21, 0.0],
            [0.0, 0.49, 0.0],
            [0.0, 0.52, 0.0],
            [0.0, 0.04, 0.0],
        ];
        let (map, summary) = map_states_to_regimes(&shuffled_model(), &rows).unwrap();

        assert_eq!(map[&1], Regime::Bull);
        assert_eq!(map[&2], Regime::Sideways);
        assert_eq!(map[&0], Regime::Bear);

        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].regime, Regime::Bull);
        assert_eq!(summary[0].samples, 3);
        assert_eq!(summary[2].samples, 2);
        let total_share: f64 = summary.iter().map(|s| s.share).sum();
        assert!((total_share - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_state_uses_emission_mean() {
        // Nothing decodes to the mid state
        let rows = vec![[0.0, 0.05, 0.0], [0.0, 0.50, 0.0]];
        let (map, summary) = map_states_to_regimes(&shuffled_model(), &rows).unwrap();

        assert_eq!(map[&2], Regime::Sideways);
        let mid = summary.iter().find(|s| s.state == 2).unwrap();
        assert_eq!(mid.samples, 0);
        assert_eq!(mid.mean_volatility, 0.20);
    }

    #[test]
    fn test_never_labels_crisis() {
        let rows = vec![[0.0, 0.9, -0.3]; 4];
        let (map, _) = map_states_to_regimes(&shuffled_model(), &rows).unwrap();
        assert!(map.values().all(|r| *r != Regime::Crisis));
    }

    #[test]
    fn test_wrong_state_count_rejected() {
        let mut model = shuffled_model();
        model.start_prob = vec![0.5, 0.5];
        model.trans_mat = vec![vec![0.5, 0.5]; 2];
        model.means.pop();
        model.covars.pop();
        assert!(matches!(
            map_states_to_regimes(&model, &[[0.0, 0.1, 0.0]]),
            Err(AnalysisError::Training(_))
        ));
    }
}
