//! Baum-Welch (EM) fitting of a full-covariance Gaussian HMM.
//!
//! Means start from a seeded k-means pass, covariances from the pooled data
//! covariance, start and transition probabilities from uniform. Identical
//! observations and options always produce an identical model.

use analysis_core::{AnalysisError, AnalysisResult};
use market_regime_detector::model::{GaussianHmm, Observation};

/// Hidden states: bull, sideways, bear
pub const N_STATES: usize = 3;

/// Fewer rows than this per state cannot support full covariances.
pub const MIN_ROWS_PER_STATE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub n_states: usize,
    pub n_iter: usize,
    /// Stop once the log-likelihood gain drops below this
    pub tolerance: f64,
    pub seed: u64,
    /// Added to every covariance diagonal
    pub min_covar: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            n_states: N_STATES,
            n_iter: 100,
            tolerance: 1e-2,
            seed: 42,
            min_covar: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FitReport {
    pub model: GaussianHmm,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[cfg(not(feature = "hmm"))]
pub fn fit(_observations: &[Observation], _options: &FitOptions) -> AnalysisResult<FitReport> {
    Err(AnalysisError::Training(
        "built without the `hmm` feature; HMM fitting is unavailable".into(),
    ))
}

#[cfg(feature = "hmm")]
pub use em::fit;

#[cfg(feature = "hmm")]
mod em {
    use super::*;
    use market_regime_detector::model::{backward, forward, log_sum_exp, Covariance, N_FEATURES};
    use nalgebra::{Matrix3, Vector3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tracing::{debug, info};

    const KMEANS_ITERATIONS: usize = 10;
    const MIN_WEIGHT: f64 = 1e-12;

    pub fn fit(observations: &[Observation], options: &FitOptions) -> AnalysisResult<FitReport> {
        let n = options.n_states;
        if n == 0 {
            return Err(AnalysisError::Training("n_states must be positive".into()));
        }
        if observations.len() < n * MIN_ROWS_PER_STATE {
            return Err(AnalysisError::InsufficientData(format!(
                "{} feature rows for {} states (need {})",
                observations.len(),
                n,
                n * MIN_ROWS_PER_STATE
            )));
        }
        if observations.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidInput("non-finite feature value".into()));
        }

        let mut model = initial_model(observations, options);
        let t_len = observations.len();
        let mut prev_ll = f64::NEG_INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        for iter in 0..options.n_iter {
            let log_b = model
                .log_emission_matrix(observations)
                .map_err(|e| AnalysisError::Training(e.to_string()))?;
            let log_start = model.log_start();
            let log_trans = model.log_trans();
            let log_alpha = forward(&log_start, &log_trans, &log_b);
            let log_beta = backward(&log_trans, &log_b);
            let ll = log_sum_exp(&log_alpha[t_len - 1]);
            if !ll.is_finite() {
                return Err(AnalysisError::Training(format!(
                    "log-likelihood diverged at iteration {}",
                    iter + 1
                )));
            }

            // E-step: state posteriors and expected transitions
            let gamma: Vec<Vec<f64>> = (0..t_len)
                .map(|t| (0..n).map(|j| (log_alpha[t][j] + log_beta[t][j] - ll).exp()).collect())
                .collect();

            let mut xi = vec![vec![0.0; n]; n];
            for t in 0..t_len - 1 {
                for i in 0..n {
                    for j in 0..n {
                        xi[i][j] += (log_alpha[t][i] + log_trans[i][j] + log_b[t + 1][j]
                            + log_beta[t + 1][j]
                            - ll)
                            .exp();
                    }
                }
            }

            // M-step
            model.start_prob = normalized(&gamma[0]).unwrap_or_else(|| model.start_prob.clone());
            for (i, row) in xi.iter().enumerate() {
                if let Some(probs) = normalized(row) {
                    model.trans_mat[i] = probs;
                }
            }
            for j in 0..n {
                let weights: Vec<f64> = gamma.iter().map(|g| g[j]).collect();
                if let Some((mean, covar)) = weighted_moments(observations, &weights, options.min_covar) {
                    model.means[j] = mean;
                    model.covars[j] = covar;
                }
            }

            iterations = iter + 1;
            debug!(iteration = iterations, log_likelihood = ll, "EM step");

            if ll - prev_ll < options.tolerance && iter > 0 {
                converged = true;
                break;
            }
            prev_ll = ll;
        }

        model
            .validate()
            .map_err(|e| AnalysisError::Training(format!("fitted model is invalid: {}", e)))?;
        let log_likelihood = model
            .score(observations)
            .map_err(|e| AnalysisError::Training(e.to_string()))?;

        info!(iterations, converged, log_likelihood, "HMM fit finished");

        Ok(FitReport {
            model,
            log_likelihood,
            iterations,
            converged,
        })
    }

    fn initial_model(observations: &[Observation], options: &FitOptions) -> GaussianHmm {
        let n = options.n_states;
        let uniform = 1.0 / n as f64;

        let weights = vec![1.0; observations.len()];
        let pooled = weighted_moments(observations, &weights, options.min_covar)
            .map(|(_, covar)| covar)
            .unwrap_or_else(|| identity_covariance(options.min_covar));

        GaussianHmm {
            start_prob: vec![uniform; n],
            trans_mat: vec![vec![uniform; n]; n],
            means: kmeans_centers(observations, n, options.seed),
            covars: vec![pooled; n],
        }
    }

    /// Lloyd's k-means from `k` distinct rows picked by a seeded RNG.
    fn kmeans_centers(observations: &[Observation], k: usize, seed: u64) -> Vec<Observation> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut centers: Vec<Observation> = rand::seq::index::sample(&mut rng, observations.len(), k)
            .into_iter()
            .map(|idx| observations[idx])
            .collect();

        for _ in 0..KMEANS_ITERATIONS {
            let mut sums = vec![[0.0; N_FEATURES]; k];
            let mut counts = vec![0usize; k];

            for x in observations {
                let nearest = (0..k)
                    .min_by(|&a, &b| sq_dist(x, &centers[a]).total_cmp(&sq_dist(x, &centers[b])))
                    .unwrap_or(0);
                counts[nearest] += 1;
                for (s, v) in sums[nearest].iter_mut().zip(x) {
                    *s += v;
                }
            }

            let mut moved = false;
            for j in 0..k {
                if counts[j] == 0 {
                    continue;
                }
                let next = sums[j].map(|s| s / counts[j] as f64);
                moved |= next != centers[j];
                centers[j] = next;
            }
            if !moved {
                break;
            }
        }
        centers
    }

    fn sq_dist(a: &Observation, b: &Observation) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
    }

    fn normalized(values: &[f64]) -> Option<Vec<f64>> {
        let total: f64 = values.iter().sum();
        (total > MIN_WEIGHT && total.is_finite()).then(|| values.iter().map(|v| v / total).collect())
    }

    /// Weighted mean and covariance (plus `min_covar` on the diagonal).
    fn weighted_moments(
        observations: &[Observation],
        weights: &[f64],
        min_covar: f64,
    ) -> Option<(Observation, Covariance)> {
        let total: f64 = weights.iter().sum();
        if total < MIN_WEIGHT {
            return None;
        }

        let mean = observations
            .iter()
            .zip(weights)
            .fold(Vector3::zeros(), |acc, (x, w)| acc + Vector3::from(*x) * *w)
            / total;

        let scatter = observations
            .iter()
            .zip(weights)
            .fold(Matrix3::zeros(), |acc, (x, w)| {
                let diff = Vector3::from(*x) - mean;
                acc + diff * diff.transpose() * *w
            });
        let covar = scatter / total + Matrix3::identity() * min_covar;

        Some((
            [mean[0], mean[1], mean[2]],
            std::array::from_fn(|r| std::array::from_fn(|c| covar[(r, c)])),
        ))
    }

    fn identity_covariance(scale: f64) -> Covariance {
        std::array::from_fn(|r| std::array::from_fn(|c| if r == c { scale } else { 0.0 }))
    }
}
