//! Gaussian hidden Markov model with full covariance emissions.
//!
//! This is the inference half: log-space emission densities, the
//! single-observation posterior used online, Viterbi decoding and the
//! forward-backward recursions. Fitting lives in the `regime-trainer` crate.

use analysis_core::{AnalysisError, AnalysisResult, FeatureVector, StateModel, StatePrediction};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Observation dimension: `[return, volatility, momentum]`
pub const N_FEATURES: usize = FeatureVector::LEN;

pub type Observation = [f64; N_FEATURES];
pub type Covariance = [[f64; N_FEATURES]; N_FEATURES];

const LN_2PI: f64 = 1.837_877_066_409_345_5;
const ROW_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianHmm {
    /// Initial state probabilities
    pub start_prob: Vec<f64>,
    /// Row-stochastic state transition matrix
    pub trans_mat: Vec<Vec<f64>>,
    /// Emission mean per state
    pub means: Vec<Observation>,
    /// Full emission covariance per state
    pub covars: Vec<Covariance>,
}

/// Cholesky-factored emission density for one state
struct Emission {
    mean: Vector3<f64>,
    chol_l: Matrix3<f64>,
    log_norm: f64,
}

impl Emission {
    fn new(mean: &Observation, covar: &Covariance) -> Option<Self> {
        let cov = Matrix3::from_fn(|r, c| covar[r][c]);
        let chol = cov.cholesky()?;
        let chol_l = chol.l();
        let log_det = 2.0 * chol_l.diagonal().iter().map(|d| d.ln()).sum::<f64>();
        Some(Self {
            mean: Vector3::from(*mean),
            chol_l,
            log_norm: -0.5 * (N_FEATURES as f64 * LN_2PI + log_det),
        })
    }

    fn log_pdf(&self, x: &Observation) -> Option<f64> {
        let diff = Vector3::from(*x) - self.mean;
        let z = self.chol_l.solve_lower_triangular(&diff)?;
        Some(self.log_norm - 0.5 * z.norm_squared())
    }
}

impl GaussianHmm {
    pub fn n_states(&self) -> usize {
        self.start_prob.len()
    }

    /// Check shapes, probabilities and covariance definiteness.
    pub fn validate(&self) -> AnalysisResult<()> {
        let n = self.n_states();
        if n == 0 {
            return Err(AnalysisError::InvalidInput("model has no states".into()));
        }
        if self.trans_mat.len() != n
            || self.trans_mat.iter().any(|row| row.len() != n)
            || self.means.len() != n
            || self.covars.len() != n
        {
            return Err(AnalysisError::InvalidInput(format!(
                "inconsistent model dimensions for {} states",
                n
            )));
        }
        if !is_distribution(&self.start_prob) {
            return Err(AnalysisError::InvalidInput(
                "start probabilities do not sum to 1".into(),
            ));
        }
        if let Some(i) = self.trans_mat.iter().position(|row| !is_distribution(row)) {
            return Err(AnalysisError::InvalidInput(format!(
                "transition row {} does not sum to 1",
                i
            )));
        }
        if self.means.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidInput("non-finite emission mean".into()));
        }
        self.emissions().map(|_| ())
    }

    fn emissions(&self) -> AnalysisResult<Vec<Emission>> {
        self.means
            .iter()
            .zip(&self.covars)
            .enumerate()
            .map(|(state, (mean, covar))| {
                Emission::new(mean, covar).ok_or_else(|| {
                    AnalysisError::InvalidInput(format!(
                        "covariance of state {} is not positive definite",
                        state
                    ))
                })
            })
            .collect()
    }

    /// `ln N(x_t | state j)` for every observation and state (T x N).
    pub fn log_emission_matrix(&self, observations: &[Observation]) -> AnalysisResult<Vec<Vec<f64>>> {
        let emissions = self.emissions()?;
        observations
            .iter()
            .map(|x| {
                emissions
                    .iter()
                    .map(|e| {
                        e.log_pdf(x).filter(|lp| !lp.is_nan()).ok_or_else(|| {
                            AnalysisError::InferenceFailure("emission density is undefined".into())
                        })
                    })
                    .collect::<AnalysisResult<Vec<f64>>>()
            })
            .collect()
    }

    pub fn log_start(&self) -> Vec<f64> {
        self.start_prob.iter().map(|p| p.ln()).collect()
    }

    pub fn log_trans(&self) -> Vec<Vec<f64>> {
        self.trans_mat
            .iter()
            .map(|row| row.iter().map(|p| p.ln()).collect())
            .collect()
    }

    /// Most likely state sequence (Viterbi).
    pub fn decode(&self, observations: &[Observation]) -> AnalysisResult<Vec<usize>> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }
        let log_b = self.log_emission_matrix(observations)?;
        Ok(viterbi(&self.log_start(), &self.log_trans(), &log_b))
    }

    /// Log-likelihood of an observation sequence.
    pub fn score(&self, observations: &[Observation]) -> AnalysisResult<f64> {
        if observations.is_empty() {
            return Ok(0.0);
        }
        let log_b = self.log_emission_matrix(observations)?;
        let log_alpha = forward(&self.log_start(), &self.log_trans(), &log_b);
        log_alpha
            .last()
            .map(|row| log_sum_exp(row))
            .ok_or_else(|| AnalysisError::InferenceFailure("empty forward pass".into()))
    }
}

impl StateModel for GaussianHmm {
    /// Posterior over states for a single observation: `start_j * N(x | j)`, normalized.
    fn predict_state(&self, features: &FeatureVector) -> AnalysisResult<StatePrediction> {
        if !features.is_finite() {
            return Err(AnalysisError::InferenceFailure(format!(
                "non-finite features {:?}",
                features
            )));
        }
        let log_b = self.log_emission_matrix(&[features.to_array()])?;
        let joint: Vec<f64> = self
            .log_start()
            .iter()
            .zip(&log_b[0])
            .map(|(s, b)| s + b)
            .collect();

        let norm = log_sum_exp(&joint);
        if !norm.is_finite() {
            return Err(AnalysisError::InferenceFailure(
                "observation has zero likelihood under every state".into(),
            ));
        }

        let (state, best) = joint
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| AnalysisError::InferenceFailure("model has no states".into()))?;

        Ok(StatePrediction {
            state,
            probability: (best - norm).exp().clamp(0.0, 1.0),
        })
    }
}

fn is_distribution(probs: &[f64]) -> bool {
    probs.iter().all(|p| p.is_finite() && *p >= 0.0)
        && (probs.iter().sum::<f64>() - 1.0).abs() < ROW_SUM_TOLERANCE
}

/// Numerically stable `ln(sum(exp(v)))`; `-inf` for empty input.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Forward recursion in log space (T x N).
pub fn forward(log_start: &[f64], log_trans: &[Vec<f64>], log_b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = log_start.len();
    let mut log_alpha: Vec<Vec<f64>> = Vec::with_capacity(log_b.len());
    let mut scratch = vec![0.0; n];

    for (t, emission) in log_b.iter().enumerate() {
        let row: Vec<f64> = if t == 0 {
            (0..n).map(|j| log_start[j] + emission[j]).collect()
        } else {
            let prev = &log_alpha[t - 1];
            (0..n)
                .map(|j| {
                    for i in 0..n {
                        scratch[i] = prev[i] + log_trans[i][j];
                    }
                    log_sum_exp(&scratch) + emission[j]
                })
                .collect()
        };
        log_alpha.push(row);
    }
    log_alpha
}

/// Backward recursion in log space (T x N).
pub fn backward(log_trans: &[Vec<f64>], log_b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let t_len = log_b.len();
    let n = log_trans.len();
    let mut log_beta = vec![vec![0.0; n]; t_len];
    let mut scratch = vec![0.0; n];

    for t in (0..t_len.saturating_sub(1)).rev() {
        for i in 0..n {
            for j in 0..n {
                scratch[j] = log_trans[i][j] + log_b[t + 1][j] + log_beta[t + 1][j];
            }
            log_beta[t][i] = log_sum_exp(&scratch);
        }
    }
    log_beta
}

/// Viterbi decoding in log space.
pub fn viterbi(log_start: &[f64], log_trans: &[Vec<f64>], log_b: &[Vec<f64>]) -> Vec<usize> {
    let t_len = log_b.len();
    let n = log_start.len();
    if t_len == 0 || n == 0 {
        return Vec::new();
    }

    let mut delta: Vec<f64> = (0..n).map(|j| log_start[j] + log_b[0][j]).collect();
    let mut backptr = vec![vec![0usize; n]; t_len];

    for t in 1..t_len {
        let mut next = vec![f64::NEG_INFINITY; n];
        for j in 0..n {
            let (best_i, best_val) = (0..n)
                .map(|i| (i, delta[i] + log_trans[i][j]))
                .fold((0, f64::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
            next[j] = best_val + log_b[t][j];
            backptr[t][j] = best_i;
        }
        delta = next;
    }

    let mut last = 0;
    for j in 1..n {
        if delta[j] > delta[last] {
            last = j;
        }
    }

    let mut path = vec![0; t_len];
    path[t_len - 1] = last;
    for t in (1..t_len).rev() {
        path[t - 1] = backptr[t][path[t]];
    }
    path
}
