use anyhow::{bail, Context, Result};
use market_regime_detector::config::DEFAULT_MODEL_PATH;
use std::env;
use std::path::PathBuf;

use crate::fit::FitOptions;

pub const DEFAULT_INPUT_PATH: &str = "data/prices.csv";
pub const ARTIFACT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub n_states: usize,
    pub n_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
    pub min_covar: f64,
    pub version: String,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        let fit = FitOptions::default();
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_MODEL_PATH),
            n_states: fit.n_states,
            n_iter: fit.n_iter,
            tolerance: fit.tolerance,
            seed: fit.seed,
            min_covar: fit.min_covar,
            version: ARTIFACT_VERSION.to_string(),
        }
    }
}

impl TrainerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            input_path: env::var("REGIME_TRAIN_INPUT")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_path),
            output_path: env::var("REGIME_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_path),
            n_states: defaults.n_states,
            n_iter: env::var("REGIME_TRAIN_ITERATIONS")
                .unwrap_or_else(|_| defaults.n_iter.to_string())
                .parse()
                .context("REGIME_TRAIN_ITERATIONS must be a positive integer")?,
            tolerance: env::var("REGIME_TRAIN_TOLERANCE")
                .unwrap_or_else(|_| defaults.tolerance.to_string())
                .parse()
                .context("REGIME_TRAIN_TOLERANCE must be a number")?,
            seed: env::var("REGIME_TRAIN_SEED")
                .unwrap_or_else(|_| defaults.seed.to_string())
                .parse()
                .context("REGIME_TRAIN_SEED must be an unsigned integer")?,
            min_covar: defaults.min_covar,
            version: env::var("REGIME_MODEL_VERSION").unwrap_or(defaults.version),
        })
    }

    /// Apply `--input`, `--output`, `--seed` and `--iterations` overrides.
    pub fn apply_args<I>(mut self, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            let mut value = || {
                args.next()
                    .with_context(|| format!("{} requires a value", flag))
            };
            match flag.as_str() {
                "--input" => self.input_path = PathBuf::from(value()?),
                "--output" => self.output_path = PathBuf::from(value()?),
                "--seed" => {
                    self.seed = value()?.parse().context("--seed must be an unsigned integer")?
                }
                "--iterations" => {
                    self.n_iter = value()?
                        .parse()
                        .context("--iterations must be a positive integer")?
                }
                other => bail!("unknown argument: {}", other),
            }
        }
        if self.n_iter == 0 {
            bail!("iterations must be positive");
        }
        Ok(self)
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            n_states: self.n_states,
            n_iter: self.n_iter,
            tolerance: self.tolerance,
            seed: self.seed,
            min_covar: self.min_covar,
        }
    }
}
