//! regime-trainer: fit the market regime HMM from a CSV of closing prices.
//!
//! Usage:
//!   cargo run -p regime-trainer -- --input data/spy.csv
//!   cargo run -p regime-trainer -- --input data/spy.csv --output models/regime_hmm.json --seed 7

use anyhow::Context;
use chrono::Utc;
use regime_trainer::data::read_closing_prices;
use regime_trainer::{train, TrainerConfig};
use tracing::info;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regime_trainer=info,market_regime_detector=info".into()),
        )
        .init();

    let config = TrainerConfig::from_env()?.apply_args(std::env::args().skip(1))?;
    info!(
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        seed = config.seed,
        iterations = config.n_iter,
        "Training regime model"
    );

    let prices = read_closing_prices(&config.input_path)?;
    let outcome = train(&prices, &config, Utc::now()).context("training failed")?;

    outcome
        .artifact
        .save(&config.output_path)
        .context("failed to write model artifact")?;

    info!(
        log_likelihood = outcome.log_likelihood,
        iterations = outcome.iterations,
        converged = outcome.converged,
        "Training complete"
    );
    for state in &outcome.summary {
        println!(
            "state {} -> {:<9} {:>5} rows ({:>5.1}%)  mean vol {:.3}",
            state.state,
            state.regime,
            state.samples,
            state.share * 100.0,
            state.mean_volatility
        );
    }

    Ok(())
}
