pub mod metrics;
pub mod models;

pub use metrics::{check_violation, max_drawdown, value_at_risk, DEFAULT_CONFIDENCE_LEVEL};
pub use models::*;
