//! Deterministic valuation: discounted cash flow, Gordon-growth terminal
//! value, per-share intrinsic value and a cash-backed earnings check.

pub mod valuation;

pub use valuation::*;
