//! Target allocations per risk profile and the trades that reach them.

pub mod allocation;
pub mod models;
pub mod rebalancing;

pub use allocation::get_allocation_strategy;
pub use models::*;
pub use rebalancing::rebalancing_diff;
