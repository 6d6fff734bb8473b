use std::collections::HashMap;

use crate::models::{AllocationTarget, AssetClass, Holdings};

/// Signed amount to trade per target asset class: positive buys, negative sells.
///
/// `current_value * weight - held`, with absent holdings counted as zero.
/// Holdings in classes outside the target are left alone.
pub fn rebalancing_diff(
    current_value: f64,
    holdings: &Holdings,
    target: &AllocationTarget,
) -> HashMap<AssetClass, f64> {
    target
        .iter()
        .map(|(&class, &weight)| {
            let held = holdings.get(&class).copied().unwrap_or(0.0);
            (class, current_value * weight - held)
        })
        .collect()
}
