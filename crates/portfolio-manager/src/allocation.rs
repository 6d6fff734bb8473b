use tracing::warn;

use crate::models::{AllocationTarget, AssetClass, RiskProfile};

impl RiskProfile {
    /// Parse a profile name, falling back to the most conservative profile.
    pub fn parse_or_conservative(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(profile = name, "Unknown risk profile, using conservative allocation");
            RiskProfile::Conservative
        })
    }

    /// Fixed `(equity, bonds, cash)` weights for the profile.
    pub fn weights(&self) -> [(AssetClass, f64); 3] {
        let (equity, bonds, cash) = match self {
            RiskProfile::Conservative => (0.3, 0.6, 0.1),
            RiskProfile::Moderate => (0.6, 0.3, 0.1),
            RiskProfile::Aggressive => (0.8, 0.1, 0.1),
        };
        [
            (AssetClass::Equity, equity),
            (AssetClass::Bonds, bonds),
            (AssetClass::Cash, cash),
        ]
    }

    pub fn target(&self) -> AllocationTarget {
        self.weights().into_iter().collect()
    }
}

/// Target allocation for a named risk profile. Unknown names get the
/// conservative mix.
pub fn get_allocation_strategy(profile: &str) -> AllocationTarget {
    RiskProfile::parse_or_conservative(profile).target()
}
