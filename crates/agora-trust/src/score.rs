//! Verification signal weights.

use serde::{Deserialize, Serialize};

/// Trust score ceiling.
pub const MAX_TRUST_SCORE: u32 = 100;

/// Bonus for holding at least [`DIVERSITY_MIN_KINDS`] distinct verified
/// signal types.
pub const DIVERSITY_BONUS: u32 = 20;

/// Distinct verification kinds required for the diversity bonus.
pub const DIVERSITY_MIN_KINDS: usize = 3;

/// A verification signal an account can complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    Email,
    Phone,
    Device,
    Geolocation,
    Social,
    Biometric,
}

impl VerificationKind {
    /// Points this verification contributes, out of 100.
    pub const fn weight(&self) -> u32 {
        match self {
            VerificationKind::Email => 15,
            VerificationKind::Phone => 20,
            VerificationKind::Device => 10,
            VerificationKind::Geolocation => 15,
            VerificationKind::Social => 15,
            VerificationKind::Biometric => 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biometric_weighs_most() {
        let all = [
            VerificationKind::Email,
            VerificationKind::Phone,
            VerificationKind::Device,
            VerificationKind::Geolocation,
            VerificationKind::Social,
            VerificationKind::Biometric,
        ];
        for kind in all {
            assert!(kind.weight() <= VerificationKind::Biometric.weight());
        }
    }

    #[test]
    fn total_weight_exceeds_cap_only_slightly() {
        let total: u32 = [15, 20, 10, 15, 15, 30].iter().sum();
        assert_eq!(total, 105);
    }
}
