//! Agora Trust Scoring
//!
//! Anti-spoofing and Sybil resistance for signal admission. Accounts earn a
//! composite trust score from heterogeneous verification signals, and each
//! submitted location proof is checked for anonymization layers, timezone
//! consistency, and physically plausible movement.
//!
//! Rejections here are soft: a failed proof produces a structured
//! [`LocationVerdict`] with a reason and confidence. The signal is still
//! stored upstream, it is just excluded from clustering.

mod location;
mod score;

pub use location::{
    LocationProof, LocationVerdict, CONSISTENCY_FLOOR, MAX_PROOF_HISTORY, MAX_VELOCITY_KMH,
    TRUST_FLOOR,
};
pub use score::{VerificationKind, DIVERSITY_BONUS, DIVERSITY_MIN_KINDS, MAX_TRUST_SCORE};

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A unique account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "account-{}", self.0)
    }
}

/// Per-account trust state.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct AccountTrust {
    verifications: HashSet<VerificationKind>,
    /// Recent location proofs, newest last, capped at
    /// [`MAX_PROOF_HISTORY`].
    proofs: VecDeque<LocationProof>,
}

/// Composite trust scorer with explicit, injectable state.
#[derive(Debug, Default)]
pub struct TrustScorer {
    accounts: HashMap<AccountId, AccountTrust>,
}

impl TrustScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed verification for an account.
    pub fn record_verification(&mut self, account: AccountId, kind: VerificationKind) {
        self.accounts.entry(account).or_default().verifications.insert(kind);
    }

    /// Composite trust score in 0..=100.
    ///
    /// Sum of distinct verification weights, plus a diversity bonus once
    /// at least [`DIVERSITY_MIN_KINDS`] distinct kinds are verified,
    /// capped at [`MAX_TRUST_SCORE`].
    pub fn trust_score(&self, account: AccountId) -> u32 {
        let Some(state) = self.accounts.get(&account) else {
            return 0;
        };
        let mut score: u32 = state.verifications.iter().map(|k| k.weight()).sum();
        if state.verifications.len() >= DIVERSITY_MIN_KINDS {
            score += DIVERSITY_BONUS;
        }
        score.min(MAX_TRUST_SCORE)
    }

    /// Evaluate and record a location proof for an account.
    ///
    /// The proof enters the account's history whether or not it passes, so
    /// a later proof is always velocity-checked against the real previous
    /// position.
    pub fn verify_location(&mut self, account: AccountId, proof: LocationProof) -> LocationVerdict {
        let trust = self.trust_score(account);
        let state = self.accounts.entry(account).or_default();
        let verdict = location::evaluate(&proof, state.proofs.back(), trust);

        if !verdict.accepted {
            debug!(%account, reason = ?verdict.reason, confidence = verdict.confidence,
                   "location proof rejected");
        }

        state.proofs.push_back(proof);
        while state.proofs.len() > MAX_PROOF_HISTORY {
            state.proofs.pop_front();
        }
        verdict
    }

    /// Number of proofs retained for an account.
    pub fn proof_history_len(&self, account: AccountId) -> usize {
        self.accounts.get(&account).map_or(0, |s| s.proofs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_account_scores_zero() {
        let scorer = TrustScorer::new();
        assert_eq!(scorer.trust_score(AccountId(1)), 0);
    }

    #[test]
    fn weights_sum_without_diversity_bonus() {
        let mut scorer = TrustScorer::new();
        let account = AccountId(1);
        scorer.record_verification(account, VerificationKind::Email);
        scorer.record_verification(account, VerificationKind::Phone);
        // 15 + 20, only two kinds: no bonus.
        assert_eq!(scorer.trust_score(account), 35);
    }

    #[test]
    fn diversity_bonus_at_three_kinds() {
        let mut scorer = TrustScorer::new();
        let account = AccountId(1);
        scorer.record_verification(account, VerificationKind::Email);
        scorer.record_verification(account, VerificationKind::Phone);
        scorer.record_verification(account, VerificationKind::Device);
        // 15 + 20 + 10 + 20 bonus.
        assert_eq!(scorer.trust_score(account), 65);
    }

    #[test]
    fn score_caps_at_one_hundred() {
        let mut scorer = TrustScorer::new();
        let account = AccountId(1);
        for kind in [
            VerificationKind::Email,
            VerificationKind::Phone,
            VerificationKind::Device,
            VerificationKind::Geolocation,
            VerificationKind::Social,
            VerificationKind::Biometric,
        ] {
            scorer.record_verification(account, kind);
        }
        // 105 + 20 bonus, capped.
        assert_eq!(scorer.trust_score(account), MAX_TRUST_SCORE);
    }

    #[test]
    fn repeat_verifications_do_not_stack() {
        let mut scorer = TrustScorer::new();
        let account = AccountId(1);
        scorer.record_verification(account, VerificationKind::Biometric);
        scorer.record_verification(account, VerificationKind::Biometric);
        assert_eq!(scorer.trust_score(account), 30);
    }

    #[test]
    fn proof_history_is_capped() {
        let mut scorer = TrustScorer::new();
        let account = AccountId(1);
        for i in 0..(MAX_PROOF_HISTORY + 25) {
            let proof = LocationProof::clean(52.52, 13.405, 1000 + i as u64 * 3600);
            scorer.verify_location(account, proof);
        }
        assert_eq!(scorer.proof_history_len(account), MAX_PROOF_HISTORY);
    }
}
