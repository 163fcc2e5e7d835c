//! Voting-alignment cartel detection.

use std::collections::HashMap;

use agora_validators::ValidatorId;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Joint decisions a pair needs before alignment is meaningful.
pub const MIN_JOINT_DECISIONS: usize = 10;

/// Which decision stream a pair voted in; credential review demands a
/// stricter alignment bar than general consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteContext {
    Consensus,
    Credential,
}

impl VoteContext {
    /// Agreement rate above which a pair is flagged.
    pub const fn alignment_threshold(&self) -> f64 {
        match self {
            VoteContext::Consensus => 0.9,
            VoteContext::Credential => 0.95,
        }
    }
}

/// A validator pair voting together suspiciously often.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousPair {
    pub a: ValidatorId,
    pub b: ValidatorId,
    /// matches / joint decisions.
    pub agreement: f64,
    pub joint_decisions: usize,
}

/// Result of a cartel sweep: flagged pairs and the union of their ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartelReport {
    pub context: Option<VoteContext>,
    pub pairs: Vec<SuspiciousPair>,
    /// Union of all flagged pair members.
    pub flagged: Vec<ValidatorId>,
}

impl CartelReport {
    pub fn is_clean(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct PairStats {
    total: usize,
    matches: usize,
}

/// Accumulated pairwise voting history.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VotingHistory {
    pairs: HashMap<(ValidatorId, ValidatorId), PairStats>,
}

impl VotingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one settled round of votes into the pairwise counters.
    pub fn record_round(&mut self, votes: &[(ValidatorId, bool)]) {
        for (i, &(a, vote_a)) in votes.iter().enumerate() {
            for &(b, vote_b) in &votes[i + 1..] {
                if a == b {
                    continue;
                }
                let key = if a < b { (a, b) } else { (b, a) };
                let stats = self.pairs.entry(key).or_default();
                stats.total += 1;
                if vote_a == vote_b {
                    stats.matches += 1;
                }
            }
        }
    }

    /// Sweep for pairs exceeding the context's alignment bar.
    ///
    /// Pairs below [`MIN_JOINT_DECISIONS`] joint decisions are ignored.
    /// Alerts never block anything.
    pub fn detect_cartels(&self, context: VoteContext) -> CartelReport {
        let threshold = context.alignment_threshold();
        let mut pairs = Vec::new();
        for (&(a, b), stats) in &self.pairs {
            if stats.total < MIN_JOINT_DECISIONS {
                continue;
            }
            let agreement = stats.matches as f64 / stats.total as f64;
            if agreement > threshold {
                pairs.push(SuspiciousPair {
                    a,
                    b,
                    agreement,
                    joint_decisions: stats.total,
                });
            }
        }
        pairs.sort_by_key(|p| (p.a, p.b));

        let mut flagged: Vec<ValidatorId> = pairs
            .iter()
            .flat_map(|p| [p.a, p.b])
            .collect();
        flagged.sort();
        flagged.dedup();

        if !pairs.is_empty() {
            warn!(
                ?context,
                pairs = pairs.len(),
                validators = flagged.len(),
                "collusion detected"
            );
        }
        CartelReport {
            context: Some(context),
            pairs,
            flagged,
        }
    }

    /// Joint-decision count for a pair, in either order.
    pub fn joint_decisions(&self, a: ValidatorId, b: ValidatorId) -> usize {
        let key = if a < b { (a, b) } else { (b, a) };
        self.pairs.get(&key).map_or(0, |s| s.total)
    }
}
