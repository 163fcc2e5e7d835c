//! Agora Settlement
//!
//! Converts prediction accuracy into influence deltas under a zero-sum
//! rule: every point gained by accurate validators is balanced by losses
//! elsewhere plus a treasury counter-entry. A settlement that fails the
//! balance check is fatal for that settlement and must never reach the
//! ledger.

use agora_consensus::ProposalId;
use agora_validators::{ValidatorId, ValidatorPool};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Tolerated settlement imbalance.
pub const BALANCE_EPSILON: f64 = 1e-2;

/// Accuracy above which a participant earns rather than loses.
pub const REWARD_FLOOR: f64 = 0.7;

/// Reward multiplier for accurate predictions.
const REWARD_SCALE: f64 = 100.0;

/// Penalty multiplier for inaccurate predictions.
const PENALTY_SCALE: f64 = 50.0;

/// How strongly one settlement nudges reputation.
const REPUTATION_STEP: f64 = 0.1;

/// Result type for settlement operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while settling.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Deltas plus treasury do not cancel; the settlement is discarded.
    #[error("settlement imbalance {imbalance} exceeds epsilon {BALANCE_EPSILON}")]
    SettlementImbalance { imbalance: f64 },

    /// An accuracy outside 0..=1 cannot be settled.
    #[error("accuracy {accuracy} for {validator} outside 0..=1")]
    InvalidAccuracy {
        validator: ValidatorId,
        accuracy: f64,
    },
}

/// One participant's scored outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub validator: ValidatorId,
    /// Prediction accuracy in 0..=1.
    pub accuracy: f64,
}

impl Outcome {
    /// Score a binary prediction against the actual result.
    ///
    /// A correct prediction earns the stated confidence as accuracy; a
    /// wrong one earns its complement.
    pub fn from_prediction(
        validator: ValidatorId,
        predicted: bool,
        actual: bool,
        confidence: f64,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        let accuracy = if predicted == actual {
            confidence
        } else {
            1.0 - confidence
        };
        Self {
            validator,
            accuracy,
        }
    }
}

/// Influence delta earned by one accuracy value.
///
/// Above [`REWARD_FLOOR`] the participant gains `100 × accuracy`;
/// otherwise they lose `50 × (1 − accuracy)`.
pub fn influence_delta(accuracy: f64) -> f64 {
    if accuracy > REWARD_FLOOR {
        REWARD_SCALE * accuracy
    } else {
        -PENALTY_SCALE * (1.0 - accuracy)
    }
}

/// A balanced settlement ready for the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub proposal_id: ProposalId,
    pub deltas: Vec<(ValidatorId, f64)>,
    /// Counter-entry absorbing the net of all deltas.
    pub treasury_delta: f64,
    pub verified: bool,
}

impl Settlement {
    /// Net imbalance: Σ deltas + treasury.
    pub fn imbalance(&self) -> f64 {
        self.deltas.iter().map(|(_, d)| d).sum::<f64>() + self.treasury_delta
    }

    /// Re-check the zero-sum invariant.
    pub fn verify(&self) -> Result<()> {
        let imbalance = self.imbalance();
        if imbalance.abs() > BALANCE_EPSILON || !imbalance.is_finite() {
            return Err(Error::SettlementImbalance { imbalance });
        }
        Ok(())
    }
}

/// Builds and applies settlements.
#[derive(Debug, Default)]
pub struct SettlementEngine;

impl SettlementEngine {
    pub fn new() -> Self {
        Self
    }

    /// Settle a set of outcomes for one proposal.
    ///
    /// Fails fast on out-of-range accuracy and on any imbalance; a failed
    /// settlement must not be persisted.
    pub fn settle(&self, proposal_id: ProposalId, outcomes: &[Outcome]) -> Result<Settlement> {
        for outcome in outcomes {
            if !(0.0..=1.0).contains(&outcome.accuracy) || !outcome.accuracy.is_finite() {
                return Err(Error::InvalidAccuracy {
                    validator: outcome.validator,
                    accuracy: outcome.accuracy,
                });
            }
        }

        let deltas: Vec<(ValidatorId, f64)> = outcomes
            .iter()
            .map(|o| (o.validator, influence_delta(o.accuracy)))
            .collect();
        let treasury_delta = -deltas.iter().map(|(_, d)| d).sum::<f64>();

        let settlement = Settlement {
            proposal_id,
            deltas,
            treasury_delta,
            verified: false,
        };
        settlement.verify()?;

        debug!(
            proposal = %proposal_id,
            participants = settlement.deltas.len(),
            treasury = settlement.treasury_delta,
            "settlement balanced"
        );
        Ok(Settlement {
            verified: true,
            ..settlement
        })
    }

    /// Apply a verified settlement to validator state.
    ///
    /// Stake absorbs the delta (floored at zero), the accuracy running
    /// average folds in this round, and reputation takes a bounded nudge
    /// toward the observed accuracy. Unknown validators are skipped.
    pub fn apply_to_pool(
        &self,
        settlement: &Settlement,
        outcomes: &[Outcome],
        pool: &mut ValidatorPool,
    ) -> Result<()> {
        settlement.verify()?;

        for &(id, delta) in &settlement.deltas {
            let Some(validator) = pool.get_mut(id) else {
                continue;
            };
            validator.staked_influence = (validator.staked_influence + delta).max(0.0);

            if let Some(outcome) = outcomes.iter().find(|o| o.validator == id) {
                let done = f64::from(validator.validations_completed);
                validator.accuracy = (validator.accuracy * done + outcome.accuracy) / (done + 1.0);
                validator.validations_completed += 1;
                validator.reputation = (validator.reputation
                    + (outcome.accuracy - 0.5) * REPUTATION_STEP)
                    .clamp(0.0, 1.0);
            }
        }
        info!(proposal = %settlement.proposal_id, "settlement applied");
        Ok(())
    }
}
