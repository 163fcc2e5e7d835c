//! Credential validation rounds.
//!
//! A quorum-scoped analogue of proposal consensus: an assigned validator
//! set approves or rejects a credential, each decision carrying confidence
//! and stake. The round decides once approvals reach the requirement or
//! rejections make it unreachable. Terminal outcomes are sticky.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::validator::ValidatorId;
use crate::{Error, Result};

/// A unique credential-request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request-{}", self.0)
    }
}

/// One validator's verdict on a credential.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CredentialDecision {
    pub approve: bool,
    /// Self-reported confidence, 0..=1.
    pub confidence: f64,
    /// Stake backing the decision.
    pub stake: f64,
}

/// Where the round stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOutcome {
    Pending,
    Approved,
    Rejected,
}

/// A credential under quorum review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialValidationRequest {
    pub id: RequestId,
    pub credential_type: String,
    pub required_approvals: usize,
    pub assigned: Vec<ValidatorId>,
    decisions: HashMap<ValidatorId, CredentialDecision>,
    outcome: CredentialOutcome,
}

impl CredentialValidationRequest {
    pub fn new(
        id: RequestId,
        credential_type: impl Into<String>,
        assigned: Vec<ValidatorId>,
        required_approvals: usize,
    ) -> Self {
        Self {
            id,
            credential_type: credential_type.into(),
            required_approvals,
            assigned,
            decisions: HashMap::new(),
            outcome: CredentialOutcome::Pending,
        }
    }

    /// Record one validator's decision.
    ///
    /// Idempotent per validator: a repeat decision is ignored rather than
    /// double-counted. Decisions after the round settles are also ignored.
    pub fn record_decision(
        &mut self,
        validator: ValidatorId,
        decision: CredentialDecision,
    ) -> Result<CredentialOutcome> {
        if !self.assigned.contains(&validator) {
            return Err(Error::NotAssigned(validator));
        }
        if self.outcome != CredentialOutcome::Pending {
            return Ok(self.outcome);
        }
        if self.decisions.contains_key(&validator) {
            return Ok(self.outcome);
        }
        self.decisions.insert(validator, decision);

        let approvals = self.approvals();
        let rejections = self.decisions.len() - approvals;
        if approvals >= self.required_approvals {
            self.outcome = CredentialOutcome::Approved;
        } else if self.assigned.len() - rejections < self.required_approvals {
            // Even unanimous remaining approvals cannot reach the bar.
            self.outcome = CredentialOutcome::Rejected;
        }
        if self.outcome != CredentialOutcome::Pending {
            debug!(request = %self.id, outcome = ?self.outcome, approvals, rejections,
                   "credential round settled");
        }
        Ok(self.outcome)
    }

    /// Approvals recorded so far.
    pub fn approvals(&self) -> usize {
        self.decisions.values().filter(|d| d.approve).count()
    }

    /// The decision a validator submitted, if any.
    pub fn decision_of(&self, validator: ValidatorId) -> Option<&CredentialDecision> {
        self.decisions.get(&validator)
    }

    pub fn outcome(&self) -> CredentialOutcome {
        self.outcome
    }

    /// Decisions as (validator, approve) pairs, for alignment auditing.
    pub fn votes(&self) -> impl Iterator<Item = (ValidatorId, bool)> + '_ {
        self.decisions.iter().map(|(id, d)| (*id, d.approve))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approve() -> CredentialDecision {
        CredentialDecision {
            approve: true,
            confidence: 0.9,
            stake: 100.0,
        }
    }

    fn reject() -> CredentialDecision {
        CredentialDecision {
            approve: false,
            confidence: 0.8,
            stake: 100.0,
        }
    }

    fn request(assigned: u64, required: usize) -> CredentialValidationRequest {
        CredentialValidationRequest::new(
            RequestId(1),
            "professional-license",
            (0..assigned).map(ValidatorId).collect(),
            required,
        )
    }

    #[test]
    fn approves_at_required_approvals() {
        let mut req = request(5, 3);
        assert_eq!(
            req.record_decision(ValidatorId(0), approve()).unwrap(),
            CredentialOutcome::Pending
        );
        assert_eq!(
            req.record_decision(ValidatorId(1), approve()).unwrap(),
            CredentialOutcome::Pending
        );
        assert_eq!(
            req.record_decision(ValidatorId(2), approve()).unwrap(),
            CredentialOutcome::Approved
        );
    }

    #[test]
    fn rejects_when_bar_unreachable() {
        let mut req = request(5, 3);
        req.record_decision(ValidatorId(0), reject()).unwrap();
        req.record_decision(ValidatorId(1), reject()).unwrap();
        // 3 validators remain but 3 approvals are needed: still possible.
        assert_eq!(req.outcome(), CredentialOutcome::Pending);
        let outcome = req.record_decision(ValidatorId(2), reject()).unwrap();
        assert_eq!(outcome, CredentialOutcome::Rejected);
    }

    #[test]
    fn duplicate_decision_does_not_double_count() {
        let mut req = request(5, 3);
        req.record_decision(ValidatorId(0), approve()).unwrap();
        req.record_decision(ValidatorId(0), approve()).unwrap();
        req.record_decision(ValidatorId(0), approve()).unwrap();
        assert_eq!(req.approvals(), 1);
        assert_eq!(req.outcome(), CredentialOutcome::Pending);
    }

    #[test]
    fn unassigned_validator_is_an_error() {
        let mut req = request(3, 2);
        assert_eq!(
            req.record_decision(ValidatorId(9), approve()).unwrap_err(),
            Error::NotAssigned(ValidatorId(9))
        );
    }

    #[test]
    fn settled_round_ignores_further_decisions() {
        let mut req = request(3, 2);
        req.record_decision(ValidatorId(0), approve()).unwrap();
        req.record_decision(ValidatorId(1), approve()).unwrap();
        assert_eq!(req.outcome(), CredentialOutcome::Approved);

        let after = req.record_decision(ValidatorId(2), reject()).unwrap();
        assert_eq!(after, CredentialOutcome::Approved);
        assert_eq!(req.decision_of(ValidatorId(2)), None);
    }
}
