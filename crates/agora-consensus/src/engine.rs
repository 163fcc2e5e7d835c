//! Per-proposal consensus state machines.

use std::collections::HashMap;

use agora_validators::{ValidatorId, ValidatorPool};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::threshold::bft_threshold;
use crate::{Error, Result};

/// A unique proposal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub u64);

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "proposal-{}", self.0)
    }
}

/// Phase of a consensus round. Transitions are monotonic; `Finalized` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    PrePrepare,
    Prepare,
    Commit,
    Finalized,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "IDLE",
            Phase::PrePrepare => "PRE-PREPARE",
            Phase::Prepare => "PREPARE",
            Phase::Commit => "COMMIT",
            Phase::Finalized => "FINALIZED",
        };
        f.write_str(name)
    }
}

/// Opaque reference to a signature produced elsewhere.
///
/// The engine records it with the message; cryptographic validity is the
/// verifier seam's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRef(pub Vec<u8>);

impl SignatureRef {
    /// A placeholder reference for contexts without a signer.
    pub fn unsigned() -> Self {
        Self(Vec::new())
    }
}

/// One validator's message within a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseMessage {
    pub validator: ValidatorId,
    pub signature: SignatureRef,
}

/// The full state of one proposal's round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusState {
    pub proposal_id: ProposalId,
    pub phase: Phase,
    pub leader: ValidatorId,
    /// Validators admitted to this round (live at initiation).
    pub members: Vec<ValidatorId>,
    /// Messages needed to advance each phase: ⌈2n/3⌉ of the pool.
    pub threshold: usize,
    pub pre_prepare: Option<PhaseMessage>,
    pub prepares: Vec<PhaseMessage>,
    pub commits: Vec<PhaseMessage>,
    /// Unix seconds, set on finalization.
    pub finalized_at: Option<u64>,
}

impl ConsensusState {
    fn contains(&self, validator: ValidatorId) -> bool {
        self.members.contains(&validator)
    }

    fn has_prepared(&self, validator: ValidatorId) -> bool {
        self.prepares.iter().any(|m| m.validator == validator)
    }

    fn has_committed(&self, validator: ValidatorId) -> bool {
        self.commits.iter().any(|m| m.validator == validator)
    }
}

/// Verifies phase-message signatures. Consensus references signatures but
/// never interprets them itself.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, public_key: &[u8; 32], payload: &[u8], signature: &[u8]) -> bool;
}

/// Verifier that accepts everything; the default when no real signer is
/// wired in.
struct AcceptAll;

impl SignatureVerifier for AcceptAll {
    fn verify(&self, _public_key: &[u8; 32], _payload: &[u8], _signature: &[u8]) -> bool {
        true
    }
}

/// Drives all concurrent proposal rounds.
pub struct ConsensusEngine {
    states: HashMap<ProposalId, ConsensusState>,
    keys: HashMap<ValidatorId, [u8; 32]>,
    verifier: Box<dyn SignatureVerifier>,
    clock: fn() -> u64,
}

impl std::fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusEngine")
            .field("rounds", &self.states.len())
            .finish()
    }
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl ConsensusEngine {
    /// Engine with signature verification disabled (accept-all seam).
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            keys: HashMap::new(),
            verifier: Box::new(AcceptAll),
            clock: unix_now,
        }
    }

    /// Engine with an injected signature verifier.
    #[must_use]
    pub fn with_verifier(verifier: Box<dyn SignatureVerifier>) -> Self {
        Self {
            verifier,
            ..Self::new()
        }
    }

    /// Override the finalization clock (tests).
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Start a round: the leader's proposal enters PRE-PREPARE.
    ///
    /// The threshold is ⌈2n/3⌉ of the whole registered pool; if fewer live
    /// validators than that exist the round cannot start.
    pub fn initiate(
        &mut self,
        proposal: ProposalId,
        leader: ValidatorId,
        pool: &ValidatorPool,
        signature: SignatureRef,
    ) -> Result<&ConsensusState> {
        if self.states.contains_key(&proposal) {
            return Err(Error::AlreadyInitiated(proposal));
        }
        let threshold = bft_threshold(pool.len());
        let live = pool.live();
        if live.len() < threshold {
            return Err(Error::InsufficientQuorum {
                live: live.len(),
                required: threshold,
            });
        }
        if !live.iter().any(|v| v.id == leader) {
            return Err(Error::NotInQuorum(leader));
        }

        let members: Vec<ValidatorId> = live.iter().map(|v| v.id).collect();
        for v in &live {
            self.keys.insert(v.id, v.public_key);
        }
        self.check_signature(leader, &phase_payload(proposal, "pre-prepare"), &signature)?;

        info!(%proposal, %leader, members = members.len(), threshold, "round initiated");
        let state = ConsensusState {
            proposal_id: proposal,
            phase: Phase::PrePrepare,
            leader,
            members,
            threshold,
            pre_prepare: Some(PhaseMessage {
                validator: leader,
                signature,
            }),
            prepares: Vec::new(),
            commits: Vec::new(),
            finalized_at: None,
        };
        Ok(self.states.entry(proposal).or_insert(state))
    }

    /// Record a prepare acknowledgment.
    ///
    /// Idempotent per validator. Once acknowledgments reach the threshold
    /// the round advances to COMMIT; prepares delivered after that are
    /// ignored.
    pub fn add_prepare(
        &mut self,
        proposal: ProposalId,
        validator: ValidatorId,
        signature: SignatureRef,
    ) -> Result<Phase> {
        self.check_signature(validator, &phase_payload(proposal, "prepare"), &signature)?;
        let state = self
            .states
            .get_mut(&proposal)
            .ok_or(Error::UnknownProposal(proposal))?;
        if !state.contains(validator) {
            return Err(Error::NotInQuorum(validator));
        }
        match state.phase {
            Phase::PrePrepare | Phase::Prepare => {}
            // A valid prepare arriving after the phase already advanced is
            // ordinary out-of-order delivery; ignore it.
            Phase::Commit | Phase::Finalized => return Ok(state.phase),
            phase => {
                return Err(Error::InvalidPhase {
                    expected: "PRE-PREPARE or PREPARE",
                    actual: phase,
                })
            }
        }
        if !state.has_prepared(validator) {
            state.prepares.push(PhaseMessage {
                validator,
                signature,
            });
            state.phase = Phase::Prepare;
            debug!(%proposal, %validator, prepares = state.prepares.len(), "prepare recorded");
        }
        if state.prepares.len() >= state.threshold {
            state.phase = Phase::Commit;
            debug!(%proposal, "prepare threshold reached, entering COMMIT");
        }
        Ok(state.phase)
    }

    /// Record a commit. Idempotent per validator; at the threshold the
    /// round finalizes.
    pub fn add_commit(
        &mut self,
        proposal: ProposalId,
        validator: ValidatorId,
        signature: SignatureRef,
    ) -> Result<Phase> {
        self.check_signature(validator, &phase_payload(proposal, "commit"), &signature)?;
        let clock = self.clock;
        let state = self
            .states
            .get_mut(&proposal)
            .ok_or(Error::UnknownProposal(proposal))?;
        if !state.contains(validator) {
            return Err(Error::NotInQuorum(validator));
        }
        match state.phase {
            Phase::Commit => {}
            Phase::Finalized => return Ok(Phase::Finalized),
            phase => {
                return Err(Error::InvalidPhase {
                    expected: "COMMIT",
                    actual: phase,
                })
            }
        }
        if !state.has_committed(validator) {
            state.commits.push(PhaseMessage {
                validator,
                signature,
            });
            debug!(%proposal, %validator, commits = state.commits.len(), "commit recorded");
        }
        if state.commits.len() >= state.threshold {
            state.phase = Phase::Finalized;
            state.finalized_at = Some(clock());
            info!(%proposal, commits = state.commits.len(), "round finalized");
        }
        Ok(state.phase)
    }

    /// Whether a proposal's round has finalized.
    pub fn is_finalized(&self, proposal: ProposalId) -> bool {
        self.states
            .get(&proposal)
            .is_some_and(|s| s.phase == Phase::Finalized)
    }

    /// The round state for a proposal.
    pub fn get_state(&self, proposal: ProposalId) -> Result<&ConsensusState> {
        self.states
            .get(&proposal)
            .ok_or(Error::UnknownProposal(proposal))
    }

    /// All tracked rounds.
    pub fn rounds(&self) -> impl Iterator<Item = &ConsensusState> {
        self.states.values()
    }

    fn check_signature(
        &self,
        validator: ValidatorId,
        payload: &[u8],
        signature: &SignatureRef,
    ) -> Result<()> {
        let Some(key) = self.keys.get(&validator) else {
            // Unknown key: membership checks downstream will reject if the
            // validator is not part of the round.
            return Ok(());
        };
        if self.verifier.verify(key, payload, &signature.0) {
            Ok(())
        } else {
            Err(Error::SignatureRejected(validator))
        }
    }
}

/// Canonical byte payload a phase message signs over.
///
/// External signers must produce signatures over exactly these bytes for
/// the verifier seam to accept them.
pub fn phase_payload(proposal: ProposalId, phase: &str) -> Vec<u8> {
    let mut payload = proposal.0.to_be_bytes().to_vec();
    payload.extend_from_slice(phase.as_bytes());
    payload
}
