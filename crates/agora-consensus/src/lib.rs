//! Agora Consensus
//!
//! Three-phase agreement over proposals: a designated leader pre-prepares,
//! validators acknowledge, then commit. Each phase advances once messages
//! from ⌈2n/3⌉ of the validator set arrive, tolerating up to ⌊n/3⌋ faulty
//! participants.
//!
//! Every proposal runs its own independent state machine; rounds progress
//! concurrently without interference. Message ingestion is idempotent, so
//! out-of-order and duplicated delivery never double-counts.
//!
//! There is no transport here: messages are delivered locally by the
//! caller. Signature validity is delegated to the [`SignatureVerifier`]
//! seam; rounds have no timeout, a stalled round simply waits until
//! membership recovers and the caller retries.

mod engine;
mod strategy;
mod threshold;

pub use engine::{
    phase_payload, ConsensusEngine, ConsensusState, Phase, PhaseMessage, ProposalId,
    SignatureRef, SignatureVerifier,
};
pub use strategy::{simulate_round, FixedStrategy, ProbabilisticStrategy, VoteStrategy};
pub use threshold::bft_threshold;

use agora_validators::ValidatorId;
use thiserror::Error;

/// Result type for consensus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running consensus.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Too few live validators to ever reach the threshold; blocking until
    /// membership changes.
    #[error("insufficient quorum: {live} live validators, {required} required")]
    InsufficientQuorum { live: usize, required: usize },

    /// No round exists for the proposal.
    #[error("unknown proposal {0}")]
    UnknownProposal(ProposalId),

    /// A round already exists for the proposal.
    #[error("proposal {0} already initiated")]
    AlreadyInitiated(ProposalId),

    /// The round is in the wrong phase for the requested message.
    #[error("invalid phase: expected {expected}, got {actual}")]
    InvalidPhase {
        expected: &'static str,
        actual: Phase,
    },

    /// Message from a validator outside the round's membership.
    #[error("validator {0} is not part of this round")]
    NotInQuorum(ValidatorId),

    /// The injected verifier rejected a message signature.
    #[error("signature rejected for validator {0}")]
    SignatureRejected(ValidatorId),
}
