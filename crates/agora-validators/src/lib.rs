//! Agora Validator Management
//!
//! The validator pool, eligibility-filtered quorum selection with
//! per-region diversity caps, and quorum-scoped credential validation
//! rounds.
//!
//! Quorum selection is randomized but injectable: callers supply the RNG,
//! so tests run on seeded generators while production uses entropy.

mod credential;
mod quorum;
mod validator;

pub use credential::{
    CredentialDecision, CredentialOutcome, CredentialValidationRequest, RequestId,
};
pub use quorum::{select_quorum, QuorumConfig};
pub use validator::{Validator, ValidatorId, ValidatorPool, ValidatorRole, ACTIVE_UPTIME_FLOOR};

use thiserror::Error;

/// Result type for validator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in selection and credential validation.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// A quorum of zero validators can never decide anything.
    #[error("quorum size must be at least 1")]
    EmptyQuorum,

    /// Fewer eligible validators than the quorum floor; selection aborted.
    #[error("insufficient eligible validators: {eligible} eligible, {required} required")]
    InsufficientEligibleValidators { eligible: usize, required: usize },

    /// The per-region diversity cap makes the selection target unreachable.
    #[error("diversity cap {cap} over {regions} regions cannot reach {required} validators")]
    DiversityUnreachable {
        regions: usize,
        cap: usize,
        required: usize,
    },

    /// Decision received from a validator not assigned to the request.
    #[error("validator {0} is not assigned to this request")]
    NotAssigned(ValidatorId),
}
