//! Agora Engine
//!
//! The composition root. Wires the full civic coordination pipeline out of
//! the domain crates: trust-gated signal admission, geospatial clustering,
//! hierarchical promotion, validator quorum review under three-phase
//! consensus with capture detection observing, zero-sum settlement, and a
//! hash-chained audit ledger recording every step.
//!
//! Everything is constructor-injected; there are no globals. External
//! concerns live behind seams: [`KvStore`] for state externalization,
//! [`ContentArchive`] for bulk payloads, [`Signer`]/`SignatureVerifier`
//! for cryptography, and `Summarizer` for cluster summaries.

mod pipeline;
mod signing;
mod store;

pub use pipeline::{
    CivicEngine, ClusteringReport, EngineConfig, ReviewOutcome, SignalAdmission,
};
pub use signing::{Ed25519Signer, Ed25519Verifier, Signer};
pub use store::{ContentArchive, ContentId, KvStore, MemoryArchive, MemoryStore};

use agora_signals::{ProblemId, SignalId};
use agora_validators::RequestId;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the pipeline.
///
/// Most variants wrap a domain crate's own error; the pipeline adds only
/// lookup failures of its own.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Geo(#[from] agora_geo::Error),

    #[error(transparent)]
    Signals(#[from] agora_signals::Error),

    #[error(transparent)]
    Validators(#[from] agora_validators::Error),

    #[error(transparent)]
    Consensus(#[from] agora_consensus::Error),

    #[error(transparent)]
    Economy(#[from] agora_economy::Error),

    #[error(transparent)]
    Ledger(#[from] agora_ledger::Error),

    /// No admitted signal with that id.
    #[error("unknown signal {0}")]
    UnknownSignal(SignalId),

    /// No surfaced problem with that id.
    #[error("unknown problem {0}")]
    UnknownProblem(ProblemId),

    /// No open credential request with that id.
    #[error("unknown credential request {0}")]
    UnknownRequest(RequestId),

    /// KV snapshot could not be encoded or decoded.
    #[error("snapshot serialization: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, defaulting to `info` for the workspace.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
