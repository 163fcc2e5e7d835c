//! Agora Ledger
//!
//! An append-only, hash-linked event log. Events queue until a fixed batch
//! fills, then seal into a block carrying a Merkle root of its event
//! hashes. Blocks chain strictly by hash; any historical mutation breaks
//! recomputation and surfaces as an integrity violation.
//!
//! Blake3 is used uniformly: event hashes, Merkle reduction, and block
//! hashes all go through the same function.
//!
//! # Single writer
//!
//! The ledger is one strictly ordered sequence. Callers must serialize
//! writes (one owner or a mutex-guarded handle); interleaved appends would
//! scramble `previous_hash` linkage.

mod block;
mod chain;
mod event;

pub use block::{merkle_root, Block};
pub use chain::{AppendOutcome, Ledger, LedgerExport, BATCH_SIZE};
pub use event::{EventHash, EventId, EventKind, LedgerEvent};

use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ledger operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The recomputed chain disagrees with stored hashes: tampering.
    /// Critical; never auto-healed.
    #[error("integrity violation in block {block}: {detail}")]
    IntegrityViolation { block: u64, detail: String },

    /// No sealed block with that number.
    #[error("unknown block {0}")]
    UnknownBlock(u64),

    /// Export serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
