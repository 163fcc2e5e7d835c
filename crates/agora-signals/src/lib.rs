//! Agora Signal Clustering and Promotion
//!
//! Raw anonymous observations ("signals") are grouped by shared cell and
//! category into weighted clusters, which then climb a four-tier severity
//! hierarchy until they surface as validated problems.
//!
//! # Pipeline
//!
//! 1. Signals arrive with a cell id and category
//! 2. A clustering pass groups same-cell/same-category raw signals
//! 3. Clusters of sufficient weight and count promote L1 → L2 → L3 → L4
//! 4. L4 clusters surface as immutable [`Problem`] records
//!
//! Signals without enough neighbors are simply deferred to the next pass;
//! deferral is a normal outcome, never an error.
//!
//! # Summaries
//!
//! Human-readable cluster summaries come from an external semantic
//! summarizer behind the [`Summarizer`] trait. When none is supplied the
//! clusterer falls back to lexical term overlap across member descriptions.

mod cluster;
mod promote;
mod signal;
mod summary;

pub use cluster::{
    ClusterId, ClusterIdGen, ClusterPass, ClusterStatus, SignalClusterer, SignalCluster,
    CLUSTER_THRESHOLD, MATURITY_FACTOR,
};
pub use promote::{
    Level, Problem, ProblemId, Priority, PromotionEngine, PromotionEvent, PromotionThresholds,
    PROMOTION_THRESHOLDS,
};
pub use signal::{Category, Signal, SignalId, SignalStatus, ATTESTATION_INFLUENCE};
pub use summary::{LexicalSummarizer, Summarizer, Summary};

use thiserror::Error;

/// Result type for signal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in clustering and promotion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Referenced cluster is not tracked by the promotion engine.
    #[error("unknown cluster {0}")]
    UnknownCluster(ClusterId),
}
