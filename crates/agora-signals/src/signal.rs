//! Signal types.

use agora_geo::CellId;
use serde::{Deserialize, Serialize};

/// Influence granted to a signal per attestation.
pub const ATTESTATION_INFLUENCE: f64 = 2.0;

/// A unique signal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(pub u64);

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sig-{}", self.0)
    }
}

/// Civic category a signal reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Infrastructure,
    Safety,
    Environment,
    Health,
    Governance,
    Other,
}

/// Lifecycle of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    /// Submitted, not yet absorbed into a cluster.
    Raw,
    /// Absorbed into a cluster.
    Clustered,
    /// The owning cluster has been promoted.
    Promoted,
}

/// An anonymous geolocated observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    /// Cell the observation was blurred into.
    pub cell: CellId,
    pub category: Category,
    pub description: String,
    /// Submission time, unix seconds.
    pub submitted_at: u64,
    /// Number of independent attestations.
    pub attestations: u32,
    /// Influence accrued through attestations.
    pub influence: f64,
    pub status: SignalStatus,
}

impl Signal {
    /// Create a fresh raw signal.
    pub fn new(
        id: SignalId,
        cell: CellId,
        category: Category,
        description: impl Into<String>,
        submitted_at: u64,
    ) -> Self {
        Self {
            id,
            cell,
            category,
            description: description.into(),
            submitted_at,
            attestations: 0,
            influence: 0.0,
            status: SignalStatus::Raw,
        }
    }

    /// Record one attestation: +1 count, fixed influence grant.
    pub fn attest(&mut self) {
        self.attestations += 1;
        self.influence += ATTESTATION_INFLUENCE;
    }

    /// Contribution of this signal to cluster weight: attestations + 1.
    pub fn weight(&self) -> u64 {
        u64::from(self.attestations) + 1
    }

    /// Whether the signal is still eligible for clustering.
    pub fn is_raw(&self) -> bool {
        self.status == SignalStatus::Raw
    }
}
