//! Ledger event types.

use serde::{Deserialize, Serialize};

/// A 32-byte Blake3 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventHash(pub [u8; 32]);

impl EventHash {
    /// The all-zero genesis hash.
    pub const ZERO: Self = Self([0; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl std::fmt::Display for EventHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 hex chars
        write!(f, "{}...", &self.to_hex()[..8])
    }
}

/// A unique event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event-{}", self.0)
    }
}

/// What an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SignalSubmitted,
    ClusterFormed,
    ClusterPromoted,
    ProblemSurfaced,
    ConsensusFinalized,
    SettlementCommitted,
    CaptureAlert,
    CredentialDecided,
}

impl EventKind {
    /// Stable tag bytes fed into the event hash.
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            EventKind::SignalSubmitted => "signal_submitted",
            EventKind::ClusterFormed => "cluster_formed",
            EventKind::ClusterPromoted => "cluster_promoted",
            EventKind::ProblemSurfaced => "problem_surfaced",
            EventKind::ConsensusFinalized => "consensus_finalized",
            EventKind::SettlementCommitted => "settlement_committed",
            EventKind::CaptureAlert => "capture_alert",
            EventKind::CredentialDecided => "credential_decided",
        }
    }
}

/// One hash-linked entry in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: EventId,
    /// Unix seconds.
    pub timestamp: u64,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub hash: EventHash,
    /// Hash of the previous event, or of the last sealed block right
    /// after sealing, or [`EventHash::ZERO`] at genesis.
    pub previous_hash: EventHash,
}

impl LedgerEvent {
    /// Recompute the content hash from the stored fields.
    pub fn compute_hash(&self) -> EventHash {
        hash_event(self.id, self.timestamp, self.kind, &self.payload, self.previous_hash)
    }
}

/// Blake3 over the canonical event encoding.
pub(crate) fn hash_event(
    id: EventId,
    timestamp: u64,
    kind: EventKind,
    payload: &serde_json::Value,
    previous_hash: EventHash,
) -> EventHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&id.0.to_be_bytes());
    hasher.update(&timestamp.to_be_bytes());
    hasher.update(kind.tag().as_bytes());
    hasher.update(payload.to_string().as_bytes());
    hasher.update(previous_hash.as_bytes());
    EventHash(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_deterministic() {
        let payload = json!({"cluster": 3, "weight": 55});
        let a = hash_event(EventId(1), 100, EventKind::ClusterFormed, &payload, EventHash::ZERO);
        let b = hash_event(EventId(1), 100, EventKind::ClusterFormed, &payload, EventHash::ZERO);
        assert_eq!(a, b);
    }

    #[test]
    fn any_field_changes_the_hash() {
        let payload = json!({"cluster": 3});
        let base = hash_event(EventId(1), 100, EventKind::ClusterFormed, &payload, EventHash::ZERO);

        assert_ne!(
            base,
            hash_event(EventId(2), 100, EventKind::ClusterFormed, &payload, EventHash::ZERO)
        );
        assert_ne!(
            base,
            hash_event(EventId(1), 101, EventKind::ClusterFormed, &payload, EventHash::ZERO)
        );
        assert_ne!(
            base,
            hash_event(EventId(1), 100, EventKind::ProblemSurfaced, &payload, EventHash::ZERO)
        );
        assert_ne!(
            base,
            hash_event(
                EventId(1),
                100,
                EventKind::ClusterFormed,
                &json!({"cluster": 4}),
                EventHash::ZERO
            )
        );
    }

    #[test]
    fn hex_round_trip() {
        let payload = json!({});
        let hash = hash_event(EventId(9), 5, EventKind::SignalSubmitted, &payload, EventHash::ZERO);
        assert_eq!(EventHash::from_hex(&hash.to_hex()).unwrap(), hash);
    }
}
