//! The append-only chain.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::block::{hash_block, merkle_root, Block};
use crate::event::{hash_event, EventHash, EventId, EventKind, LedgerEvent};
use crate::{Error, Result};

/// Pending events per sealed block.
pub const BATCH_SIZE: usize = 5;

/// What an append did.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    pub event_id: EventId,
    pub event_hash: EventHash,
    /// Set when this append filled the batch and sealed a block.
    pub sealed_block: Option<u64>,
}

/// Audit export: the full chain for independent re-verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerExport {
    pub blocks: Vec<Block>,
    /// Events not yet sealed into a block.
    pub pending: Vec<LedgerEvent>,
}

/// The append-only, hash-linked event log.
///
/// Single-writer: wrap in a mutex (or give it one owner) before sharing.
#[derive(Debug)]
pub struct Ledger {
    blocks: Vec<Block>,
    pending: Vec<LedgerEvent>,
    next_event: u64,
    clock: fn() -> u64,
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            pending: Vec::new(),
            next_event: 0,
            clock: unix_now,
        }
    }

    /// Override the timestamp source (tests).
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Rebuild a ledger from an export, verifying it before accepting.
    pub fn from_export(export: LedgerExport) -> Result<Self> {
        let next_event = export
            .blocks
            .iter()
            .flat_map(|b| b.events.iter())
            .chain(export.pending.iter())
            .map(|e| e.id.0 + 1)
            .max()
            .unwrap_or(0);
        let ledger = Self {
            blocks: export.blocks,
            pending: export.pending,
            next_event,
            clock: unix_now,
        };
        ledger.verify_chain_integrity()?;
        Ok(ledger)
    }

    /// Append one event; seals a block when the batch fills.
    ///
    /// The event links to the previous pending event, or to the last
    /// sealed block when the queue is fresh, or to the zero hash at
    /// genesis.
    pub fn append(&mut self, kind: EventKind, payload: serde_json::Value) -> AppendOutcome {
        let previous_hash = match self.pending.last() {
            Some(event) => event.hash,
            None => self
                .blocks
                .last()
                .map(|b| b.hash)
                .unwrap_or(EventHash::ZERO),
        };

        let id = EventId(self.next_event);
        self.next_event += 1;
        let timestamp = (self.clock)();
        let hash = hash_event(id, timestamp, kind, &payload, previous_hash);
        debug!(event = %id, ?kind, %hash, "event appended");
        self.pending.push(LedgerEvent {
            id,
            timestamp,
            kind,
            payload,
            hash,
            previous_hash,
        });

        let sealed_block = (self.pending.len() >= BATCH_SIZE).then(|| self.seal());
        AppendOutcome {
            event_id: id,
            event_hash: hash,
            sealed_block,
        }
    }

    /// Seal the pending queue into a block and reset it.
    fn seal(&mut self) -> u64 {
        let number = self.blocks.len() as u64;
        let timestamp = (self.clock)();
        let previous_hash = self
            .blocks
            .last()
            .map(|b| b.hash)
            .unwrap_or(EventHash::ZERO);
        let events = std::mem::take(&mut self.pending);
        let event_hashes: Vec<EventHash> = events.iter().map(|e| e.hash).collect();
        let root = merkle_root(&event_hashes);
        let hash = hash_block(number, timestamp, &event_hashes, previous_hash, root);

        info!(block = number, events = events.len(), %hash, "block sealed");
        self.blocks.push(Block {
            number,
            timestamp,
            events,
            hash,
            previous_hash,
            merkle_root: root,
        });
        number
    }

    /// Sealed blocks, oldest first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Events still waiting in the batch queue.
    pub fn pending(&self) -> &[LedgerEvent] {
        &self.pending
    }

    /// Recompute the entire chain and confirm linkage.
    ///
    /// Checks event hashes, intra-block event linkage, Merkle roots,
    /// block hashes, and block-to-block `previous_hash` continuity. Any
    /// mismatch is tampering.
    pub fn verify_chain_integrity(&self) -> Result<()> {
        let mut expected_previous = EventHash::ZERO;
        for block in &self.blocks {
            if block.previous_hash != expected_previous {
                return Err(self.violation(block.number, "broken block linkage"));
            }

            let mut event_previous = expected_previous;
            for event in &block.events {
                if event.previous_hash != event_previous {
                    return Err(self.violation(block.number, "broken event linkage"));
                }
                if event.compute_hash() != event.hash {
                    return Err(self.violation(
                        block.number,
                        format!("event {} hash mismatch", event.id),
                    ));
                }
                event_previous = event.hash;
            }

            if block.compute_merkle_root() != block.merkle_root {
                return Err(self.violation(block.number, "merkle root mismatch"));
            }
            if block.compute_hash() != block.hash {
                return Err(self.violation(block.number, "block hash mismatch"));
            }
            expected_previous = block.hash;
        }

        // Pending events chain off the last sealed block.
        let mut event_previous = expected_previous;
        for event in &self.pending {
            let block = self.blocks.len() as u64;
            if event.previous_hash != event_previous {
                return Err(self.violation(block, "broken pending linkage"));
            }
            if event.compute_hash() != event.hash {
                return Err(self.violation(block, format!("pending event {} hash mismatch", event.id)));
            }
            event_previous = event.hash;
        }
        Ok(())
    }

    fn violation(&self, block: u64, detail: impl Into<String>) -> Error {
        let detail = detail.into();
        error!(block, detail, "ledger integrity violation");
        Error::IntegrityViolation { block, detail }
    }

    /// Verify that a claimed event-hash set reproduces a block's stored
    /// Merkle root.
    pub fn verify_merkle_proof(&self, block_number: u64, claimed: &[EventHash]) -> Result<bool> {
        let block = self
            .blocks
            .get(block_number as usize)
            .ok_or(Error::UnknownBlock(block_number))?;
        Ok(merkle_root(claimed) == block.merkle_root)
    }

    /// Full chain export for third-party re-verification.
    pub fn export(&self) -> LedgerExport {
        LedgerExport {
            blocks: self.blocks.clone(),
            pending: self.pending.clone(),
        }
    }

    /// Export as JSON.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_ledger() -> Ledger {
        Ledger::new().with_clock(|| 1_700_000_000)
    }

    #[test]
    fn fifth_event_seals_exactly_one_block() {
        let mut ledger = test_ledger();
        for i in 0..4 {
            let outcome = ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
            assert_eq!(outcome.sealed_block, None);
        }
        assert_eq!(ledger.blocks().len(), 0);
        assert_eq!(ledger.pending().len(), 4);

        let outcome = ledger.append(EventKind::SignalSubmitted, json!({ "n": 4 }));
        assert_eq!(outcome.sealed_block, Some(0));
        assert_eq!(ledger.blocks().len(), 1);
        assert_eq!(ledger.blocks()[0].events.len(), BATCH_SIZE);
        assert!(ledger.pending().is_empty());

        // The sixth event starts a fresh queue.
        ledger.append(EventKind::ClusterFormed, json!({ "n": 5 }));
        assert_eq!(ledger.pending().len(), 1);
        assert_eq!(ledger.blocks().len(), 1);
    }

    #[test]
    fn events_link_by_hash() {
        let mut ledger = test_ledger();
        let first = ledger.append(EventKind::SignalSubmitted, json!({ "n": 0 }));
        ledger.append(EventKind::SignalSubmitted, json!({ "n": 1 }));

        assert_eq!(ledger.pending()[0].previous_hash, EventHash::ZERO);
        assert_eq!(ledger.pending()[1].previous_hash, first.event_hash);
    }

    #[test]
    fn first_event_after_seal_links_to_block_hash() {
        let mut ledger = test_ledger();
        for i in 0..5 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        let block_hash = ledger.blocks()[0].hash;
        ledger.append(EventKind::ClusterFormed, json!({}));
        assert_eq!(ledger.pending()[0].previous_hash, block_hash);
    }

    #[test]
    fn blocks_chain_by_hash() {
        let mut ledger = test_ledger();
        for i in 0..10 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        let blocks = ledger.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].previous_hash, EventHash::ZERO);
        assert_eq!(blocks[1].previous_hash, blocks[0].hash);
    }

    #[test]
    fn intact_chain_verifies() {
        let mut ledger = test_ledger();
        for i in 0..23 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        assert!(ledger.verify_chain_integrity().is_ok());
    }

    #[test]
    fn tampered_payload_is_detected() {
        let mut ledger = test_ledger();
        for i in 0..10 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        assert!(ledger.verify_chain_integrity().is_ok());

        ledger.blocks[0].events[2].payload = json!({ "n": 999 });

        let err = ledger.verify_chain_integrity().unwrap_err();
        assert!(matches!(err, Error::IntegrityViolation { block: 0, .. }));
    }

    #[test]
    fn tampered_block_linkage_is_detected() {
        let mut ledger = test_ledger();
        for i in 0..10 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        ledger.blocks[1].previous_hash = EventHash::ZERO;
        assert!(ledger.verify_chain_integrity().is_err());
    }

    #[test]
    fn tampered_pending_event_is_detected() {
        let mut ledger = test_ledger();
        for i in 0..7 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        ledger.pending[1].payload = json!({ "n": -1 });
        assert!(ledger.verify_chain_integrity().is_err());
    }

    #[test]
    fn merkle_proof_accepts_true_events_and_rejects_fakes() {
        let mut ledger = test_ledger();
        for i in 0..5 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        let hashes: Vec<EventHash> =
            ledger.blocks()[0].events.iter().map(|e| e.hash).collect();
        assert!(ledger.verify_merkle_proof(0, &hashes).unwrap());

        let mut forged = hashes.clone();
        forged[0] = EventHash([0xAB; 32]);
        assert!(!ledger.verify_merkle_proof(0, &forged).unwrap());

        assert!(matches!(
            ledger.verify_merkle_proof(9, &hashes),
            Err(Error::UnknownBlock(9))
        ));
    }

    #[test]
    fn export_round_trips_through_json() {
        let mut ledger = test_ledger();
        for i in 0..6 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        let json = ledger.export_json().unwrap();
        let decoded: LedgerExport = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.blocks, ledger.blocks());
        assert_eq!(decoded.pending, ledger.pending());
    }

    #[test]
    fn from_export_resumes_where_the_export_stopped() {
        let mut ledger = test_ledger();
        for i in 0..7 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        let mut restored = Ledger::from_export(ledger.export()).unwrap();
        assert_eq!(restored.blocks().len(), 1);
        assert_eq!(restored.pending().len(), 2);

        let outcome = restored.append(EventKind::ClusterFormed, json!({}));
        assert_eq!(outcome.event_id, EventId(7));
        assert!(restored.verify_chain_integrity().is_ok());
    }

    #[test]
    fn from_export_rejects_a_tampered_export() {
        let mut ledger = test_ledger();
        for i in 0..5 {
            ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
        }
        let mut export = ledger.export();
        export.blocks[0].events[0].payload = json!({ "forged": true });
        assert!(Ledger::from_export(export).is_err());
    }

    #[test]
    fn event_ids_are_sequential_across_blocks() {
        let mut ledger = test_ledger();
        for i in 0..12 {
            let outcome = ledger.append(EventKind::SignalSubmitted, json!({ "n": i }));
            assert_eq!(outcome.event_id, EventId(i));
        }
    }
}
