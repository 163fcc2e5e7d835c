//! Sealed blocks and Merkle computation.

use serde::{Deserialize, Serialize};

use crate::event::{EventHash, LedgerEvent};

/// A sealed batch of events, immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    /// Sealing time, unix seconds.
    pub timestamp: u64,
    pub events: Vec<LedgerEvent>,
    pub hash: EventHash,
    pub previous_hash: EventHash,
    pub merkle_root: EventHash,
}

impl Block {
    /// Recompute the block hash from the stored fields.
    pub fn compute_hash(&self) -> EventHash {
        let event_hashes: Vec<EventHash> = self.events.iter().map(|e| e.hash).collect();
        hash_block(
            self.number,
            self.timestamp,
            &event_hashes,
            self.previous_hash,
            self.merkle_root,
        )
    }

    /// Recompute the Merkle root from the stored events.
    pub fn compute_merkle_root(&self) -> EventHash {
        let hashes: Vec<EventHash> = self.events.iter().map(|e| e.hash).collect();
        merkle_root(&hashes)
    }
}

/// Pairwise Blake3 reduction of event hashes.
///
/// An unpaired final node is carried up unchanged. An empty set reduces
/// to the zero hash.
pub fn merkle_root(hashes: &[EventHash]) -> EventHash {
    if hashes.is_empty() {
        return EventHash::ZERO;
    }
    let mut layer: Vec<EventHash> = hashes.to_vec();
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        for pair in layer.chunks(2) {
            match pair {
                [left, right] => next.push(hash_pair(left, right)),
                [odd] => next.push(*odd),
                _ => unreachable!("chunks(2) yields 1 or 2 items"),
            }
        }
        layer = next;
    }
    layer[0]
}

fn hash_pair(left: &EventHash, right: &EventHash) -> EventHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    EventHash(*hasher.finalize().as_bytes())
}

/// Blake3 over the canonical block encoding.
pub(crate) fn hash_block(
    number: u64,
    timestamp: u64,
    event_hashes: &[EventHash],
    previous_hash: EventHash,
    merkle_root: EventHash,
) -> EventHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&number.to_be_bytes());
    hasher.update(&timestamp.to_be_bytes());
    for event_hash in event_hashes {
        hasher.update(event_hash.as_bytes());
    }
    hasher.update(previous_hash.as_bytes());
    hasher.update(merkle_root.as_bytes());
    EventHash(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(seed: u8) -> EventHash {
        EventHash([seed; 32])
    }

    #[test]
    fn empty_set_reduces_to_zero() {
        assert_eq!(merkle_root(&[]), EventHash::ZERO);
    }

    #[test]
    fn single_hash_is_its_own_root() {
        assert_eq!(merkle_root(&[h(1)]), h(1));
    }

    #[test]
    fn pair_reduces_once() {
        assert_eq!(merkle_root(&[h(1), h(2)]), hash_pair(&h(1), &h(2)));
    }

    #[test]
    fn odd_node_carries_up_unchanged() {
        // [a b c] → [H(a,b), c] → H(H(a,b), c)
        let expected = hash_pair(&hash_pair(&h(1), &h(2)), &h(3));
        assert_eq!(merkle_root(&[h(1), h(2), h(3)]), expected);
    }

    #[test]
    fn five_leaves_reduce_deterministically() {
        let leaves = [h(1), h(2), h(3), h(4), h(5)];
        assert_eq!(merkle_root(&leaves), merkle_root(&leaves));
    }

    #[test]
    fn leaf_change_changes_the_root() {
        let a = merkle_root(&[h(1), h(2), h(3), h(4), h(5)]);
        let b = merkle_root(&[h(1), h(2), h(9), h(4), h(5)]);
        assert_ne!(a, b);
    }

    #[test]
    fn leaf_order_matters() {
        let a = merkle_root(&[h(1), h(2)]);
        let b = merkle_root(&[h(2), h(1)]);
        assert_ne!(a, b);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn flipping_any_leaf_changes_the_root(
                seeds in proptest::collection::vec(any::<u8>(), 1..16),
                index in any::<prop::sample::Index>(),
            ) {
                let leaves: Vec<EventHash> = seeds.iter().map(|&s| h(s)).collect();
                let original = merkle_root(&leaves);

                let i = index.index(leaves.len());
                let mut mutated = leaves.clone();
                mutated[i] = EventHash({
                    let mut bytes = *mutated[i].as_bytes();
                    bytes[0] ^= 0xFF;
                    bytes
                });
                prop_assert_ne!(merkle_root(&mutated), original);
            }
        }
    }
}
