//! Externalization seams: key-value state and content archival.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key-value persistence seam for engine state snapshots.
///
/// Values are JSON; a backing database (or a file, or nothing) lives on
/// the other side. The in-memory [`MemoryStore`] covers tests and
/// single-process runs.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&mut self, key: &str, value: serde_json::Value);
    /// All stored keys, sorted.
    fn keys(&self) -> Vec<String>;
}

/// In-memory [`KvStore`].
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, serde_json::Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: serde_json::Value) {
        self.entries.insert(key.to_owned(), value);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Content address of an archived payload: its Blake3 digest, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(pub String);

impl ContentId {
    /// Address for the given bytes.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(blake3::hash(bytes).as_bytes()))
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content-addressed bulk storage seam.
///
/// Large payloads (full signal descriptions, evidence attachments) go here
/// rather than into the ledger; the ledger keeps only the content id. The
/// archive is optional: its absence never blocks the pipeline.
pub trait ContentArchive {
    /// Store bytes, returning their content address.
    fn store(&mut self, bytes: &[u8]) -> ContentId;
    /// Retrieve previously stored bytes.
    fn retrieve(&self, id: &ContentId) -> Option<Vec<u8>>;
}

/// In-memory Blake3-addressed [`ContentArchive`].
#[derive(Debug, Default, Clone)]
pub struct MemoryArchive {
    blobs: BTreeMap<ContentId, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl ContentArchive for MemoryArchive {
    fn store(&mut self, bytes: &[u8]) -> ContentId {
        let id = ContentId::for_bytes(bytes);
        self.blobs.entry(id.clone()).or_insert_with(|| bytes.to_vec());
        id
    }

    fn retrieve(&self, id: &ContentId) -> Option<Vec<u8>> {
        self.blobs.get(id).cloned()
    }
}
