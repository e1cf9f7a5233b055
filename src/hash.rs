//! Integrity Hashing
//!
//! Optional SHA-256 sidecars over the on-disk (post-compression) bytes of
//! an entry. Explicit: nothing hashes automatically; callers opt in per
//! entry and verify when they care. Sidecars are removed with the entry.

use std::collections::HashMap;
use std::fs;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::LocalStore;

/// Integrity sidecar content (`<name>.hash.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashMeta {
    /// Cache key the digest belongs to
    pub name: String,
    /// Lowercase hex SHA-256 of the on-disk payload
    pub hash: String,
}

/// Lowercase hex SHA-256 digest of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

impl LocalStore {
    /// Record the current on-disk digest for `name`. Returns whether a
    /// sidecar was written (false when the blob is unreadable).
    pub fn save_hash(&self, name: &str) -> bool {
        let _lane = self.lane.write();
        let data = match self.disk.read_blob(name) {
            Ok(data) => data,
            Err(_) => return false,
        };
        let meta = HashMeta {
            name: name.to_string(),
            hash: sha256_hex(&data),
        };
        match serde_json::to_vec(&meta) {
            Ok(json) => match fs::write(self.disk.hash_path(name), json) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("writing hash sidecar for {} failed: {}", name, e);
                    false
                }
            },
            Err(_) => false,
        }
    }

    /// Verify `name`'s on-disk bytes against its recorded digest. False
    /// when the blob or sidecar is missing or the digests differ.
    pub fn verify_hash(&self, name: &str) -> bool {
        let _lane = self.lane.read();
        self.verify_hash_inner(name)
    }

    fn verify_hash_inner(&self, name: &str) -> bool {
        let data = match self.disk.read_blob(name) {
            Ok(data) => data,
            Err(_) => return false,
        };
        let sidecar = match fs::read(self.disk.hash_path(name)) {
            Ok(raw) => raw,
            Err(_) => return false,
        };
        let meta: HashMeta = match serde_json::from_slice(&sidecar) {
            Ok(meta) => meta,
            Err(_) => return false,
        };
        sha256_hex(&data) == meta.hash
    }

    /// Verify every live entry, keyed by name. Entries without a recorded
    /// digest report `false`.
    pub fn verify_all_hashes(&self) -> HashMap<String, bool> {
        let _lane = self.lane.read();
        self.disk
            .scan()
            .into_iter()
            .map(|entry| {
                let ok = self.verify_hash_inner(&entry.name);
                (entry.name, ok)
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
