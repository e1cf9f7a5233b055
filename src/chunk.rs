//! Chunked Transfer
//!
//! Resumable, out-of-order ingestion of a single logical payload. Each
//! fragment persists independently as `<name>.chunk.<index>`; submitting
//! chunk 0 also persists the assembly sidecar recording the expected
//! chunk count and total size. Merging verifies completeness *before*
//! touching anything, then concatenates strictly by ascending index into
//! a normal cache entry and clears the transfer artifacts.

use std::collections::BTreeSet;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::ChangeKind;
use crate::meta::CacheMeta;
use crate::store::LocalStore;

/// Assembly sidecar for an in-progress chunked transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Target cache key
    pub name: String,
    /// Expected number of chunks
    pub total_chunks: u32,
    /// Expected assembled size in bytes
    pub total_size: u64,
}

/// Observable state of a chunked transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkState {
    /// No chunks or assembly metadata present
    Empty,
    /// Some chunks present; carries the received index set
    Receiving(BTreeSet<u32>),
    /// Every chunk `0..total_chunks` present, ready to merge
    Ready,
}

impl LocalStore {
    /// Persist one fragment of a chunked transfer. Chunk 0 also persists
    /// the assembly sidecar. Fragments may arrive in any order and may be
    /// re-submitted; write errors are swallowed and the fragment simply
    /// stays absent for [`Self::uploaded_indexes`] to report.
    pub fn submit_chunk(
        &self,
        name: &str,
        index: u32,
        bytes: &[u8],
        total_chunks: u32,
        total_size: u64,
    ) {
        let _lane = self.lane.write();
        if let Err(e) = crate::disk::DiskTier::validate_name(name) {
            tracing::warn!("chunk submit rejected: {}", e);
            return;
        }

        if let Err(e) = fs::write(self.disk.chunk_path(name, index), bytes) {
            tracing::warn!("writing chunk {} of {} failed: {}", index, name, e);
            return;
        }

        if index == 0 {
            let meta = ChunkMeta {
                name: name.to_string(),
                total_chunks,
                total_size,
            };
            match serde_json::to_vec(&meta) {
                Ok(json) => {
                    if let Err(e) = fs::write(self.disk.chunk_meta_path(name), json) {
                        tracing::warn!("writing chunk metadata for {} failed: {}", name, e);
                    }
                }
                Err(e) => tracing::warn!("encoding chunk metadata for {} failed: {}", name, e),
            }
        }
        self.oplog.record("chunk", name, Some(format!("index {}", index)));
    }

    /// Indexes `0..total_chunks` whose fragment files already exist, so an
    /// interrupted transfer can resume with only the missing pieces.
    pub fn uploaded_indexes(&self, name: &str, total_chunks: u32) -> BTreeSet<u32> {
        let _lane = self.lane.read();
        (0..total_chunks)
            .filter(|i| self.disk.chunk_path(name, *i).exists())
            .collect()
    }

    /// Derive the transfer's current state from its on-disk artifacts
    pub fn transfer_state(&self, name: &str, total_chunks: u32) -> ChunkState {
        let received = self.uploaded_indexes(name, total_chunks);
        if received.is_empty() && !self.disk.chunk_meta_path(name).exists() {
            return ChunkState::Empty;
        }
        if received.len() == total_chunks as usize {
            return ChunkState::Ready;
        }
        ChunkState::Receiving(received)
    }

    /// Reassemble a completed transfer into a live cache entry.
    ///
    /// Fails with [`Error::IncompleteTransfer`] — mutating nothing — when
    /// the assembly sidecar or any fragment `0..total_chunks` is missing.
    /// On success the chunks are concatenated in ascending index order
    /// into the final entry (fresh default metadata), all transfer
    /// artifacts are deleted, and the global quota is reconciled.
    pub fn merge_chunks(&self, name: &str) -> Result<()> {
        {
            let _lane = self.lane.write();

            let meta = self.read_chunk_meta(name).ok_or_else(|| Error::IncompleteTransfer {
                name: name.to_string(),
                missing: Vec::new(),
            })?;

            let missing: Vec<u32> = (0..meta.total_chunks)
                .filter(|i| !self.disk.chunk_path(name, *i).exists())
                .collect();
            if !missing.is_empty() {
                return Err(Error::IncompleteTransfer {
                    name: name.to_string(),
                    missing,
                });
            }

            let mut assembled = Vec::with_capacity(meta.total_size as usize);
            for i in 0..meta.total_chunks {
                match fs::read(self.disk.chunk_path(name, i)) {
                    Ok(chunk) => assembled.extend_from_slice(&chunk),
                    Err(_) => {
                        return Err(Error::IncompleteTransfer {
                            name: name.to_string(),
                            missing: vec![i],
                        })
                    }
                }
            }
            if assembled.len() as u64 != meta.total_size {
                tracing::warn!(
                    "merged {}: assembled {} bytes, transfer recorded {}",
                    name,
                    assembled.len(),
                    meta.total_size
                );
            }

            self.write_entry_locked(name, &assembled, false, &CacheMeta::new())?;

            for i in 0..meta.total_chunks {
                if let Err(e) = fs::remove_file(self.disk.chunk_path(name, i)) {
                    tracing::warn!("removing chunk {} of {} failed: {}", i, name, e);
                }
            }
            if let Err(e) = fs::remove_file(self.disk.chunk_meta_path(name)) {
                tracing::warn!("removing chunk metadata for {} failed: {}", name, e);
            }

            self.oplog
                .record("merge", name, Some(format!("{} chunks", meta.total_chunks)));
            self.enforce_after_write_locked(&[]);
        }

        self.listeners.notify(name, ChangeKind::Set);
        Ok(())
    }

    fn read_chunk_meta(&self, name: &str) -> Option<ChunkMeta> {
        let data = fs::read(self.disk.chunk_meta_path(name)).ok()?;
        serde_json::from_slice(&data).ok()
    }
}

// =============================================================================
// Tests
// =============================================================================
