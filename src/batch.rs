//! Atomic Batch Operations
//!
//! Applies an ordered list of write/remove operations as a unit inside
//! one exclusive-lane window. Every operation is attempted even after a
//! failure; if any failed, all of the batch's *successful writes* are
//! rolled back before the full failed-key list is reported. Removals are
//! idempotent cleanup and are never rolled back — a successful removal in
//! a failed batch is permanent.

use std::collections::BTreeSet;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::events::ChangeKind;
use crate::store::{CacheOptions, LocalStore};

/// One operation in an atomic batch
pub enum BatchOp {
    /// Write `data` under `name` with the given options
    Write {
        name: String,
        data: Bytes,
        opts: CacheOptions,
    },
    /// Remove the entry under `name`
    Remove { name: String },
}

impl BatchOp {
    /// Write operation
    pub fn write(name: impl Into<String>, data: impl Into<Bytes>, opts: CacheOptions) -> Self {
        BatchOp::Write {
            name: name.into(),
            data: data.into(),
            opts,
        }
    }

    /// Remove operation
    pub fn remove(name: impl Into<String>) -> Self {
        BatchOp::Remove { name: name.into() }
    }

    /// Key this operation targets
    pub fn name(&self) -> &str {
        match self {
            BatchOp::Write { name, .. } => name,
            BatchOp::Remove { name } => name,
        }
    }
}

impl LocalStore {
    /// Apply `ops` in order as a unit.
    ///
    /// On success every operation's target reflects its new state and
    /// quotas have been reconciled. On failure the store looks as if none
    /// of the batch's writes ever happened, removals that succeeded are
    /// permanent, and the error carries exactly the keys that failed.
    pub fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut written: Vec<(String, Vec<String>)> = Vec::new();
        let mut removed: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();

        {
            let _lane = self.lane.write();

            for op in &ops {
                match op {
                    BatchOp::Write { name, data, opts } => {
                        let meta = opts.to_meta();
                        match self.write_entry_locked(name, data, opts.compress, &meta) {
                            Ok(()) => written.push((name.clone(), meta.tags)),
                            Err(e) => {
                                tracing::warn!("batch write for {} failed: {}", name, e);
                                failed.push(name.clone());
                            }
                        }
                    }
                    BatchOp::Remove { name } => match self.disk.remove_entry(name) {
                        Ok(()) => {
                            self.memory.remove(name);
                            removed.push(name.clone());
                        }
                        Err(e) => {
                            tracing::warn!("batch remove for {} failed: {}", name, e);
                            failed.push(name.clone());
                        }
                    },
                }
            }

            if failed.is_empty() {
                for (name, _) in &written {
                    self.oplog.record("cache", name, Some("batch".into()));
                }
                for name in &removed {
                    self.oplog.record("remove", name, Some("batch".into()));
                }
                let tags: BTreeSet<String> = written
                    .iter()
                    .flat_map(|(_, tags)| tags.iter().cloned())
                    .collect();
                let tags: Vec<String> = tags.into_iter().collect();
                self.enforce_after_write_locked(&tags);
            } else {
                for (name, _) in &written {
                    self.remove_entry_locked(name);
                }
                self.oplog.record(
                    "batch-rollback",
                    "*",
                    Some(format!("{} ops failed", failed.len())),
                );
            }
        }

        // Removals that succeeded are permanent either way
        for name in &removed {
            self.listeners.notify(name, ChangeKind::Removed);
        }
        if failed.is_empty() {
            for (name, _) in &written {
                self.listeners.notify(name, ChangeKind::Set);
            }
            Ok(())
        } else {
            Err(Error::PartialBatchFailure { failed })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open_at(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_batch_success_all_visible() {
        let (_dir, store) = store();

        store
            .apply_batch(vec![
                BatchOp::write("a", &b"one"[..], CacheOptions::default()),
                BatchOp::write("b", &b"two"[..], CacheOptions::default()),
            ])
            .unwrap();

        assert_eq!(store.get("a").unwrap().as_ref(), b"one");
        assert_eq!(store.get("b").unwrap().as_ref(), b"two");
    }

    #[test]
    fn test_batch_failure_rolls_back_writes() {
        let (_dir, store) = store();

        // A key with a path separator cannot be persisted
        let result = store.apply_batch(vec![
            BatchOp::write("good", &b"ok"[..], CacheOptions::default()),
            BatchOp::write("bad/slash", &b"nope"[..], CacheOptions::default()),
        ]);

        assert_matches!(
            result,
            Err(Error::PartialBatchFailure { ref failed }) if failed == &vec!["bad/slash".to_string()]
        );

        // No write from the batch is visible
        assert!(store.get("good").is_none());
        assert!(store.disk.scan().is_empty());
    }

    #[test]
    fn test_batch_all_ops_attempted_failures_collected() {
        let (_dir, store) = store();

        let result = store.apply_batch(vec![
            BatchOp::write("bad/one", &b"x"[..], CacheOptions::default()),
            BatchOp::write("fine", &b"y"[..], CacheOptions::default()),
            BatchOp::write("bad/two", &b"z"[..], CacheOptions::default()),
        ]);

        assert_matches!(result, Err(Error::PartialBatchFailure { ref failed }) if failed.len() == 2);
        assert!(store.get("fine").is_none());
    }

    #[test]
    fn test_batch_successful_removals_are_permanent() {
        let (_dir, store) = store();
        store.cache("victim", b"data", CacheOptions::default());

        let result = store.apply_batch(vec![
            BatchOp::remove("victim"),
            BatchOp::write("bad/key", &b"x"[..], CacheOptions::default()),
        ]);

        assert!(result.is_err());
        // The removal stuck even though the batch failed
        assert!(store.get("victim").is_none());
    }

    #[test]
    fn test_batch_remove_nonexistent_is_success() {
        let (_dir, store) = store();

        store
            .apply_batch(vec![BatchOp::remove("ghost")])
            .unwrap();
    }

    #[test]
    fn test_batch_mixed_write_and_remove() {
        let (_dir, store) = store();
        store.cache("old", b"stale", CacheOptions::default());

        store
            .apply_batch(vec![
                BatchOp::remove("old"),
                BatchOp::write("new", &b"fresh"[..], CacheOptions::default()),
            ])
            .unwrap();

        assert!(store.get("old").is_none());
        assert_eq!(store.get("new").unwrap().as_ref(), b"fresh");
    }

    #[test]
    fn test_batch_reconciles_quotas_on_success() {
        let (_dir, store) = store();
        store.set_global_limit(1024);

        store
            .apply_batch(vec![
                BatchOp::write(
                    "a",
                    vec![0u8; 900],
                    CacheOptions::new().compress(false),
                ),
                BatchOp::write(
                    "b",
                    vec![0u8; 900],
                    CacheOptions::new().compress(false),
                ),
            ])
            .unwrap();

        assert!(store.used_bytes() <= 1024);
    }

    #[test]
    fn test_batch_failure_emits_no_set_events() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let (_dir, store) = store();
        let sets = Arc::new(AtomicUsize::new(0));
        let sets_clone = Arc::clone(&sets);
        store.subscribe(Box::new(move |_, kind| {
            if kind == ChangeKind::Set {
                sets_clone.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let _ = store.apply_batch(vec![
            BatchOp::write("ok", &b"x"[..], CacheOptions::default()),
            BatchOp::write("bad/key", &b"y"[..], CacheOptions::default()),
        ]);

        assert_eq!(sets.load(Ordering::SeqCst), 0);
    }
}
