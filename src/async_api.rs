//! Async Wrappers
//!
//! Notification sugar over the synchronous engine: each wrapper runs the
//! corresponding blocking call on the tokio blocking pool and resumes the
//! caller when it completes. No new ordering, cancellation, or timeout
//! semantics — every operation still serializes through the store's
//! exclusive lane. `cache_many` bounds concurrent *callers* with a
//! semaphore; mutation concurrency is still one at a time.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::batch::BatchOp;
use crate::error::Result;
use crate::store::{CacheOptions, LocalStore};

impl LocalStore {
    /// Async [`LocalStore::cache`]
    pub async fn cache_async(
        self: &Arc<Self>,
        name: impl Into<String>,
        data: impl Into<Bytes>,
        opts: CacheOptions,
    ) {
        let store = Arc::clone(self);
        let name = name.into();
        let data = data.into();
        tokio::task::spawn_blocking(move || store.cache(&name, &data, opts))
            .await
            .expect("cache task panicked");
    }

    /// Async [`LocalStore::get`]
    pub async fn get_async(self: &Arc<Self>, name: impl Into<String>) -> Option<Bytes> {
        let store = Arc::clone(self);
        let name = name.into();
        tokio::task::spawn_blocking(move || store.get(&name))
            .await
            .expect("get task panicked")
    }

    /// Async [`LocalStore::remove`]
    pub async fn remove_async(self: &Arc<Self>, name: impl Into<String>) {
        let store = Arc::clone(self);
        let name = name.into();
        tokio::task::spawn_blocking(move || store.remove(&name))
            .await
            .expect("remove task panicked");
    }

    /// Async [`LocalStore::clean_expired`]
    pub async fn clean_expired_async(self: &Arc<Self>) {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.clean_expired())
            .await
            .expect("sweep task panicked");
    }

    /// Async [`LocalStore::apply_batch`]
    pub async fn apply_batch_async(self: &Arc<Self>, ops: Vec<BatchOp>) -> Result<()> {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.apply_batch(ops))
            .await
            .expect("batch task panicked")
    }

    /// Async [`LocalStore::merge_chunks`]
    pub async fn merge_chunks_async(self: &Arc<Self>, name: impl Into<String>) -> Result<()> {
        let store = Arc::clone(self);
        let name = name.into();
        tokio::task::spawn_blocking(move || store.merge_chunks(&name))
            .await
            .expect("merge task panicked")
    }

    /// Write many unrelated items with at most `max_concurrent` in flight.
    ///
    /// The semaphore bounds concurrent callers only: each item's actual
    /// mutation still enters the exclusive lane internally.
    pub async fn cache_many(
        self: &Arc<Self>,
        items: Vec<(String, Bytes, CacheOptions)>,
        max_concurrent: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for (name, data, opts) in items {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore closed");
            let store = Arc::clone(self);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                store.cache(&name, &data, opts);
            });
        }

        while tasks.join_next().await.is_some() {}
    }
}

// =============================================================================
// Tests
// =============================================================================
