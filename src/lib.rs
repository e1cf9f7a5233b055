//! locastore - Process-Local Two-Tier Blob Cache
//!
//! A byte-blob cache keyed by string names, layered over a bounded memory
//! tier and a disk tier with per-entry metadata sidecars. Bounds disk
//! usage with a global byte ceiling and independent per-tag ceilings,
//! enforced by a pluggable eviction policy.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         LocalStore                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Memory Tier (LRU)      │  Disk Tier (source of truth)           │
//! │  ┌───────────────────┐  │  ┌───────────────────────────────────┐ │
//! │  │ decompressed      │  │  │ <name>            payload blob    │ │
//! │  │ payloads,         │  │  │ <name>.meta.json  metadata        │ │
//! │  │ byte-bounded      │  │  │ <name>.chunk.*    transfer state  │ │
//! │  └───────────────────┘  │  │ <name>.hash.json  integrity       │ │
//! │            │            │  └───────────────────────────────────┘ │
//! │            └────────────┴────────────┐                           │
//! │                                      │                           │
//! │   Quota Manager ── EvictionPolicy    │   ExpirePolicy            │
//! │   (global + per-tag ceilings)        │   (lazy + sweep)          │
//! │                                      │                           │
//! │   HeatTracker · ChangeListeners · OpLog · hit/miss stats         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! One exclusive-execution lane per store: mutating operations (writes,
//! removals, batch apply, chunk merge, sweeps, quota reconciliation) run
//! one at a time; reads run concurrently with each other. Async variants
//! are pure sugar over the blocking calls.
//!
//! # Modules
//!
//! - [`store`] - The engine: single-item ops, tags, quotas, expiry, stats
//! - [`meta`] - Per-entry metadata model
//! - [`memory`] / [`disk`] - The two storage tiers
//! - [`policy`] - Pluggable eviction and expiry strategies
//! - [`batch`] - Atomic multi-key apply with write rollback
//! - [`chunk`] - Resumable chunked ingestion and merge
//! - [`heat`] - Access-frequency/recency tracking
//! - [`events`] - Per-key change notification
//! - [`monitor`] - Usage snapshots and alerts
//! - [`compression`] - LZ4 disk-copy compression with fallback
//! - [`hash`] - SHA-256 integrity sidecars
//! - [`oplog`] - Bounded diagnostics journal
//! - [`error`] - Error types

pub mod async_api;
pub mod batch;
pub mod chunk;
pub mod compression;
pub mod disk;
pub mod error;
pub mod events;
pub mod hash;
pub mod heat;
pub mod memory;
pub mod meta;
pub mod monitor;
pub mod oplog;
pub mod policy;
pub mod store;
pub mod typed;

// Re-export commonly used types
pub use batch::BatchOp;
pub use chunk::{ChunkMeta, ChunkState};
pub use error::{Error, Result};
pub use events::{ChangeKind, SubscriptionId};
pub use hash::sha256_hex;
pub use heat::HeatTracker;
pub use meta::{CacheMeta, CachePriority};
pub use monitor::StoreSnapshot;
pub use oplog::OpLogEntry;
pub use policy::{DefaultEvictionPolicy, DefaultExpirePolicy, EvictionPolicy, ExpirePolicy};
pub use store::{CacheOptions, LocalStore, StoreConfig};
