//! Local Store Engine
//!
//! The cache engine proper: a disk tier as source of truth, a bounded
//! memory tier in front of it, pluggable eviction and expiry policies,
//! global and per-tag byte quotas, and change notification.
//!
//! # Concurrency
//!
//! One exclusive-execution lane per store: every mutating operation holds
//! the lane's write lock, reads hold the read lock. A read that discovers
//! an expired entry drops its read lock and re-enters through the
//! mutating path to remove it. Change events are delivered after the
//! triggering mutation has released the lane.
//!
//! # Quotas
//!
//! Enforcement is admit-then-reconcile: a write is always accepted, then
//! the global ceiling and every constrained tag the entry carries are
//! re-checked, evicting in policy order. Usage is recomputed from a fresh
//! disk listing after every physical removal, never estimated.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::compression::{CompressionConfig, CompressionManager};
use crate::disk::DiskTier;
use crate::error::{Error, Result};
use crate::events::{ChangeHandler, ChangeKind, ChangeListeners, SubscriptionId};
use crate::heat::HeatTracker;
use crate::memory::{MemoryTier, MemoryTierConfig};
use crate::meta::{CacheMeta, CachePriority};
use crate::monitor::UsageAlertHandler;
use crate::oplog::{OpLog, OpLogEntry};
use crate::policy::{DefaultEvictionPolicy, DefaultExpirePolicy, EvictionPolicy, ExpirePolicy};

/// Default global byte ceiling (100MB)
pub const DEFAULT_MAX_BYTES: u64 = 100 * 1024 * 1024;

/// Store construction parameters
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root cache directory; created if absent
    pub root: PathBuf,
    /// Global byte ceiling for the disk tier
    pub max_bytes: u64,
    /// Memory-tier bounds
    pub memory: MemoryTierConfig,
    /// Disk-tier compression settings
    pub compression: CompressionConfig,
}

impl StoreConfig {
    /// Configuration rooted at `root` with defaults everywhere else
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            memory: MemoryTierConfig::default(),
            compression: CompressionConfig::default(),
        }
    }

    /// Set the global byte ceiling
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

/// Per-write options for [`LocalStore::cache`]
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Expire the entry this long after the write; `None` = no expiry
    pub expire_in: Option<Duration>,
    /// Eviction priority
    pub priority: CachePriority,
    /// Tag labels
    pub tags: Vec<String>,
    /// Attempt LZ4 compression for the disk copy
    pub compress: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            expire_in: None,
            priority: CachePriority::Low,
            tags: Vec::new(),
            compress: true,
        }
    }
}

impl CacheOptions {
    /// Options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire this long after the write
    pub fn expire_in(mut self, duration: Duration) -> Self {
        self.expire_in = Some(duration);
        self
    }

    /// Set the eviction priority
    pub fn priority(mut self, priority: CachePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the tag labels
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Enable or disable disk-copy compression
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub(crate) fn to_meta(&self) -> CacheMeta {
        CacheMeta {
            expire_at: self.expire_in.map(expire_instant),
            priority: self.priority,
            tags: self.tags.clone(),
        }
    }
}

fn expire_instant(d: Duration) -> DateTime<Utc> {
    match chrono::Duration::from_std(d) {
        Ok(cd) => Utc::now() + cd,
        Err(_) => DateTime::<Utc>::MAX_UTC,
    }
}

/// Process-local two-tier blob cache
pub struct LocalStore {
    pub(crate) disk: DiskTier,
    pub(crate) memory: MemoryTier,
    pub(crate) compression: CompressionManager,
    /// Exclusive-execution lane: write = mutating op, read = query
    pub(crate) lane: RwLock<()>,
    eviction_policy: RwLock<Arc<dyn EvictionPolicy>>,
    expire_policy: RwLock<Arc<dyn ExpirePolicy>>,
    max_bytes: AtomicU64,
    tag_limits: RwLock<HashMap<String, u64>>,
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) heat: HeatTracker,
    pub(crate) listeners: ChangeListeners,
    pub(crate) oplog: OpLog,
    pub(crate) alert_threshold: Mutex<f64>,
    pub(crate) alert_handler: Mutex<Option<UsageAlertHandler>>,
}

impl LocalStore {
    /// Open a store rooted at `config.root`, creating the directory if
    /// needed. Sweeps already-expired entries and reconciles the global
    /// quota before returning. Directory-creation failure is the only
    /// fatal error.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Self {
            disk: DiskTier::open(config.root)?,
            memory: MemoryTier::with_config(config.memory),
            compression: CompressionManager::with_config(config.compression),
            lane: RwLock::new(()),
            eviction_policy: RwLock::new(Arc::new(DefaultEvictionPolicy)),
            expire_policy: RwLock::new(Arc::new(DefaultExpirePolicy)),
            max_bytes: AtomicU64::new(config.max_bytes),
            tag_limits: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            heat: HeatTracker::new(),
            listeners: ChangeListeners::new(),
            oplog: OpLog::new(),
            alert_threshold: Mutex::new(0.8),
            alert_handler: Mutex::new(None),
        };
        store.clean_expired();
        if let Err(e) = store.enforce_global_quota() {
            tracing::warn!("initial quota reconciliation: {}", e);
        }
        Ok(store)
    }

    /// Open with defaults rooted at `root`
    pub fn open_at(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::new(root))
    }

    // -------------------------------------------------------------------------
    // Single-item operations
    // -------------------------------------------------------------------------

    /// Write `data` under `name`, replacing any previous entry outright.
    ///
    /// The memory tier receives the bytes verbatim; the disk copy is
    /// LZ4-compressed when `opts.compress` and compression both succeeds
    /// and shrinks. The call never fails: write errors are swallowed,
    /// counted, and logged, leaving no entry behind.
    pub fn cache(&self, name: &str, data: &[u8], opts: CacheOptions) {
        let meta = opts.to_meta();
        let written = {
            let _lane = self.lane.write();
            match self.write_entry_locked(name, data, opts.compress, &meta) {
                Ok(()) => {
                    self.oplog.record("cache", name, None);
                    self.enforce_after_write_locked(&meta.tags);
                    true
                }
                Err(e) => {
                    tracing::warn!("cache write for {} failed: {}", name, e);
                    false
                }
            }
        };
        if written {
            self.listeners.notify(name, ChangeKind::Set);
        }
    }

    /// Read the entry under `name`.
    ///
    /// Records the access for heat tracking, checks expiry first (removing
    /// and notifying on discovery), then serves from the memory tier,
    /// falling back to disk and repopulating memory with the decompressed
    /// bytes.
    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.heat.record_access(name);

        {
            let _lane = self.lane.read();
            let meta = match self.disk.get_meta(name) {
                Some(meta) => meta,
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            };

            if !self.is_expired(name, &meta) {
                if let Some(data) = self.memory.get(name) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(data);
                }
                return match self.disk.read_blob(name) {
                    Ok(raw) => {
                        let data = self.compression.decompress_or_raw(&raw);
                        self.memory.insert(name, data.clone());
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        Some(data)
                    }
                    Err(_) => {
                        self.misses.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                };
            }
        }

        // Expiry discovered under the read lock: re-enter as a mutation.
        let expired = {
            let _lane = self.lane.write();
            match self.disk.get_meta(name) {
                Some(meta) if self.is_expired(name, &meta) => {
                    self.remove_entry_locked(name);
                    self.oplog.record("expire", name, None);
                    true
                }
                _ => false,
            }
        };
        if expired {
            self.listeners.notify(name, ChangeKind::Expired);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Like [`Self::get`], but absent-or-expired surfaces as
    /// [`Error::NotFound`] for callers threading `Result` chains
    pub fn try_get(&self, name: &str) -> Result<Bytes> {
        self.get(name).ok_or_else(|| Error::NotFound {
            name: name.to_string(),
        })
    }

    /// Remove the entry under `name`. Removing a nonexistent key is a
    /// no-op, not an error.
    pub fn remove(&self, name: &str) {
        {
            let _lane = self.lane.write();
            self.remove_entry_locked(name);
            self.oplog.record("remove", name, None);
        }
        self.listeners.notify(name, ChangeKind::Removed);
    }

    /// Read several entries; the result maps every requested name
    pub fn get_many(&self, names: &[&str]) -> HashMap<String, Option<Bytes>> {
        names
            .iter()
            .map(|name| (name.to_string(), self.get(name)))
            .collect()
    }

    /// Remove several entries
    pub fn remove_many(&self, names: &[&str]) {
        for name in names {
            self.remove(name);
        }
    }

    // -------------------------------------------------------------------------
    // Tags
    // -------------------------------------------------------------------------

    /// Names of live entries carrying `tag`
    pub fn files_with_tag(&self, tag: &str) -> Vec<String> {
        let _lane = self.lane.read();
        self.disk.files_with_tag(tag)
    }

    /// Remove every live entry carrying `tag`
    pub fn remove_by_tag(&self, tag: &str) {
        let removed = {
            let _lane = self.lane.write();
            let names = self.disk.files_with_tag(tag);
            for name in &names {
                self.remove_entry_locked(name);
                self.oplog.record("remove", name, Some(format!("tag:{}", tag)));
            }
            names
        };
        for name in &removed {
            self.listeners.notify(name, ChangeKind::Removed);
        }
    }

    /// Tag labels recorded for `name`, if the entry exists
    pub fn tags_of(&self, name: &str) -> Option<Vec<String>> {
        let _lane = self.lane.read();
        self.disk.get_meta(name).map(|m| m.tags)
    }

    // -------------------------------------------------------------------------
    // Expiry
    // -------------------------------------------------------------------------

    /// Effective expiry instant for `name` under the current policy
    pub fn expire_date(&self, name: &str) -> Option<DateTime<Utc>> {
        let _lane = self.lane.read();
        let meta = self.disk.get_meta(name)?;
        self.expire_policy.read().expire_at(name, &meta)
    }

    /// Sweep the whole store, removing every entry whose policy-computed
    /// expiry is in the past. Removal failures are swallowed; the sweep
    /// continues with the remaining entries.
    pub fn clean_expired(&self) {
        let expired = {
            let _lane = self.lane.write();
            let mut expired = Vec::new();
            for entry in self.disk.scan() {
                if self.is_expired(&entry.name, &entry.meta) {
                    self.remove_entry_locked(&entry.name);
                    self.oplog.record("expire", &entry.name, Some("sweep".into()));
                    expired.push(entry.name);
                }
            }
            expired
        };
        for name in &expired {
            self.listeners.notify(name, ChangeKind::Expired);
        }
    }

    fn is_expired(&self, name: &str, meta: &CacheMeta) -> bool {
        match self.expire_policy.read().expire_at(name, meta) {
            Some(at) => at <= Utc::now(),
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Quotas & policies
    // -------------------------------------------------------------------------

    /// Current global byte ceiling
    pub fn global_limit(&self) -> u64 {
        self.max_bytes.load(Ordering::Relaxed)
    }

    /// Set the global byte ceiling and reconcile immediately. An
    /// unenforceable outcome is logged; use [`Self::enforce_global_quota`]
    /// to observe it.
    pub fn set_global_limit(&self, max_bytes: u64) {
        self.max_bytes.store(max_bytes, Ordering::Relaxed);
        if let Err(e) = self.enforce_global_quota() {
            tracing::warn!("quota reconciliation after limit change: {}", e);
        }
    }

    /// Byte ceiling for `tag`, if one is configured
    pub fn tag_limit(&self, tag: &str) -> Option<u64> {
        self.tag_limits.read().get(tag).copied()
    }

    /// Set the byte ceiling for `tag`; zero clears it (unbounded). The
    /// next write carrying the tag reconciles, or call
    /// [`Self::enforce_tag_quota`] explicitly.
    pub fn set_tag_limit(&self, tag: &str, max_bytes: u64) {
        let _lane = self.lane.write();
        let mut limits = self.tag_limits.write();
        if max_bytes == 0 {
            limits.remove(tag);
        } else {
            limits.insert(tag.to_string(), max_bytes);
        }
    }

    /// Tags that currently have a byte ceiling configured
    pub fn limited_tags(&self) -> Vec<String> {
        self.tag_limits.read().keys().cloned().collect()
    }

    /// Swap the eviction policy
    pub fn set_eviction_policy(&self, policy: Arc<dyn EvictionPolicy>) {
        let _lane = self.lane.write();
        *self.eviction_policy.write() = policy;
    }

    /// Swap the expiry policy
    pub fn set_expire_policy(&self, policy: Arc<dyn ExpirePolicy>) {
        let _lane = self.lane.write();
        *self.expire_policy.write() = policy;
    }

    /// Bytes currently on disk across live entries
    pub fn used_bytes(&self) -> u64 {
        let _lane = self.lane.read();
        self.disk.used_bytes()
    }

    /// Bytes currently on disk across live entries carrying `tag`
    pub fn tag_used_bytes(&self, tag: &str) -> u64 {
        let _lane = self.lane.read();
        self.disk.tag_used_bytes(tag)
    }

    /// Reconcile the global quota now, evicting in policy order until
    /// usage fits the ceiling. Reports `QuotaUnenforceable` when the
    /// candidate list runs out first.
    pub fn enforce_global_quota(&self) -> Result<()> {
        let _lane = self.lane.write();
        self.enforce_global_locked()
    }

    /// Reconcile a single tag's quota now
    pub fn enforce_tag_quota(&self, tag: &str) -> Result<()> {
        let _lane = self.lane.write();
        self.enforce_tag_locked(tag)
    }

    fn enforce_global_locked(&self) -> Result<()> {
        let limit = self.max_bytes.load(Ordering::Relaxed);
        let mut total = self.disk.used_bytes();
        if total <= limit {
            return Ok(());
        }

        let entries: Vec<(String, CacheMeta)> = self
            .disk
            .scan()
            .into_iter()
            .map(|e| (e.name, e.meta))
            .collect();
        let order = self
            .eviction_policy
            .read()
            .files_to_evict(&entries, total, limit);

        for name in order {
            if total <= limit {
                break;
            }
            self.evict_one_locked(&name);
            total = self.disk.used_bytes();
        }

        if total > limit {
            return Err(Error::QuotaUnenforceable {
                scope: "global".into(),
                used: total,
                limit,
            });
        }
        Ok(())
    }

    fn enforce_tag_locked(&self, tag: &str) -> Result<()> {
        let limit = match self.tag_limits.read().get(tag).copied() {
            Some(limit) if limit > 0 => limit,
            _ => return Ok(()),
        };
        let mut total = self.disk.tag_used_bytes(tag);
        if total <= limit {
            return Ok(());
        }

        let entries: Vec<(String, CacheMeta)> = self
            .disk
            .scan()
            .into_iter()
            .filter(|e| e.meta.has_tag(tag))
            .map(|e| (e.name, e.meta))
            .collect();
        let order = self
            .eviction_policy
            .read()
            .files_to_evict(&entries, total, limit);

        for name in order {
            if total <= limit {
                break;
            }
            self.evict_one_locked(&name);
            total = self.disk.tag_used_bytes(tag);
        }

        if total > limit {
            return Err(Error::QuotaUnenforceable {
                scope: format!("tag:{}", tag),
                used: total,
                limit,
            });
        }
        Ok(())
    }

    fn evict_one_locked(&self, name: &str) {
        self.memory.remove(name);
        if let Err(e) = self.disk.remove_entry(name) {
            tracing::warn!("evicting {} failed, skipping: {}", name, e);
        }
        self.oplog.record("evict", name, None);
    }

    /// Post-write reconciliation: global ceiling plus every constrained
    /// tag the entry carries. Failures are logged, never propagated into
    /// the write path.
    pub(crate) fn enforce_after_write_locked(&self, tags: &[String]) {
        if let Err(e) = self.enforce_global_locked() {
            tracing::warn!("global quota reconciliation: {}", e);
        }
        for tag in tags {
            if let Err(e) = self.enforce_tag_locked(tag) {
                tracing::warn!("tag quota reconciliation: {}", e);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Hit/miss statistics
    // -------------------------------------------------------------------------

    /// Reads served from either tier
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Reads that found nothing (absent, expired, or unreadable)
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// hits / (hits + misses); 0 when no reads have happened
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hit_count() as f64;
        let total = hits + self.miss_count() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Zero both counters
    pub fn reset_hit_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    // -------------------------------------------------------------------------
    // Heat & preload
    // -------------------------------------------------------------------------

    /// Read attempts recorded for `name`
    pub fn access_count(&self, name: &str) -> u64 {
        self.heat.access_count(name)
    }

    /// Most recent read attempt for `name`
    pub fn last_access(&self, name: &str) -> Option<DateTime<Utc>> {
        self.heat.last_access(name)
    }

    /// Keys ranked by descending access count
    pub fn top_by_frequency(&self, limit: usize) -> Vec<String> {
        self.heat.top_by_frequency(limit)
    }

    /// Keys ranked by descending last-access instant
    pub fn top_by_recency(&self, limit: usize) -> Vec<String> {
        self.heat.top_by_recency(limit)
    }

    /// Clear heat statistics
    pub fn reset_heat_stats(&self) {
        self.heat.reset();
    }

    /// Warm the memory tier by reading each name once
    pub fn preload(&self, names: &[&str]) {
        for name in names {
            let _ = self.get(name);
        }
    }

    /// Warm the memory tier with the most frequently read keys
    pub fn preload_hottest_by_frequency(&self, limit: usize) {
        let names = self.heat.top_by_frequency(limit);
        for name in &names {
            let _ = self.get(name);
        }
    }

    /// Warm the memory tier with the most recently read keys
    pub fn preload_hottest_by_recency(&self, limit: usize) {
        let names = self.heat.top_by_recency(limit);
        for name in &names {
            let _ = self.get(name);
        }
    }

    // -------------------------------------------------------------------------
    // Notification, journal, diagnostics
    // -------------------------------------------------------------------------

    /// Register a change callback; events fire after the triggering
    /// mutation completes
    pub fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId {
        self.listeners.subscribe(handler)
    }

    /// Remove a change callback
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.unsubscribe(id);
    }

    /// The most recent `limit` journal records, oldest first
    pub fn recent_logs(&self, limit: usize) -> Vec<OpLogEntry> {
        self.oplog.recent(limit)
    }

    /// Drop all journal records
    pub fn clear_logs(&self) {
        self.oplog.clear();
    }

    /// Swallowed disk-I/O failures since the store opened
    pub fn io_error_count(&self) -> u64 {
        self.disk.io_error_count()
    }

    // -------------------------------------------------------------------------
    // Internal write/remove primitives (lane must be held for writing)
    // -------------------------------------------------------------------------

    /// Write blob + sidecar, then populate memory. All-or-nothing per
    /// entry: a sidecar failure rolls the blob back so no orphan pair is
    /// left behind.
    pub(crate) fn write_entry_locked(
        &self,
        name: &str,
        data: &[u8],
        compress: bool,
        meta: &CacheMeta,
    ) -> io::Result<()> {
        let stored = if compress {
            self.compression.compress_or_raw(data)
        } else {
            Bytes::copy_from_slice(data)
        };
        self.disk.write_blob(name, &stored)?;
        if let Err(e) = self.disk.put_meta(name, meta) {
            let _ = self.disk.remove_entry(name);
            return Err(e);
        }
        self.memory.insert(name, Bytes::copy_from_slice(data));
        Ok(())
    }

    /// Remove an entry from both tiers, best-effort
    pub(crate) fn remove_entry_locked(&self, name: &str) {
        self.memory.remove(name);
        if let Err(e) = self.disk.remove_entry(name) {
            tracing::warn!("removing {} failed: {}", name, e);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
