//! Memory Tier
//!
//! Byte-capacity-bounded cache of decompressed payloads in front of the
//! disk tier. Strictly a derived cache: entries may be dropped at any time
//! under capacity pressure and absence never implies the key does not
//! exist. Least-recently-used entries are evicted first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

/// Default memory-tier capacity (64MB)
pub const DEFAULT_MEMORY_CAPACITY: u64 = 64 * 1024 * 1024;

/// Memory tier configuration
#[derive(Debug, Clone)]
pub struct MemoryTierConfig {
    /// Maximum resident bytes (decompressed)
    pub capacity: u64,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

struct MemEntry {
    data: Bytes,
    /// Monotonic use tick; lowest value = least recently used
    last_used: AtomicU64,
}

/// Bounded in-memory payload cache
pub struct MemoryTier {
    entries: RwLock<HashMap<String, MemEntry>>,
    config: MemoryTierConfig,
    current_size: AtomicU64,
    tick: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryTier {
    /// Create a memory tier with default configuration
    pub fn new() -> Self {
        Self::with_config(MemoryTierConfig::default())
    }

    /// Create a memory tier with custom configuration
    pub fn with_config(config: MemoryTierConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            current_size: AtomicU64::new(0),
            tick: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get a payload, refreshing its recency
    pub fn get(&self, name: &str) -> Option<Bytes> {
        let entries = self.entries.read();
        let entry = entries.get(name)?;
        entry.last_used.store(self.next_tick(), Ordering::Relaxed);
        Some(entry.data.clone())
    }

    /// Insert a payload, evicting least-recently-used entries while over
    /// capacity. Payloads larger than the whole tier are not admitted.
    pub fn insert(&self, name: &str, data: Bytes) {
        let size = data.len() as u64;
        if size > self.config.capacity {
            return;
        }

        let mut entries = self.entries.write();
        let entry = MemEntry {
            data,
            last_used: AtomicU64::new(self.next_tick()),
        };

        if let Some(old) = entries.insert(name.to_string(), entry) {
            self.current_size
                .fetch_sub(old.data.len() as u64, Ordering::Relaxed);
        }
        self.current_size.fetch_add(size, Ordering::Relaxed);

        while self.current_size.load(Ordering::Relaxed) > self.config.capacity {
            let coldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            match coldest {
                Some(key) => {
                    if let Some(evicted) = entries.remove(&key) {
                        self.current_size
                            .fetch_sub(evicted.data.len() as u64, Ordering::Relaxed);
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => break,
            }
        }
    }

    /// Remove a payload if present
    pub fn remove(&self, name: &str) {
        let mut entries = self.entries.write();
        if let Some(old) = entries.remove(name) {
            self.current_size
                .fetch_sub(old.data.len() as u64, Ordering::Relaxed);
        }
    }

    /// Check if a payload is resident
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Resident bytes
    pub fn size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Resident entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the tier is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Drop all resident payloads
    pub fn clear(&self) {
        self.entries.write().clear();
        self.current_size.store(0, Ordering::Relaxed);
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
