//! Access Heat Tracking
//!
//! Per-key access counts and last-access instants, recorded on every read
//! attempt (hit, miss, or expiry discovery). Purely observational: the
//! rankings feed preloading and monitoring, never the eviction order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

#[derive(Default)]
struct HeatMaps {
    counts: HashMap<String, u64>,
    stamps: HashMap<String, DateTime<Utc>>,
}

/// Tracks access frequency and recency per cache key.
///
/// Both maps live behind one lock so `reset` is atomic with respect to
/// concurrent readers.
#[derive(Default)]
pub struct HeatTracker {
    maps: RwLock<HeatMaps>,
}

impl HeatTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read attempt for `name`
    pub fn record_access(&self, name: &str) {
        let mut maps = self.maps.write();
        *maps.counts.entry(name.to_string()).or_insert(0) += 1;
        maps.stamps.insert(name.to_string(), Utc::now());
    }

    /// Total read attempts recorded for `name`
    pub fn access_count(&self, name: &str) -> u64 {
        self.maps.read().counts.get(name).copied().unwrap_or(0)
    }

    /// Instant of the most recent read attempt for `name`
    pub fn last_access(&self, name: &str) -> Option<DateTime<Utc>> {
        self.maps.read().stamps.get(name).copied()
    }

    /// Keys ranked by descending access count; ties in arbitrary order
    pub fn top_by_frequency(&self, limit: usize) -> Vec<String> {
        let maps = self.maps.read();
        let mut ranked: Vec<(&String, &u64)> = maps.counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1));
        ranked.into_iter().take(limit).map(|(k, _)| k.clone()).collect()
    }

    /// Keys ranked by descending last-access instant; ties in arbitrary order
    pub fn top_by_recency(&self, limit: usize) -> Vec<String> {
        let maps = self.maps.read();
        let mut ranked: Vec<(&String, &DateTime<Utc>)> = maps.stamps.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1));
        ranked.into_iter().take(limit).map(|(k, _)| k.clone()).collect()
    }

    /// Clear both maps atomically with respect to concurrent readers
    pub fn reset(&self) {
        let mut maps = self.maps.write();
        maps.counts.clear();
        maps.stamps.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
