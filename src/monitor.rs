//! Monitoring
//!
//! Point-in-time usage snapshots serializable to JSON, plus a simple
//! usage-alert hook that fires when disk usage crosses a configurable
//! fraction of the global ceiling. Read-only over engine state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::store::LocalStore;

/// Callback invoked with `(used_bytes, max_bytes)` when usage crosses the
/// alert threshold
pub type UsageAlertHandler = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Point-in-time view of the store's usage and activity
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    /// Bytes on disk across live entries
    pub total_bytes: u64,
    /// Global byte ceiling
    pub max_bytes: u64,
    /// Reads served from either tier
    pub hit_count: u64,
    /// Reads that found nothing
    pub miss_count: u64,
    /// hits / (hits + misses), 0 with no reads
    pub hit_rate: f64,
    /// On-disk bytes per quota-constrained tag
    pub tag_usage: BTreeMap<String, u64>,
    /// Hottest keys by access count, descending
    pub top_by_frequency: Vec<String>,
    /// Hottest keys by last access, descending
    pub top_by_recency: Vec<String>,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl LocalStore {
    /// Capture a usage snapshot with the top `top_n` keys per heat ranking
    pub fn snapshot(&self, top_n: usize) -> StoreSnapshot {
        let _lane = self.lane.read();

        let mut tag_usage = BTreeMap::new();
        for tag in self.limited_tags() {
            tag_usage.insert(tag.clone(), self.disk.tag_used_bytes(&tag));
        }

        StoreSnapshot {
            total_bytes: self.disk.used_bytes(),
            max_bytes: self.global_limit(),
            hit_count: self.hit_count(),
            miss_count: self.miss_count(),
            hit_rate: self.hit_rate(),
            tag_usage,
            top_by_frequency: self.heat.top_by_frequency(top_n),
            top_by_recency: self.heat.top_by_recency(top_n),
            taken_at: Utc::now(),
        }
    }

    /// Capture a snapshot and render it as pretty-printed JSON
    pub fn export_snapshot_json(&self, top_n: usize) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot(top_n))?)
    }

    /// Current alert threshold as a fraction of the global ceiling
    pub fn alert_threshold(&self) -> f64 {
        *self.alert_threshold.lock()
    }

    /// Set the alert threshold (e.g. 0.8 fires at 80% usage)
    pub fn set_alert_threshold(&self, ratio: f64) {
        *self.alert_threshold.lock() = ratio;
    }

    /// Install the usage-alert callback, replacing any previous one
    pub fn set_alert_handler(&self, handler: UsageAlertHandler) {
        *self.alert_handler.lock() = Some(handler);
    }

    /// Remove the usage-alert callback
    pub fn clear_alert_handler(&self) {
        *self.alert_handler.lock() = None;
    }

    /// Check usage against the threshold, invoking the alert callback
    /// when crossed. Returns whether the alert fired.
    pub fn check_usage_alert(&self) -> bool {
        let (used, max) = {
            let _lane = self.lane.read();
            (self.disk.used_bytes(), self.global_limit())
        };
        if max == 0 || (used as f64) / (max as f64) < self.alert_threshold() {
            return false;
        }
        if let Some(handler) = self.alert_handler.lock().as_ref() {
            handler(used, max);
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CacheOptions;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open_at(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let (_dir, store) = store();
        store.set_tag_limit("media", 1024 * 1024);
        store.cache(
            "clip",
            &[1u8; 256],
            CacheOptions::new().tags(vec!["media".into()]).compress(false),
        );
        store.get("clip");
        store.get("missing");

        let snap = store.snapshot(5);
        assert_eq!(snap.total_bytes, 256);
        assert_eq!(snap.hit_count, 1);
        assert_eq!(snap.miss_count, 1);
        assert_eq!(snap.hit_rate, 0.5);
        assert_eq!(snap.tag_usage.get("media"), Some(&256));
        assert!(snap.top_by_frequency.contains(&"clip".to_string()));
        assert!(snap.top_by_recency.contains(&"missing".to_string()));
    }

    #[test]
    fn test_snapshot_json_export() {
        let (_dir, store) = store();
        store.cache("k", b"v", CacheOptions::default());
        store.get("k");

        let json = store.export_snapshot_json(3).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(parsed["total_bytes"].is_u64());
        assert_eq!(parsed["hit_count"], 1);
        assert!(parsed["taken_at"].is_string());
        assert!(parsed["top_by_frequency"].is_array());
    }

    #[test]
    fn test_usage_alert_fires_over_threshold() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let (_dir, store) = store();
        store.set_global_limit(1000);
        store.set_alert_threshold(0.5);

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        store.set_alert_handler(Box::new(move |used, max| {
            assert!(used >= 500);
            assert_eq!(max, 1000);
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));

        // Under threshold: no alert
        store.cache("small", &[0u8; 100], CacheOptions::new().compress(false));
        assert!(!store.check_usage_alert());

        // Over threshold: alert fires
        store.cache("large", &[0u8; 500], CacheOptions::new().compress(false));
        assert!(store.check_usage_alert());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        store.clear_alert_handler();
        assert!(store.check_usage_alert());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
