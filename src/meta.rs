//! Cache Entry Metadata
//!
//! Per-entry durable metadata: expiry instant, eviction priority, and tag
//! labels. Persisted as a JSON sidecar next to each payload blob so that
//! eviction and quota scans can read it without touching payloads.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Eviction priority for a cache entry. Higher ordinal = more
/// eviction-resistant.
///
/// Serialized as its raw ordinal so sidecars written with custom ordinals
/// stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum CachePriority {
    /// Evicted first (default)
    #[default]
    Low,
    /// Evicted after Low
    Medium,
    /// Evicted after Medium
    High,
    /// Application-reserved tier above High
    Custom,
}

impl CachePriority {
    /// Raw ordinal used in sidecar JSON and for eviction ordering
    pub fn ordinal(&self) -> i64 {
        match self {
            CachePriority::Low => 0,
            CachePriority::Medium => 1,
            CachePriority::High => 2,
            CachePriority::Custom => 99,
        }
    }
}

impl From<CachePriority> for i64 {
    fn from(p: CachePriority) -> i64 {
        p.ordinal()
    }
}

impl From<i64> for CachePriority {
    fn from(raw: i64) -> Self {
        match raw {
            0 => CachePriority::Low,
            1 => CachePriority::Medium,
            2 => CachePriority::High,
            _ => CachePriority::Custom,
        }
    }
}

/// Durable per-entry metadata record.
///
/// Size is deliberately absent: the quota-relevant size of an entry is
/// always the blob's current on-disk length, read from the directory
/// listing, never a stored figure that could drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// Absolute expiry instant; `None` means no built-in expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
    /// Eviction priority, `Low` when absent in the sidecar
    #[serde(default)]
    pub priority: CachePriority,
    /// Tag labels for quota scoping and bulk removal; order irrelevant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl CacheMeta {
    /// Metadata with no expiry, `Low` priority, and no tags
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an expiry `duration` from now
    pub fn expire_in(mut self, duration: Duration) -> Self {
        self.expire_at = Some(Utc::now() + duration);
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

    /// Whether the tag set contains `tag`
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

// =============================================================================
// Tests
// =============================================================================
