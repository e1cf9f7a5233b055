//! Operation Journal
//!
//! Bounded in-memory record of recent engine operations, for diagnostics
//! and debugging. Not a write-ahead log: nothing here survives the
//! process or participates in recovery.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Default journal capacity
const DEFAULT_CAPACITY: usize = 1024;

/// One recorded operation
#[derive(Debug, Clone)]
pub struct OpLogEntry {
    /// When the operation completed
    pub at: DateTime<Utc>,
    /// Operation kind, e.g. "cache", "remove", "merge"
    pub action: &'static str,
    /// Cache key the operation touched
    pub name: String,
    /// Optional free-form context
    pub detail: Option<String>,
}

/// Bounded ring of recent operations
pub struct OpLog {
    entries: Mutex<VecDeque<OpLogEntry>>,
    capacity: usize,
}

impl OpLog {
    /// Create a journal with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a journal holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    /// Append a record, dropping the oldest when full
    pub fn record(&self, action: &'static str, name: &str, detail: Option<String>) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(OpLogEntry {
            at: Utc::now(),
            action,
            name: name.to_string(),
            detail,
        });
    }

    /// The most recent `limit` records, oldest first
    pub fn recent(&self, limit: usize) -> Vec<OpLogEntry> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the journal is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop all records
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for OpLog {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_recent() {
        let log = OpLog::new();
        log.record("cache", "a", None);
        log.record("remove", "a", Some("explicit".into()));

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "cache");
        assert_eq!(recent[1].action, "remove");
        assert_eq!(recent[1].detail.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_recent_limit_returns_newest() {
        let log = OpLog::new();
        for i in 0..5 {
            log.record("cache", &format!("k{}", i), None);
        }

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].name, "k3");
        assert_eq!(recent[1].name, "k4");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let log = OpLog::with_capacity(3);
        for i in 0..5 {
            log.record("cache", &format!("k{}", i), None);
        }

        assert_eq!(log.len(), 3);
        let recent = log.recent(10);
        assert_eq!(recent[0].name, "k2");
        assert_eq!(recent[2].name, "k4");
    }

    #[test]
    fn test_clear() {
        let log = OpLog::new();
        log.record("cache", "a", None);
        log.clear();
        assert!(log.is_empty());
    }
}
