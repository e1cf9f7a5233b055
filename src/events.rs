//! Change Notification
//!
//! Per-key change events (`set` / `removed` / `expired`) delivered to
//! registered callbacks after the triggering mutation completes. Purely a
//! notification surface: handlers cannot veto or reorder mutations.

use dashmap::DashMap;
use uuid::Uuid;

/// What happened to a cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Entry written or replaced
    Set,
    /// Entry explicitly removed
    Removed,
    /// Entry removed because its expiry had passed
    Expired,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Set => write!(f, "set"),
            ChangeKind::Removed => write!(f, "removed"),
            ChangeKind::Expired => write!(f, "expired"),
        }
    }
}

/// Handle returned by [`ChangeListeners::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

/// Callback invoked with the key and the kind of change
pub type ChangeHandler = Box<dyn Fn(&str, ChangeKind) + Send + Sync>;

/// Registry of change subscribers
#[derive(Default)]
pub struct ChangeListeners {
    handlers: DashMap<Uuid, ChangeHandler>,
}

impl ChangeListeners {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; keep the returned id to unsubscribe
    pub fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.handlers.insert(id, handler);
        SubscriptionId(id)
    }

    /// Remove a previously registered callback
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.remove(&id.0);
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver an event to every subscriber
    pub fn notify(&self, name: &str, kind: ChangeKind) {
        for entry in self.handlers.iter() {
            (entry.value())(name, kind);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_subscribe_notify_unsubscribe() {
        let listeners = ChangeListeners::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_clone = Arc::clone(&seen);
        let id = listeners.subscribe(Box::new(move |name, kind| {
            assert_eq!(name, "k");
            assert_eq!(kind, ChangeKind::Set);
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.notify("k", ChangeKind::Set);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        listeners.unsubscribe(id);
        listeners.notify("k", ChangeKind::Set);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_multiple_subscribers_all_notified() {
        let listeners = ChangeListeners::new();
        let seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let seen = Arc::clone(&seen);
            listeners.subscribe(Box::new(move |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }

        listeners.notify("k", ChangeKind::Removed);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(listeners.len(), 3);
    }

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::Set.to_string(), "set");
        assert_eq!(ChangeKind::Removed.to_string(), "removed");
        assert_eq!(ChangeKind::Expired.to_string(), "expired");
    }
}
