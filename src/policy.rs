//! Eviction and Expiry Policies
//!
//! Pluggable strategies for ranking entries under quota pressure and for
//! computing an entry's effective expiry instant. The engine holds one of
//! each behind a trait object; both are swappable at runtime.

use chrono::{DateTime, Utc};

use crate::meta::CacheMeta;

/// Produces an eviction order for a scope of entries under quota pressure.
///
/// Receives metadata only, never payloads, for either the global entry set
/// or a single tag's entries. The engine removes keys from the head of the
/// returned order, recomputing actual usage after each removal, until the
/// scope fits its limit or the order is exhausted.
pub trait EvictionPolicy: Send + Sync {
    /// Rank `entries` in removal order, most-evictable first
    fn files_to_evict(
        &self,
        entries: &[(String, CacheMeta)],
        total_size: u64,
        max_size: u64,
    ) -> Vec<String>;
}

/// Default ranking: ascending priority, tie-broken by ascending expiry
/// with an absent expiry sorting as the earliest possible instant.
///
/// The tie-break means that, among entries of equal priority, one with no
/// expiry is evicted before one with a far-future expiry. Kept verbatim
/// from the reference behavior; overriding it is a product decision.
pub struct DefaultEvictionPolicy;

impl EvictionPolicy for DefaultEvictionPolicy {
    fn files_to_evict(
        &self,
        entries: &[(String, CacheMeta)],
        _total_size: u64,
        _max_size: u64,
    ) -> Vec<String> {
        let mut ranked: Vec<&(String, CacheMeta)> = entries.iter().collect();
        ranked.sort_by(|a, b| {
            let pa = a.1.priority.ordinal();
            let pb = b.1.priority.ordinal();
            if pa != pb {
                return pa.cmp(&pb);
            }
            let ta = a.1.expire_at.unwrap_or(DateTime::<Utc>::MIN_UTC);
            let tb = b.1.expire_at.unwrap_or(DateTime::<Utc>::MIN_UTC);
            ta.cmp(&tb)
        });
        ranked.into_iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Computes an entry's effective expiry instant.
pub trait ExpirePolicy: Send + Sync {
    /// Effective expiry for `name`; `None` means never expires
    fn expire_at(&self, name: &str, meta: &CacheMeta) -> Option<DateTime<Utc>>;
}

/// Default expiry: the instant recorded in the entry's own metadata.
pub struct DefaultExpirePolicy;

impl ExpirePolicy for DefaultExpirePolicy {
    fn expire_at(&self, _name: &str, meta: &CacheMeta) -> Option<DateTime<Utc>> {
        meta.expire_at
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::CachePriority;
    use chrono::Duration;

    fn entry(name: &str, priority: CachePriority, expire_at: Option<DateTime<Utc>>) -> (String, CacheMeta) {
        (
            name.to_string(),
            CacheMeta {
                expire_at,
                priority,
                tags: Vec::new(),
            },
        )
    }

    #[test]
    fn test_default_eviction_low_priority_first() {
        let entries = vec![
            entry("keep", CachePriority::High, None),
            entry("drop", CachePriority::Low, None),
            entry("mid", CachePriority::Medium, None),
        ];

        let order = DefaultEvictionPolicy.files_to_evict(&entries, 300, 100);
        assert_eq!(order, vec!["drop", "mid", "keep"]);
    }

    #[test]
    fn test_default_eviction_earlier_expiry_first_on_tie() {
        let soon = Some(Utc::now() + Duration::minutes(5));
        let later = Some(Utc::now() + Duration::hours(5));
        let entries = vec![
            entry("later", CachePriority::Low, later),
            entry("soon", CachePriority::Low, soon),
        ];

        let order = DefaultEvictionPolicy.files_to_evict(&entries, 200, 100);
        assert_eq!(order, vec!["soon", "later"]);
    }

    #[test]
    fn test_default_eviction_no_expiry_sorts_oldest() {
        // Among equal priorities, an entry without expiry ranks ahead of
        // one with a far-future expiry in the eviction order.
        let entries = vec![
            entry("expiring", CachePriority::Low, Some(Utc::now() + Duration::days(365))),
            entry("permanent", CachePriority::Low, None),
        ];

        let order = DefaultEvictionPolicy.files_to_evict(&entries, 200, 100);
        assert_eq!(order, vec!["permanent", "expiring"]);
    }

    #[test]
    fn test_custom_priority_most_resistant() {
        let entries = vec![
            entry("custom", CachePriority::Custom, None),
            entry("high", CachePriority::High, None),
        ];

        let order = DefaultEvictionPolicy.files_to_evict(&entries, 200, 100);
        assert_eq!(order, vec!["high", "custom"]);
    }

    #[test]
    fn test_default_expire_policy_reads_meta() {
        let at = Some(Utc::now() + Duration::minutes(1));
        let meta = CacheMeta {
            expire_at: at,
            ..CacheMeta::new()
        };
        assert_eq!(DefaultExpirePolicy.expire_at("x", &meta), at);
        assert_eq!(DefaultExpirePolicy.expire_at("y", &CacheMeta::new()), None);
    }
}
