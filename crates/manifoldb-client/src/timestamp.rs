//! Per-collection write timestamps for session consistency.
//!
//! A [`TimestampRegistry`] remembers the timestamp of the last successful
//! write to each (database, collection). Reads at
//! [`ConsistencyLevel::Session`] send that timestamp as their guarantee
//! timestamp so a client always sees its own writes. Several clients may share
//! one registry through an `Arc`.
//!
//! Server timestamps are hybrid: the upper 46 bits hold wall-clock
//! milliseconds and the lower 18 bits a logical counter.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use manifoldb_wire::ConsistencyLevel;

/// Number of logical bits in a hybrid timestamp.
pub const LOGICAL_BITS: u32 = 18;

/// Guarantee timestamp asking for the newest data.
pub const GUARANTEE_STRONG_TS: u64 = 0;

/// Guarantee timestamp for eventual consistency and the session fallback.
pub const GUARANTEE_EVENTUALLY_TS: u64 = 1;

/// Guarantee timestamp letting the server pick a bounded staleness.
pub const GUARANTEE_BOUNDED_TS: u64 = 2;

/// Compose a hybrid timestamp.
#[must_use]
pub const fn compose_ts(physical_ms: u64, logical: u64) -> u64 {
    (physical_ms << LOGICAL_BITS) | logical
}

/// Split a hybrid timestamp into wall-clock milliseconds and logical counter.
#[must_use]
pub const fn split_ts(ts: u64) -> (u64, u64) {
    (ts >> LOGICAL_BITS, ts & ((1 << LOGICAL_BITS) - 1))
}

/// A hybrid timestamp for the current wall clock, for servers that report none.
#[must_use]
pub fn synthetic_session_ts() -> u64 {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX >> LOGICAL_BITS));
    compose_ts(ms, 0)
}

/// Last-write timestamps keyed by (database, collection).
#[derive(Debug, Default)]
pub struct TimestampRegistry {
    entries: Mutex<HashMap<(String, String), u64>>,
}

impl TimestampRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Entries are plain integers, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), u64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a write timestamp, keeping the larger of old and new.
    pub fn update(&self, db: &str, collection: &str, ts: u64) {
        let mut entries = self.lock();
        entries
            .entry((db.to_string(), collection.to_string()))
            .and_modify(|stored| *stored = (*stored).max(ts))
            .or_insert(ts);
    }

    /// The last write timestamp, if any.
    #[must_use]
    pub fn get(&self, db: &str, collection: &str) -> Option<u64> {
        self.lock().get(&(db.to_string(), collection.to_string())).copied()
    }

    /// Forget a collection.
    pub fn remove(&self, db: &str, collection: &str) {
        self.lock().remove(&(db.to_string(), collection.to_string()));
    }

    /// Forget every collection.
    pub fn clear_all(&self) {
        self.lock().clear();
    }

    /// Number of tracked collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no collection is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The guarantee timestamp for a read. Never fails.
    ///
    /// | Level | Timestamp |
    /// |-------|-----------|
    /// | `Strong` | 0 |
    /// | `Bounded` | 2 |
    /// | `Session`, `Default` | last write, or 1 |
    /// | `Eventually` | 1 |
    #[must_use]
    pub fn guarantee_timestamp(&self, level: ConsistencyLevel, db: &str, collection: &str) -> u64 {
        match level {
            ConsistencyLevel::Strong => GUARANTEE_STRONG_TS,
            ConsistencyLevel::Bounded => GUARANTEE_BOUNDED_TS,
            ConsistencyLevel::Session | ConsistencyLevel::Default => {
                self.get(db, collection).unwrap_or(GUARANTEE_EVENTUALLY_TS)
            }
            ConsistencyLevel::Eventually => GUARANTEE_EVENTUALLY_TS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_is_monotonic() {
        let registry = TimestampRegistry::new();
        registry.update("db", "c", 100);
        registry.update("db", "c", 50);
        assert_eq!(registry.get("db", "c"), Some(100));
        registry.update("db", "c", 150);
        assert_eq!(registry.get("db", "c"), Some(150));
    }

    #[test]
    fn test_keys_are_scoped_by_database() {
        let registry = TimestampRegistry::new();
        registry.update("a", "c", 10);
        assert_eq!(registry.get("b", "c"), None);
        assert_eq!(registry.len(), 1);
        registry.remove("a", "c");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_guarantee_timestamp() {
        let registry = TimestampRegistry::new();
        assert_eq!(registry.guarantee_timestamp(ConsistencyLevel::Session, "db", "c"), 1);
        registry.update("db", "c", 777);
        assert_eq!(registry.guarantee_timestamp(ConsistencyLevel::Strong, "db", "c"), 0);
        assert_eq!(registry.guarantee_timestamp(ConsistencyLevel::Bounded, "db", "c"), 2);
        assert_eq!(registry.guarantee_timestamp(ConsistencyLevel::Eventually, "db", "c"), 1);
        assert_eq!(registry.guarantee_timestamp(ConsistencyLevel::Session, "db", "c"), 777);
        assert_eq!(registry.guarantee_timestamp(ConsistencyLevel::Default, "db", "c"), 777);
        registry.clear_all();
        assert_eq!(registry.guarantee_timestamp(ConsistencyLevel::Session, "db", "c"), 1);
    }

    #[test]
    fn test_hybrid_timestamps() {
        let ts = compose_ts(1_700_000_000_000, 5);
        assert_eq!(split_ts(ts), (1_700_000_000_000, 5));
        let (physical, logical) = split_ts(synthetic_session_ts());
        assert_eq!(logical, 0);
        assert!(physical > 1_600_000_000_000);
    }
}
