//! Cache Statistics Module
//!
//! Tracks cache activity: hits, misses, and entries reclaimed by expiry.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful typed retrievals
    pub hits: u64,
    /// Number of failed retrievals (missing, expired, or type mismatch)
    pub misses: u64,
    /// Entries removed because a read found them expired
    pub expired_on_read: u64,
    /// Entries removed by the janitor sweep
    pub swept: u64,
    /// Entries currently held in the table, including unreclaimed expired ones
    pub entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Counters ==
/// Counters updated from behind a shared table lock.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired_on_read: AtomicU64,
    swept: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired_on_read(&self) {
        self.expired_on_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_swept(&self, count: usize) {
        self.swept.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Builds a snapshot with the given entry count.
    pub fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_on_read: self.expired_on_read.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
            entries,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_new() {
        let stats = CacheCounters::new().snapshot(0);
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let counters = CacheCounters::new();
        counters.record_hit();
        counters.record_miss();
        assert_eq!(counters.snapshot(1).hit_rate(), 0.5);
    }

    #[test]
    fn test_record_expirations() {
        let counters = CacheCounters::new();
        counters.record_expired_on_read();
        counters.record_swept(3);

        let stats = counters.snapshot(7);
        assert_eq!(stats.expired_on_read, 1);
        assert_eq!(stats.swept, 3);
        assert_eq!(stats.entries, 7);
    }

    #[test]
    fn test_stats_serialize() {
        let json = serde_json::to_value(CacheCounters::new().snapshot(2)).unwrap();
        assert_eq!(json["entries"], 2);
        assert_eq!(json["hits"], 0);
    }
}
