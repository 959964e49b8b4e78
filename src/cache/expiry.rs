//! Expiry Index Module
//!
//! Secondary index from expiry timestamp to the keys sharing it, used by the
//! janitor to find due entries without scanning the whole table.

use std::collections::{BTreeMap, HashSet};

// == Expiry Index ==
/// Maps expiry timestamps (Unix milliseconds) to sets of keys.
///
/// Buckets may go stale when a key is removed or re-written with a new TTL.
/// Callers must re-check the live entry before acting on a drained key.
#[derive(Debug, Default)]
pub struct ExpiryIndex {
    buckets: BTreeMap<i64, HashSet<String>>,
}

impl ExpiryIndex {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }

    // == Insert ==
    /// Records `key` under `expires_at`. Never-expiring keys (0) are not indexed.
    pub fn insert(&mut self, expires_at: i64, key: &str) {
        if expires_at <= 0 {
            return;
        }
        self.buckets
            .entry(expires_at)
            .or_default()
            .insert(key.to_string());
    }

    // == Drain Due ==
    /// Removes and returns every bucket whose timestamp is `<= now`.
    pub fn drain_due(&mut self, now: i64) -> Vec<(i64, HashSet<String>)> {
        let later = match now.checked_add(1) {
            Some(bound) => self.buckets.split_off(&bound),
            None => BTreeMap::new(),
        };
        std::mem::replace(&mut self.buckets, later)
            .into_iter()
            .collect()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    // == Bucket Count ==
    /// Returns the number of distinct expiry timestamps tracked.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Checks if `key` is indexed under `expires_at`.
    pub fn contains(&self, expires_at: i64, key: &str) -> bool {
        self.buckets
            .get(&expires_at)
            .is_some_and(|keys| keys.contains(key))
    }
}
