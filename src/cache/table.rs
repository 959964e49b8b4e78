//! Cache Table Module
//!
//! Entry map plus expiry index. Not synchronized on its own; the engine wraps it
//! in a lock. Every method takes `now` so expiry decisions are made against one
//! clock reading per operation.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheCounters, CacheEntry, CacheStats, ExpiryIndex};
use crate::codec::{Decode, Encoding, Store};
use crate::error::{CacheError, Result};

// == Lookup ==
/// Outcome of a typed read.
#[derive(Debug, PartialEq)]
pub enum Lookup<T> {
    Hit(T),
    Missing,
    /// Present but expired; the caller should evict
    Expired,
    /// Present but not decodable as the requested type
    Mismatch,
}

/// Converts a TTL into an absolute expiry; zero means never.
pub fn expiry_from_ttl(now: i64, ttl: Duration) -> i64 {
    if ttl.is_zero() {
        return 0;
    }
    let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1);
    now.saturating_add(millis)
}

// == Cache Table ==
/// Key → entry map with a secondary expiry index.
#[derive(Debug, Default)]
pub struct CacheTable {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Expiry timestamp → keys
    index: ExpiryIndex,
    /// Activity counters
    counters: CacheCounters,
}

impl CacheTable {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Inserts a new entry unless a live one already exists under `key`.
    ///
    /// An expired entry is replaced as if absent. Returns the stored Store so the
    /// caller can write it through.
    pub fn insert(
        &mut self,
        key: &str,
        payload: &[u8],
        encoding: Encoding,
        ttl: Duration,
        now: i64,
    ) -> Result<Store> {
        if self
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
        {
            return Err(CacheError::KeyExists(key.to_string()));
        }

        let expires_at = expiry_from_ttl(now, ttl);
        let store = Store::encode_at(payload, Some(max_age(expires_at, now)), stamp(now));
        let entry = CacheEntry::new(key.to_string(), store.clone(), Some(encoding), now, expires_at);
        self.entries.insert(key.to_string(), entry);
        self.index.insert(expires_at, key);
        Ok(store)
    }

    // == Upsert ==
    /// Creates or replaces the entry under `key`.
    ///
    /// With `ttl == None` a live prior entry's expiry is carried forward, and
    /// without one the entry never expires. A replaced entry keeps its `created_at` and gets
    /// `updated_at = now`, mirrored into the Store header. The old index bucket is
    /// left in place for the janitor to discard.
    pub fn upsert(
        &mut self,
        key: &str,
        payload: &[u8],
        encoding: Encoding,
        ttl: Option<Duration>,
        now: i64,
    ) -> Store {
        let prior = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now));

        let expires_at = match (ttl, prior) {
            (Some(ttl), _) => expiry_from_ttl(now, ttl),
            (None, Some(prior)) => prior.expires_at,
            (None, None) => 0,
        };

        let created_at = prior.map_or(now, |prior| prior.created_at);
        let mut store = Store::encode_at(payload, Some(max_age(expires_at, now)), stamp(created_at));
        if prior.is_some() {
            store.set_updated_at(stamp(now));
        }
        let mut entry = CacheEntry::new(key.to_string(), store.clone(), Some(encoding), now, expires_at);
        entry.created_at = created_at;

        self.entries.insert(key.to_string(), entry);
        self.index.insert(expires_at, key);
        store
    }

    // == Restore ==
    /// Loads a persisted entry without the existence check.
    ///
    /// Returns false (and stores nothing) if the entry is already expired.
    pub fn restore(&mut self, key: String, store: Store, now: i64) -> bool {
        let entry = CacheEntry::restore(key, store);
        if entry.is_expired_at(now) {
            debug!(key = %entry.key, "Skipping expired persisted entry");
            return false;
        }
        self.index.insert(entry.expires_at, &entry.key);
        self.entries.insert(entry.key.clone(), entry);
        true
    }

    // == Read ==
    /// Decodes the live entry under `key` as `T`.
    ///
    /// Does not mutate the table; expired entries are reported, not removed.
    pub fn read<T: Decode>(&self, key: &str, now: i64) -> Lookup<T> {
        let Some(entry) = self.entries.get(key) else {
            self.counters.record_miss();
            return Lookup::Missing;
        };
        if entry.is_expired_at(now) {
            self.counters.record_miss();
            return Lookup::Expired;
        }
        if entry.encoding.is_some_and(|encoding| encoding != T::ENCODING) {
            debug!(key, stored = ?entry.encoding, requested = ?T::ENCODING, "Encoding mismatch on read");
            self.counters.record_miss();
            return Lookup::Mismatch;
        }
        match T::decode(&entry.store) {
            Ok(value) => {
                self.counters.record_hit();
                Lookup::Hit(value)
            }
            Err(e) => {
                debug!(key, error = %e, "Failed to decode cached value");
                self.counters.record_miss();
                Lookup::Mismatch
            }
        }
    }

    /// Returns the Store of the live entry under `key`.
    pub fn store(&self, key: &str, now: i64) -> Option<&Store> {
        self.live(key, now).map(|entry| &entry.store)
    }

    // == Exists ==
    pub fn exists(&self, key: &str, now: i64) -> bool {
        self.live(key, now).is_some()
    }

    /// Remaining TTL of the live entry under `key`, if it expires at all.
    pub fn time_left(&self, key: &str, now: i64) -> Option<Duration> {
        self.live(key, now)
            .and_then(|entry| entry.ttl_remaining_ms(now))
            .map(Duration::from_millis)
    }

    // == Evict If Expired ==
    /// Removes `key` only if it is still expired at `now`.
    ///
    /// Re-checks because another writer may have replaced the entry between the
    /// caller's read and its write lock.
    pub fn evict_if_expired(&mut self, key: &str, now: i64) -> bool {
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now))
        {
            self.entries.remove(key);
            self.counters.record_expired_on_read();
            debug!(key, "Lazily evicted expired entry");
            return true;
        }
        false
    }

    // == Remove ==
    /// Removes an entry by key, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    // == Sweep Expired ==
    /// Removes every indexed entry whose expiry has passed.
    ///
    /// Drained keys are checked against the live entry, so stale buckets left by
    /// `upsert` or `remove` never delete a re-written key. Returns the number of
    /// entries removed.
    pub fn sweep_expired(&mut self, now: i64) -> usize {
        let mut removed = 0;
        for (_, keys) in self.index.drain_due(now) {
            for key in keys {
                if self
                    .entries
                    .get(&key)
                    .is_some_and(|entry| entry.is_expired_at(now))
                {
                    self.entries.remove(&key);
                    removed += 1;
                }
            }
        }
        self.counters.record_swept(removed);
        removed
    }

    // == Size ==
    /// Sum of key length and full Store length over live entries.
    pub fn size(&self, now: i64) -> u64 {
        self.entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .map(CacheEntry::footprint)
            .sum()
    }

    // == Length ==
    /// Returns the number of entries held, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }

    #[cfg(test)]
    pub(crate) fn index(&self) -> &ExpiryIndex {
        &self.index
    }

    fn live(&self, key: &str, now: i64) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
    }
}

/// Header timestamp for `ts`; pre-epoch clocks clamp to 0.
fn stamp(ts: i64) -> u64 {
    ts.max(0) as u64
}

/// Max-age header value: remaining milliseconds until `expires_at`, 0 for never.
fn max_age(expires_at: i64, now: i64) -> u64 {
    if expires_at == 0 {
        0
    } else {
        (expires_at - now).max(1) as u64
    }
}
