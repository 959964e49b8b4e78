//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use chrono::Utc;

use crate::codec::{Encoding, Store};

// == Cache Entry ==
/// Represents a single cache entry with its encoded value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: String,
    /// Encoded value
    pub store: Store,
    /// Encoding that produced the payload; `None` for entries restored from persistence
    pub encoding: Option<Encoding>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
    /// Expiration timestamp (Unix milliseconds), 0 = never expires
    pub expires_at: i64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry written at `now`.
    pub fn new(
        key: String,
        store: Store,
        encoding: Option<Encoding>,
        now: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            key,
            store,
            encoding,
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    // == Restore ==
    /// Rebuilds an entry from a persisted Store.
    ///
    /// The expiry is recomputed from the header: `max_age` milliseconds after the
    /// last write (`updated_at`, or `created_at` if never updated).
    pub fn restore(key: String, store: Store) -> Self {
        let created_at = header_millis(store.created_at());
        let updated_at = match store.updated_at() {
            0 => created_at,
            ts => header_millis(ts),
        };
        let expires_at = match store.max_age() {
            0 => 0,
            max_age => updated_at.saturating_add(header_millis(max_age)),
        };

        Self {
            key,
            store,
            encoding: None,
            created_at,
            updated_at,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now >= expires_at`; `expires_at == 0` never expires.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at > 0 && now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired (TTL elapsed)
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self, now: i64) -> Option<u64> {
        (self.expires_at > 0).then(|| (self.expires_at - now).max(0) as u64)
    }

    /// Bytes this entry accounts for: key plus the full encoded Store.
    pub fn footprint(&self) -> u64 {
        self.key.len() as u64 + self.store.length(true)
    }
}

/// Header fields are unsigned; values past `i64::MAX` saturate.
fn header_millis(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(expires_at: i64) -> CacheEntry {
        let now = current_timestamp_ms();
        CacheEntry::new(
            "k".to_string(),
            Store::encode(b"v", None),
            Some(Encoding::Text),
            now,
            expires_at,
        )
    }

    #[test]
    fn test_entry_never_expires() {
        let entry = entry(0);
        assert!(!entry.is_expired());
        assert!(!entry.is_expired_at(i64::MAX));
        assert!(entry.ttl_remaining_ms(current_timestamp_ms()).is_none());
    }

    #[test]
    fn test_entry_with_ttl() {
        let now = current_timestamp_ms();
        let entry = entry(now + 10_000);

        assert!(!entry.is_expired_at(now));
        let remaining = entry.ttl_remaining_ms(now).unwrap();
        assert_eq!(remaining, 10_000);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = entry(1_000);

        assert!(!entry.is_expired_at(999));
        assert!(entry.is_expired_at(1_000), "Entry should be expired at boundary");
        assert_eq!(entry.ttl_remaining_ms(2_000), Some(0));
    }

    #[test]
    fn test_footprint() {
        let entry = entry(0);
        assert_eq!(entry.footprint(), 1 + 32 + 1);
    }

    #[test]
    fn test_restore_recomputes_expiry() {
        let mut store = Store::encode(b"v", Some(5_000));
        let created = store.created_at() as i64;

        let restored = CacheEntry::restore("k".to_string(), store.clone());
        assert_eq!(restored.expires_at, created + 5_000);
        assert!(restored.encoding.is_none());

        store.set_updated_at((created + 1_000) as u64);
        let restored = CacheEntry::restore("k".to_string(), store);
        assert_eq!(restored.updated_at, created + 1_000);
        assert_eq!(restored.expires_at, created + 6_000);
    }

    #[test]
    fn test_restore_saturates_huge_max_age() {
        let store = Store::encode_at(b"v", Some(u64::MAX), 1_000);
        let restored = CacheEntry::restore("k".to_string(), store);

        assert_eq!(restored.expires_at, i64::MAX);
        assert!(!restored.is_expired_at(2_000));
        assert!(restored.is_expired_at(i64::MAX));
    }

    #[test]
    fn test_restore_never_expires() {
        let restored = CacheEntry::restore("k".to_string(), Store::encode(b"v", None));
        assert_eq!(restored.expires_at, 0);
    }
}
