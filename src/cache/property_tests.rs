//! Property-Based Tests for Cache Module
//!
//! Uses proptest against `CacheTable` with a synthetic clock, so expiry
//! properties are checked exactly without sleeping.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{CacheTable, Lookup};
use crate::codec::{Encode, Encoding};
use crate::error::CacheError;

// == Test Configuration ==
const T0: i64 = 1_700_000_000_000;

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}".prop_map(|s| s)
}

/// Cache operations without TTLs, checked against a HashMap model
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Put { key: String, value: String },
    Get { key: String },
    Remove { key: String },
    Clear,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        4 => (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        4 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        2 => key_strategy().prop_map(|key| CacheOp::Remove { key }),
        1 => Just(CacheOp::Clear),
    ]
}

fn set_text(table: &mut CacheTable, key: &str, value: &str, ttl: Duration, now: i64) -> Result<(), CacheError> {
    table
        .insert(key, value.as_bytes(), Encoding::Text, ttl, now)
        .map(|_| ())
}

fn put_text(table: &mut CacheTable, key: &str, value: &str, ttl: Option<Duration>, now: i64) {
    table.upsert(key, value.as_bytes(), Encoding::Text, ttl, now);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Any sequence of never-expiring operations behaves like a plain map,
    // and hit/miss counters match the reads performed.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let mut table = CacheTable::new();
        let mut model: HashMap<String, String> = HashMap::new();
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    let result = set_text(&mut table, &key, &value, Duration::ZERO, T0);
                    if model.contains_key(&key) {
                        prop_assert!(matches!(result, Err(CacheError::KeyExists(_))));
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(key, value);
                    }
                }
                CacheOp::Put { key, value } => {
                    put_text(&mut table, &key, &value, None, T0);
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    match (table.read::<String>(&key, T0), model.get(&key)) {
                        (Lookup::Hit(got), Some(want)) => {
                            prop_assert_eq!(&got, want);
                            expected_hits += 1;
                        }
                        (Lookup::Missing, None) => expected_misses += 1,
                        (got, want) => prop_assert!(false, "read {:?}, model {:?}", got, want),
                    }
                }
                CacheOp::Remove { key } => {
                    prop_assert_eq!(table.remove(&key), model.remove(&key).is_some());
                }
                CacheOp::Clear => {
                    table.clear();
                    model.clear();
                }
            }
        }

        let stats = table.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(table.len(), model.len());
    }

    // set(k, v1); set(k, v2) fails while v1 is live; put always wins.
    #[test]
    fn prop_set_put_asymmetry(
        key in key_strategy(),
        v1 in value_strategy(),
        v2 in value_strategy(),
        ttl_ms in 0u64..10_000
    ) {
        let ttl = Duration::from_millis(ttl_ms);
        let mut table = CacheTable::new();

        set_text(&mut table, &key, &v1, ttl, T0).unwrap();
        let second = set_text(&mut table, &key, &v2, ttl, T0);
        prop_assert!(matches!(second, Err(CacheError::KeyExists(_))));
        prop_assert_eq!(table.read::<String>(&key, T0), Lookup::Hit(v1.clone()));

        put_text(&mut table, &key, &v1, Some(ttl), T0);
        put_text(&mut table, &key, &v2, Some(ttl), T0);
        prop_assert_eq!(table.read::<String>(&key, T0), Lookup::Hit(v2));
    }

    // A key set with ttl > 0 is live before set-time + ttl and gone from that
    // instant, through reads and through the sweep alone.
    #[test]
    fn prop_expiry_correctness(key in key_strategy(), ttl_ms in 1u64..100_000) {
        let ttl = Duration::from_millis(ttl_ms);
        let deadline = T0 + ttl_ms as i64;
        let mut table = CacheTable::new();
        set_text(&mut table, &key, "v", ttl, T0).unwrap();

        prop_assert!(table.exists(&key, T0));
        prop_assert!(table.exists(&key, deadline - 1));
        prop_assert!(!table.exists(&key, deadline));

        prop_assert_eq!(table.sweep_expired(deadline - 1), 0);
        prop_assert_eq!(table.sweep_expired(deadline), 1);
        prop_assert_eq!(table.len(), 0);
    }

    // ttl == 0 never expires and is never swept.
    #[test]
    fn prop_never_expire_sentinel(key in key_strategy(), later in 0i64..(10 * 365 * 24 * 3_600_000)) {
        let mut table = CacheTable::new();
        set_text(&mut table, &key, "v", Duration::ZERO, T0).unwrap();

        prop_assert_eq!(table.sweep_expired(T0 + later), 0);
        prop_assert!(table.exists(&key, T0 + later));
    }

    // After any mix of TTL rewrites, a sweep removes exactly the entries that
    // are expired at sweep time, regardless of stale index buckets.
    #[test]
    fn prop_sweep_respects_live_expiry(
        writes in prop::collection::vec(
            (key_strategy(), prop::option::of(0u64..2_000), 0i64..1_000),
            1..60
        ),
        sweep_at in 0i64..3_000
    ) {
        let mut table = CacheTable::new();
        let mut clock = T0;
        for (key, ttl_ms, advance) in &writes {
            clock += advance;
            put_text(&mut table, key, "v", ttl_ms.map(Duration::from_millis), clock);
        }

        let now = clock + sweep_at;
        let keys: Vec<String> = writes.iter().map(|(k, _, _)| k.clone()).collect();
        let live_before: Vec<bool> = keys.iter().map(|k| table.exists(k, now)).collect();

        table.sweep_expired(now);

        let distinct_live: std::collections::HashSet<&String> = keys
            .iter()
            .zip(&live_before)
            .filter(|(_, live)| **live)
            .map(|(k, _)| k)
            .collect();
        prop_assert_eq!(table.len(), distinct_live.len());

        for (key, was_live) in keys.iter().zip(live_before) {
            prop_assert_eq!(table.exists(key, now), was_live, "key {} liveness changed", key);
            if !was_live {
                prop_assert_eq!(table.read::<String>(key, now), Lookup::Missing);
            }
        }
    }

    // Integers are never readable as text, whatever their width.
    #[test]
    fn prop_integer_never_reads_as_text(key in key_strategy(), n in any::<i64>()) {
        let mut table = CacheTable::new();
        table.insert(&key, &n.encode().unwrap(), Encoding::Integer, Duration::ZERO, T0).unwrap();

        prop_assert_eq!(table.read::<String>(&key, T0), Lookup::Mismatch);
        prop_assert_eq!(table.read::<i64>(&key, T0), Lookup::Hit(n));
        prop_assert_eq!(table.read::<i16>(&key, T0), Lookup::Hit(n as i16));
    }
}

// == Additional Unit Tests for Edge Cases ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_set_put_get() {
        let mut table = CacheTable::new();
        table.insert("k", &123i64.encode().unwrap(), Encoding::Integer, Duration::ZERO, T0).unwrap();

        let again = table.insert("k", &456i64.encode().unwrap(), Encoding::Integer, Duration::ZERO, T0);
        assert!(matches!(again, Err(CacheError::KeyExists(_))));

        table.upsert("k", &456i64.encode().unwrap(), Encoding::Integer, Some(Duration::ZERO), T0);
        assert_eq!(table.read::<i32>("k", T0), Lookup::Hit(456));
    }
}
