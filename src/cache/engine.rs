//! Cache Engine Module
//!
//! The `Cache` handle: lifecycle (init/close), typed operations, lazy eviction,
//! and write-through to an optional persistence adapter.
//!
//! Table operations run synchronously on the caller's thread. Write-through calls
//! are made after the table lock is released, so a slow backend never stalls
//! readers. Each mutation reserves a write-through ticket before releasing the
//! lock, so the backend sees mutations in table order and ends in the same state
//! as memory. A failed write-through is returned to the caller while the
//! in-memory change stays applied.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{current_timestamp_ms, CacheStats, CacheTable, Lookup};
use crate::codec::{Decode, Encode, Store};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::persistence::{PendingWrite, PersistedRow, Persistence, SqlitePersistence, WriteThrough};
use crate::tasks::{spawn_janitor, Janitor};

// == Live State ==
/// State that only exists between `init` and `close`.
pub struct Live {
    pub(crate) table: CacheTable,
    pub(crate) persistence: Option<Arc<WriteThrough>>,
}

impl Live {
    pub fn new(table: CacheTable, persistence: Option<Arc<dyn Persistence>>) -> Self {
        Self {
            table,
            persistence: persistence.map(|adapter| Arc::new(WriteThrough::new(adapter))),
        }
    }

    /// Reserves the next write-through slot. Call under the table write lock.
    fn reserve_write(&self) -> Option<PendingWrite> {
        self.persistence.as_ref().map(WriteThrough::reserve)
    }
}

/// Table state shared between the handle and the janitor; `None` when torn down.
pub type SharedState = Arc<RwLock<Option<Live>>>;

/// Adapter plus the rows read from it at startup.
type Loaded = Option<(Arc<dyn Persistence>, Vec<PersistedRow>)>;

struct Inner {
    config: Config,
    /// Adapter injected by the caller; takes precedence over `persistence_path`
    adapter: Option<Arc<dyn Persistence>>,
    state: SharedState,
    /// Running janitor; also serializes `init` and `close`
    janitor: tokio::sync::Mutex<Option<Janitor>>,
}

// == Cache ==
/// Thread-safe key/value cache with per-entry TTL.
///
/// Cloning is cheap and every clone refers to the same cache. A handle starts
/// uninitialized; calling any operation before [`Cache::init`] or after
/// [`Cache::close`] panics.
///
/// ```ignore
/// let cache = Cache::new(Config::default());
/// cache.init().await?;
/// cache.set("greeting", "hello", Duration::from_secs(30))?;
/// assert_eq!(cache.get::<String>("greeting").as_deref(), Some("hello"));
/// cache.close().await?;
/// ```
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

impl Cache {
    // == Constructors ==
    /// Creates an uninitialized cache. Persistence is enabled when
    /// `config.persistence_path` is set.
    pub fn new(config: Config) -> Self {
        Self::build(config, None)
    }

    /// Creates an uninitialized cache that writes through to `adapter`.
    pub fn with_persistence(config: Config, adapter: Arc<dyn Persistence>) -> Self {
        Self::build(config, Some(adapter))
    }

    fn build(config: Config, adapter: Option<Arc<dyn Persistence>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                adapter,
                state: Arc::new(RwLock::new(None)),
                janitor: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // == Init ==
    /// Hydrates from persistence (if configured) and starts the janitor.
    ///
    /// Idempotent: calling it on an initialized cache does nothing. Must be called
    /// from within a tokio runtime.
    pub async fn init(&self) -> Result<()> {
        let mut janitor = self.inner.janitor.lock().await;
        if janitor.is_some() {
            debug!("Cache already initialized");
            return Ok(());
        }

        let config = &self.inner.config;
        if config.has_unenforced_limits() {
            warn!(
                max_memory = config.max_memory,
                min_allocation = config.min_allocation,
                evict_oldest = config.evict_oldest,
                "Memory limits are accepted but not enforced"
            );
        }

        let (persistence, rows) = match self.load_persistence().await? {
            Some((adapter, rows)) => (Some(adapter), rows),
            None => (None, Vec::new()),
        };

        let mut table = CacheTable::new();
        let now = current_timestamp_ms();
        let total = rows.len();
        let mut restored = 0;
        let mut stale = Vec::new();
        for (key, blob) in rows {
            match Store::decode(blob) {
                Some(store) => {
                    if table.restore(key.clone(), store, now) {
                        restored += 1;
                    } else {
                        stale.push(key);
                    }
                }
                None => {
                    warn!(key = %key, "Ignoring persisted row with an invalid Store blob");
                    stale.push(key);
                }
            }
        }
        if let Some(adapter) = &persistence {
            info!(restored, skipped = total - restored, "Hydrated cache from persistence");
            prune_stale_rows(adapter.clone(), stale).await;
        }

        *self.state_mut() = Some(Live::new(table, persistence));
        *janitor = Some(spawn_janitor(
            self.inner.state.clone(),
            config.clean_interval,
        ));

        info!("Cache initialized");
        Ok(())
    }

    /// Opens the adapter and reads every row on the blocking pool.
    async fn load_persistence(&self) -> Result<Loaded> {
        let injected = self.inner.adapter.clone();
        let path = self.inner.config.persistence_path.clone();

        tokio::task::spawn_blocking(move || -> Result<Loaded> {
            let adapter: Arc<dyn Persistence> = match (injected, path) {
                (Some(adapter), _) => adapter,
                (None, Some(path)) => {
                    info!(path = %path.display(), "Opening SQLite persistence");
                    Arc::new(SqlitePersistence::open(&path)?)
                }
                (None, None) => return Ok(None),
            };
            let rows = adapter.find_all()?;
            Ok(Some((adapter, rows)))
        })
        .await
        .map_err(|e| CacheError::Internal(format!("hydration task failed: {e}")))?
    }

    // == Close ==
    /// Stops the janitor, waits for it to exit, then drops all cached state.
    ///
    /// A closed cache can be initialized again. Closing an uninitialized cache
    /// does nothing.
    pub async fn close(&self) -> Result<()> {
        let mut janitor = self.inner.janitor.lock().await;
        let Some(running) = janitor.take() else {
            return Ok(());
        };

        let stopped = running.shutdown().await;
        *self.state_mut() = None;
        info!("Cache closed");
        stopped
    }

    pub fn is_initialized(&self) -> bool {
        self.state().is_some()
    }

    // == Set ==
    /// Stores `value` under `key` only if no live entry exists.
    ///
    /// `ttl == Duration::ZERO` means the entry never expires.
    ///
    /// # Errors
    /// - `KeyExists` if a non-expired entry is present
    /// - `UnsupportedType` if the value cannot be encoded
    /// - `Persistence` if write-through fails (the entry is still cached)
    pub fn set<V: Encode + ?Sized>(&self, key: &str, value: &V, ttl: Duration) -> Result<()> {
        let payload = value.encode()?;
        let now = current_timestamp_ms();

        let (store, pending) = self.with_live_mut(|live| {
            let store = live.table.insert(key, &payload, V::ENCODING, ttl, now)?;
            Ok::<_, CacheError>((store, live.reserve_write()))
        })?;

        write_through(pending, "set", key, |p| {
            p.insert_or_update(key, store.as_slice())
        })
    }

    // == Put ==
    /// Stores `value` under `key`, replacing any existing entry.
    ///
    /// `ttl == None` keeps the expiry of a live existing entry (or never expires if
    /// there is none); `Some(Duration::ZERO)` never expires.
    pub fn put<V: Encode + ?Sized>(&self, key: &str, value: &V, ttl: Option<Duration>) -> Result<()> {
        let payload = value.encode()?;
        let now = current_timestamp_ms();

        let (store, pending) = self.with_live_mut(|live| {
            let store = live.table.upsert(key, &payload, V::ENCODING, ttl, now);
            (store, live.reserve_write())
        });

        write_through(pending, "put", key, |p| {
            p.insert_or_update(key, store.as_slice())
        })
    }

    // == Get ==
    /// Returns the value under `key` decoded as `T`.
    ///
    /// `None` if the key is missing, expired, or was stored with an encoding that
    /// cannot produce `T`. An expired entry is removed from memory on the spot.
    pub fn get<T: Decode>(&self, key: &str) -> Option<T> {
        let now = current_timestamp_ms();
        match self.with_live(|live| live.table.read::<T>(key, now)) {
            Lookup::Hit(value) => Some(value),
            Lookup::Expired => {
                self.with_live_mut(|live| live.table.evict_if_expired(key, now));
                None
            }
            Lookup::Missing | Lookup::Mismatch => None,
        }
    }

    /// Returns a copy of the encoded Store of a live entry.
    pub fn get_store(&self, key: &str) -> Option<Store> {
        let now = current_timestamp_ms();
        self.with_live(|live| live.table.store(key, now).cloned())
    }

    // == Exist ==
    /// True if `key` is present and not expired. Never mutates the cache.
    pub fn exist(&self, key: &str) -> bool {
        let now = current_timestamp_ms();
        self.with_live(|live| live.table.exists(key, now))
    }

    /// Remaining TTL of a live entry; `None` if missing, expired, or never-expiring.
    pub fn time_left(&self, key: &str) -> Option<Duration> {
        let now = current_timestamp_ms();
        self.with_live(|live| live.table.time_left(key, now))
    }

    // == Remove ==
    /// Deletes `key` from memory and persistence, returning whether it was cached.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let (existed, pending) =
            self.with_live_mut(|live| (live.table.remove(key), live.reserve_write()));

        write_through(pending, "remove", key, |p| p.remove_by_key(key))?;
        Ok(existed)
    }

    // == Clear ==
    /// Empties the cache and the expiry index, and deletes every persisted row.
    pub fn clear(&self) -> Result<()> {
        let pending = self.with_live_mut(|live| {
            live.table.clear();
            live.reserve_write()
        });

        write_through(pending, "clear", "*", |p| p.remove_all())
    }

    // == Size ==
    /// Sum of key length and encoded Store length over all live entries.
    pub fn size(&self) -> u64 {
        let now = current_timestamp_ms();
        self.with_live(|live| live.table.size(now))
    }

    /// Number of entries held, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.with_live(|live| live.table.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.with_live(|live| live.table.stats())
    }

    // == Lock Helpers ==
    fn state(&self) -> std::sync::RwLockReadGuard<'_, Option<Live>> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> std::sync::RwLockWriteGuard<'_, Option<Live>> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_live<R>(&self, f: impl FnOnce(&Live) -> R) -> R {
        let guard = self.state();
        match guard.as_ref() {
            Some(live) => f(live),
            None => not_initialized(),
        }
    }

    fn with_live_mut<R>(&self, f: impl FnOnce(&mut Live) -> R) -> R {
        let mut guard = self.state_mut();
        match guard.as_mut() {
            Some(live) => f(live),
            None => not_initialized(),
        }
    }
}

fn not_initialized() -> ! {
    panic!("Cache used before init() or after close()")
}

/// Best-effort removal of persisted rows hydration could not use. Failures are
/// only logged.
async fn prune_stale_rows(adapter: Arc<dyn Persistence>, keys: Vec<String>) {
    if keys.is_empty() {
        return;
    }

    let pruned = tokio::task::spawn_blocking(move || {
        keys.iter()
            .filter(|key| match adapter.remove_by_key(key) {
                Ok(()) => true,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to prune stale persisted row");
                    false
                }
            })
            .count()
    })
    .await;

    match pruned {
        Ok(count) => debug!(count, "Pruned stale persisted rows"),
        Err(e) => warn!(error = %e, "Pruning task failed"),
    }
}

/// Runs `op` in its reserved slot, if any, normalizing failures to `Persistence`.
fn write_through(
    pending: Option<PendingWrite>,
    op: &str,
    key: &str,
    f: impl FnOnce(&dyn Persistence) -> Result<()>,
) -> Result<()> {
    let Some(pending) = pending else {
        return Ok(());
    };
    pending.apply(f).map_err(|e| {
        warn!(op, key, error = %e, "Write-through failed; memory and persistence diverge");
        match e {
            CacheError::Persistence(_) => e,
            other => CacheError::Persistence(other.to_string()),
        }
    })
}
