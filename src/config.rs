//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default janitor interval
pub const DEFAULT_CLEAN_INTERVAL: Duration = Duration::from_secs(1);

/// Default memory ceiling in bytes (1 GiB). Accepted but not enforced.
pub const DEFAULT_MAX_MEMORY: u64 = 1024 * 1024 * 1024;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// `max_memory`, `min_allocation` and `evict_oldest` are part of the configuration
/// surface but no component enforces them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How often the janitor sweeps the expiry index
    pub clean_interval: Duration,
    /// SQLite database path; `None` keeps the cache memory-only
    pub persistence_path: Option<PathBuf>,
    /// Memory ceiling in bytes (not enforced)
    pub max_memory: u64,
    /// Minimum allocation in bytes (not enforced)
    pub min_allocation: u64,
    /// Evict the oldest entry when the ceiling is hit (not enforced)
    pub evict_oldest: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TTLSTORE_CLEAN_INTERVAL_MS` - Janitor interval in milliseconds (default: 1000)
    /// - `TTLSTORE_PERSISTENCE_PATH` - SQLite file path (default: unset, memory-only)
    /// - `TTLSTORE_MAX_MEMORY` - Memory ceiling in bytes (default: 1 GiB)
    /// - `TTLSTORE_MIN_ALLOCATION` - Minimum allocation in bytes (default: 0)
    /// - `TTLSTORE_EVICT_OLDEST` - `true`/`false` (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            clean_interval: env::var("TTLSTORE_CLEAN_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.clean_interval),
            persistence_path: env::var("TTLSTORE_PERSISTENCE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            max_memory: env::var("TTLSTORE_MAX_MEMORY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_memory),
            min_allocation: env::var("TTLSTORE_MIN_ALLOCATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_allocation),
            evict_oldest: env::var("TTLSTORE_EVICT_OLDEST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.evict_oldest),
        }
    }

    /// Sets the janitor interval. A zero interval falls back to the default.
    pub fn with_clean_interval(mut self, interval: Duration) -> Self {
        self.clean_interval = normalize_clean_interval(interval);
        self
    }

    /// Enables SQLite write-through at `path`.
    pub fn with_persistence_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persistence_path = Some(path.into());
        self
    }

    /// Returns true if any of the unenforced knobs differ from their defaults.
    pub(crate) fn has_unenforced_limits(&self) -> bool {
        let defaults = Self::default();
        self.max_memory != defaults.max_memory
            || self.min_allocation != defaults.min_allocation
            || self.evict_oldest != defaults.evict_oldest
    }
}

/// Maps a zero janitor interval to [`DEFAULT_CLEAN_INTERVAL`].
pub(crate) fn normalize_clean_interval(interval: Duration) -> Duration {
    if interval.is_zero() {
        DEFAULT_CLEAN_INTERVAL
    } else {
        interval
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clean_interval: DEFAULT_CLEAN_INTERVAL,
            persistence_path: None,
            max_memory: DEFAULT_MAX_MEMORY,
            min_allocation: 0,
            evict_oldest: false,
        }
    }
}
