//! ttlstore - An in-process key/value cache
//!
//! Thread-safe typed cache with per-entry TTL, lazy and periodic eviction, a
//! self-describing binary value layout, and optional SQLite write-through.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod persistence;
pub mod tasks;

pub use cache::{Cache, CacheStats};
pub use codec::{Decode, Encode, Encoding, Json, Store};
pub use config::Config;
pub use error::{CacheError, Result};
pub use persistence::{Persistence, SqlitePersistence};
