//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, lazy and periodic eviction,
//! and optional write-through persistence.

mod engine;
mod entry;
mod expiry;
mod stats;
mod table;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::{Cache, Live, SharedState};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use expiry::ExpiryIndex;
pub use stats::{CacheCounters, CacheStats};
pub use table::{expiry_from_ttl, CacheTable, Lookup};
