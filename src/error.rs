//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine, codec and persistence adapters.
#[derive(Error, Debug)]
pub enum CacheError {
    /// `set` was called on a key that is present and not expired
    #[error("Key already exists: {0}")]
    KeyExists(String),

    /// Integer decode attempted on a payload shorter than 8 bytes
    #[error("Payload too short for integer decode: {len} bytes")]
    PayloadTooShort { len: usize },

    /// Payload could not be decoded into the requested type
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// Value cannot be encoded by the codec
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// The persistence adapter reported a failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Internal failure (e.g. a background task panicked)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Deserialization(e.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
