//! Persistence Module
//!
//! Durable mirror of the cache table. Blobs are the exact Store byte layout and
//! must be returned unmodified.

mod sqlite;
mod write_through;

pub use sqlite::SqlitePersistence;
pub use write_through::{PendingWrite, WriteThrough};

use crate::error::Result;

/// A persisted key and its encoded Store bytes.
pub type PersistedRow = (String, Vec<u8>);

// == Persistence Adapter ==
/// Backend the cache writes through to and hydrates from.
///
/// Calls are synchronous and made on the caller's thread, outside the table lock,
/// in the order the table applied the mutations.
pub trait Persistence: Send + Sync {
    /// Inserts `blob` under `key`, replacing any previous value.
    fn insert_or_update(&self, key: &str, blob: &[u8]) -> Result<()>;

    /// Returns every persisted row.
    fn find_all(&self) -> Result<Vec<PersistedRow>>;

    fn remove_by_key(&self, key: &str) -> Result<()>;

    fn remove_all(&self) -> Result<()>;
}
