//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is initialized.
//!
//! # Tasks
//! - Janitor: Removes expired cache entries at the configured interval

mod janitor;

pub use janitor::{spawn_janitor, Janitor};
