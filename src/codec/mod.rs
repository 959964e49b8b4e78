//! Codec Module
//!
//! Binary Store layout and the type-to-encoding dispatch used by the cache.

mod store;
mod value;

pub use store::{Store, HEADER_LEN};
pub use value::{Decode, Encode, Encoding, Json};
