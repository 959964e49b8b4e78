//! Value Encoding Module
//!
//! Maps Rust types onto the three payload encodings the cache understands.
//! Integers of every width share a compact 8-byte big-endian form, strings are
//! stored as raw UTF-8, and everything else goes through JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::Store;
use crate::error::{CacheError, Result};

// == Encoding ==
/// The payload encodings a Store can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// 64-bit big-endian integer, narrowed on decode
    Integer,
    /// Raw UTF-8 text
    Text,
    /// JSON document
    Structured,
}

/// A value that can be written into a Store payload.
pub trait Encode {
    const ENCODING: Encoding;

    fn encode(&self) -> Result<Vec<u8>>;
}

/// A value that can be read back out of a Store payload.
pub trait Decode: Sized {
    const ENCODING: Encoding;

    fn decode(store: &Store) -> Result<Self>;
}

// == Integers ==
macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl Encode for $t {
            const ENCODING: Encoding = Encoding::Integer;

            fn encode(&self) -> Result<Vec<u8>> {
                // sign-extend so narrowing on decode restores negative values
                Ok((*self as i64).to_be_bytes().to_vec())
            }
        }

        impl Decode for $t {
            const ENCODING: Encoding = Encoding::Integer;

            fn decode(store: &Store) -> Result<Self> {
                Ok(store.as_integer()? as i64 as $t)
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl Encode for $t {
            const ENCODING: Encoding = Encoding::Integer;

            fn encode(&self) -> Result<Vec<u8>> {
                Ok((*self as u64).to_be_bytes().to_vec())
            }
        }

        impl Decode for $t {
            const ENCODING: Encoding = Encoding::Integer;

            fn decode(store: &Store) -> Result<Self> {
                Ok(store.as_integer()? as $t)
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);

// == Text ==
impl Encode for str {
    const ENCODING: Encoding = Encoding::Text;

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Encode for String {
    const ENCODING: Encoding = Encoding::Text;

    fn encode(&self) -> Result<Vec<u8>> {
        self.as_str().encode()
    }
}

impl Decode for String {
    const ENCODING: Encoding = Encoding::Text;

    fn decode(store: &Store) -> Result<Self> {
        store.text().map(str::to_owned)
    }
}

// == Structured ==
fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CacheError::UnsupportedType(e.to_string()))
}

/// Stores any serde type as a JSON payload.
///
/// ```ignore
/// cache.put("user:1", &Json(user), None)?;
/// let Json(user) = cache.get::<Json<User>>("user:1").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize> Encode for Json<T> {
    const ENCODING: Encoding = Encoding::Structured;

    fn encode(&self) -> Result<Vec<u8>> {
        to_json(&self.0)
    }
}

impl<T: DeserializeOwned> Decode for Json<T> {
    const ENCODING: Encoding = Encoding::Structured;

    fn decode(store: &Store) -> Result<Self> {
        store.as_structured().map(Json)
    }
}

macro_rules! impl_structured {
    ($($t:ty),*) => {$(
        impl Encode for $t {
            const ENCODING: Encoding = Encoding::Structured;

            fn encode(&self) -> Result<Vec<u8>> {
                to_json(self)
            }
        }

        impl Decode for $t {
            const ENCODING: Encoding = Encoding::Structured;

            fn decode(store: &Store) -> Result<Self> {
                store.as_structured()
            }
        }
    )*};
}

impl_structured!(f32, f64, bool, serde_json::Value);
