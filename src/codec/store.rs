//! Binary Store Module
//!
//! Fixed 32-byte big-endian header followed by the raw payload:
//!
//! ```text
//! [0..8)   created_at  unix ms, stamped at construction
//! [8..16)  updated_at  unix ms, 0 until first update
//! [16..24) max_age     opaque to the codec
//! [24..32) length      payload length in bytes
//! [32..)   payload
//! ```
//!
//! The same bytes are used in memory and as the persisted blob.

use serde::de::DeserializeOwned;

use crate::cache::current_timestamp_ms;
use crate::error::{CacheError, Result};

// == Layout ==
const CREATED_AT: usize = 0;
const UPDATED_AT: usize = 8;
const MAX_AGE: usize = 16;
const LENGTH: usize = 24;

/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = 32;

// == Store ==
/// A self-describing value container: header metadata plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    buf: Vec<u8>,
}

impl Store {
    // == Encode ==
    /// Builds a Store around `payload`, stamping `created_at` with the current time.
    ///
    /// `max_age` defaults to 0 when not given. Never fails.
    pub fn encode(payload: &[u8], max_age: Option<u64>) -> Self {
        Self::encode_at(payload, max_age, current_timestamp_ms().max(0) as u64)
    }

    /// Like [`Store::encode`], with an explicit `created_at` (Unix milliseconds).
    pub fn encode_at(payload: &[u8], max_age: Option<u64>, created_at: u64) -> Self {
        let mut buf = vec![0u8; HEADER_LEN + payload.len()];
        buf[CREATED_AT..UPDATED_AT].copy_from_slice(&created_at.to_be_bytes());
        buf[MAX_AGE..LENGTH].copy_from_slice(&max_age.unwrap_or(0).to_be_bytes());
        buf[LENGTH..HEADER_LEN].copy_from_slice(&(payload.len() as u64).to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(payload);
        Self { buf }
    }

    // == Decode ==
    /// Wraps an existing buffer without copying.
    ///
    /// Returns `None` if the buffer is too short to hold the header.
    pub fn decode(buf: Vec<u8>) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self { buf })
    }

    // == Header Accessors ==
    pub fn created_at(&self) -> u64 {
        self.read_u64(CREATED_AT)
    }

    pub fn updated_at(&self) -> u64 {
        self.read_u64(UPDATED_AT)
    }

    pub fn max_age(&self) -> u64 {
        self.read_u64(MAX_AGE)
    }

    /// Returns the total buffer size when `include_header` is set,
    /// otherwise the stored payload-length field.
    pub fn length(&self, include_header: bool) -> u64 {
        if include_header {
            self.buf.len() as u64
        } else {
            self.read_u64(LENGTH)
        }
    }

    pub fn set_updated_at(&mut self, ts: u64) -> &mut Self {
        self.write_u64(UPDATED_AT, ts);
        self
    }

    pub fn set_max_age(&mut self, max_age: u64) -> &mut Self {
        self.write_u64(MAX_AGE, max_age);
        self
    }

    pub fn set_length(&mut self, length: u64) -> &mut Self {
        self.write_u64(LENGTH, length);
        self
    }

    // == Typed Views ==
    /// Raw payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[HEADER_LEN..]
    }

    /// Payload as UTF-8 text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(self.bytes()).map_err(|e| CacheError::Deserialization(e.to_string()))
    }

    /// Payload as a big-endian u64 read from its first 8 bytes.
    pub fn as_integer(&self) -> Result<u64> {
        let payload = self.bytes();
        let head: [u8; 8] = payload
            .get(..8)
            .and_then(|s| s.try_into().ok())
            .ok_or(CacheError::PayloadTooShort { len: payload.len() })?;
        Ok(u64::from_be_bytes(head))
    }

    /// Payload deserialized as JSON.
    pub fn as_structured<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(self.bytes())?)
    }

    /// The complete encoded buffer (header and payload).
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    fn read_u64(&self, at: usize) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.buf[at..at + 8]);
        u64::from_be_bytes(word)
    }

    fn write_u64(&mut self, at: usize, value: u64) {
        self.buf[at..at + 8].copy_from_slice(&value.to_be_bytes());
    }
}
