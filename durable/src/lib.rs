//! Durable replay storage for unacked outbound telemetry.
//!
//! The origin node writes every telemetry envelope into a fixed-capacity
//! ring persisted in a key-value store before the first transmission. A
//! slot is freed once the peer's cumulative ACK crosses its seq; everything
//! still in the ring after a reboot is replayed with its original seq
//! before new telemetry is generated.
//!
//! The store is deliberately small: byte blobs under short ASCII keys with
//! atomic single-key writes, the shape of a microcontroller NVS namespace.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod ring;

use thiserror::Error;

pub use backend::file::FileKv;
pub use backend::mem::MemKv;
pub use ring::{DurableRing, RING_CAPACITY};

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error from the backing store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes failed validation
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Key is not short ASCII
    #[error("invalid key: {0}")]
    BadKey(String),

    /// Backend-specific failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Nonvolatile key-value storage.
///
/// Keys are short ASCII (letters, digits, `_`; at most 15 bytes). A `put`
/// is atomic per key: after it returns, a crash leaves either the old or
/// the new value, never a torn one.
pub trait Kv {
    /// Read a value, `None` when the key was never written
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomically write a value
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove a key; removing an absent key is not an error
    fn erase(&mut self, key: &str) -> Result<(), StoreError>;
}

pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && key.len() <= 15
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::BadKey(key.to_string()))
    }
}
