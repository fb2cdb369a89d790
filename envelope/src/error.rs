//! Envelope error types.

use thiserror::Error;

/// Envelope build/parse errors
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// CBOR serialization failed
    #[error("cbor encode failed")]
    Encode,

    /// CBOR deserialization failed
    #[error("cbor decode failed")]
    Decode,

    /// Top-level value is not a map
    #[error("envelope is not a map")]
    NotMap,

    /// Required key absent
    #[error("missing field {0}")]
    MissingField(u64),

    /// Key present with the wrong CBOR type or width
    #[error("bad field {0}")]
    BadField(u64),
}
