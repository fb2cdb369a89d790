//! Wire protocol error types.

use thiserror::Error;

/// Frame codec errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// COBS framing invalid (bad code byte or interior zero)
    #[error("cobs framing invalid")]
    BadCobs,

    /// Decoded frame shorter than the trailing CRC
    #[error("frame too short")]
    TooShort,

    /// CRC-16 mismatch
    #[error("crc mismatch")]
    BadCrc,
}

/// Header and body errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Not our protocol
    #[error("magic mismatch: {0:#06x}")]
    Magic(u16),

    /// Unsupported protocol version
    #[error("version unsupported: {0}")]
    Version(u8),

    /// Unknown message type byte
    #[error("unknown type {0:#04x}")]
    Type(u8),

    /// Buffer ends before the structure does
    #[error("truncated")]
    Truncated,

    /// Size limit exceeded
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Length tag disagrees with the bytes present
    #[error("malformed body")]
    Malformed,
}
