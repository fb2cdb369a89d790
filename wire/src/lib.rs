//! MDP wire protocol: header, framing, and typed bodies.
//!
//! This crate implements the byte-level contract shared by every MycoBrain
//! link: the 16-byte little-endian header, the COBS + CRC-16/CCITT-FALSE
//! frame codec, and the length-tagged command/event bodies.
//!
//! ## Wire Format
//!
//! ```text
//! +--------------------+-------------------------------+
//! | header (16B)       | magic, version, type, seq,    |
//! |                    | ack, flags, src, dst, rsv     |
//! +--------------------+-------------------------------+
//! | body (0..N)        | type-specific, opaque to links|
//! +--------------------+-------------------------------+
//! | crc16 (2B, LE)     | CCITT-FALSE over header‖body  |
//! +--------------------+-------------------------------+
//! ```
//!
//! The whole unit is COBS-encoded and terminated by a single 0x00.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod body;
pub mod error;
pub mod frame;
pub mod header;

pub use body::{status, CommandBody, EventBody, EVT_CMD_RESULT};
pub use error::{DecodeError, WireError};
pub use frame::{decode, encode, CRC16, DELIMITER};
pub use header::{
    endpoint, Flags, Header, MsgType, HEADER_SIZE, MAX_FRAME, MAX_PAYLOAD, MDP_MAGIC, MDP_VERSION,
};
