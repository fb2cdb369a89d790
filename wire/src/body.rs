//! Command and event bodies.
//!
//! Variable-length tails behind the fixed header are always length-tagged:
//! parsers read the tag, then exactly that many bytes.

use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Event type carried by command-result events
pub const EVT_CMD_RESULT: u16 = 0x0001;

/// Command dispatch statuses, as reported back in the result event.
pub mod status {
    /// Command executed
    pub const OK: i16 = 0;
    /// cmd_id not recognized
    pub const UNKNOWN_CMD: i16 = -1;
    /// Payload shorter than the command requires
    pub const BAD_LENGTH: i16 = -2;
    /// Argument out of range
    pub const BAD_ARG: i16 = -3;
    /// Payload failed to parse
    pub const PARSE_FAIL: i16 = -4;
    /// Parsed but rejected by validation
    pub const VALIDATION_FAIL: i16 = -5;
    /// No free reliability slot for the command or its result
    pub const QUEUE_FULL: i16 = -6;
}

/// Command body: `cmd_id u16 ‖ cmd_len u16 ‖ cmd_data[cmd_len]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBody {
    /// Command identifier; ids above 0x0009 are owned by the effector
    pub cmd_id: u16,
    /// Opaque command argument bytes
    pub data: Bytes,
}

impl CommandBody {
    /// Encode to wire bytes (little-endian)
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(4 + self.data.len());
        buf.put_u16_le(self.cmd_id);
        buf.put_u16_le(self.data.len() as u16);
        buf.put_slice(&self.data);
        buf
    }

    /// Decode from the body bytes following the header
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        if body.len() < 4 {
            return Err(WireError::Truncated);
        }
        let mut buf = body;
        let cmd_id = buf.get_u16_le();
        let cmd_len = buf.get_u16_le() as usize;
        if buf.remaining() < cmd_len {
            return Err(WireError::Malformed);
        }
        Ok(Self {
            cmd_id,
            data: Bytes::copy_from_slice(&buf[..cmd_len]),
        })
    }
}

/// Event body: `evt_type u16 ‖ evt_len u16 ‖ cmd_id u16 ‖ status i16 ‖ data`
///
/// `evt_len` counts everything after itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBody {
    /// Event type, [`EVT_CMD_RESULT`] for command results
    pub evt_type: u16,
    /// Command this event answers
    pub cmd_id: u16,
    /// Dispatch status, see [`status`]
    pub status: i16,
    /// Optional result bytes
    pub data: Bytes,
}

impl EventBody {
    /// Build a command-result event
    pub fn cmd_result(cmd_id: u16, status: i16) -> Self {
        Self {
            evt_type: EVT_CMD_RESULT,
            cmd_id,
            status,
            data: Bytes::new(),
        }
    }

    /// Encode to wire bytes (little-endian)
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(8 + self.data.len());
        buf.put_u16_le(self.evt_type);
        buf.put_u16_le((4 + self.data.len()) as u16);
        buf.put_u16_le(self.cmd_id);
        buf.put_i16_le(self.status);
        buf.put_slice(&self.data);
        buf
    }

    /// Decode from the body bytes following the header
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        if body.len() < 8 {
            return Err(WireError::Truncated);
        }
        let mut buf = body;
        let evt_type = buf.get_u16_le();
        let evt_len = buf.get_u16_le() as usize;
        if evt_len < 4 || buf.remaining() < evt_len {
            return Err(WireError::Malformed);
        }
        let cmd_id = buf.get_u16_le();
        let status = buf.get_i16_le();
        Ok(Self {
            evt_type,
            cmd_id,
            status,
            data: Bytes::copy_from_slice(&buf[..evt_len - 4]),
        })
    }
}
