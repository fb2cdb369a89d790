//! MDP header processing.
//!
//! This module defines the 16-byte little-endian header that every MDP
//! message carries, along with the endpoint address constants and flag bits.

use crate::WireError;
use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};

/// Protocol magic, first two bytes of every header
pub const MDP_MAGIC: u16 = 0xA15A;

/// Wire protocol version
pub const MDP_VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Largest encoded frame a link must accept
pub const MAX_FRAME: usize = 1200;

/// Largest header+body payload accepted by the codec
pub const MAX_PAYLOAD: usize = 900;

/// Endpoint addresses. Routing hints, not transport identity.
pub mod endpoint {
    /// Side A: sensing and actuation
    pub const ORIGIN: u8 = 0xA1;
    /// Side B: radio router
    pub const ROUTER: u8 = 0xB1;
    /// Long-range radio gateway
    pub const GATEWAY: u8 = 0xC0;
    /// All nodes
    pub const BROADCAST: u8 = 0xFF;
}

/// Message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    /// Sensor telemetry envelope
    Telemetry,
    /// Command toward an effector
    Command,
    /// ACK-only frame, bookkeeping payload
    Ack,
    /// Event, notably command results
    Event,
    /// Peer discovery
    Hello,
    /// Domain extension (0x07 and above); body is opaque to the core
    Domain(u8),
}

impl MsgType {
    /// Wire byte for this type
    pub fn to_u8(self) -> u8 {
        match self {
            MsgType::Telemetry => 0x01,
            MsgType::Command => 0x02,
            MsgType::Ack => 0x03,
            MsgType::Event => 0x05,
            MsgType::Hello => 0x06,
            MsgType::Domain(v) => v,
        }
    }

    /// Whether the router treats this type like telemetry when forwarding
    pub fn is_telemetry_like(self) -> bool {
        matches!(self, MsgType::Telemetry | MsgType::Domain(_))
    }
}

impl TryFrom<u8> for MsgType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MsgType::Telemetry),
            0x02 => Ok(MsgType::Command),
            0x03 => Ok(MsgType::Ack),
            0x05 => Ok(MsgType::Event),
            0x06 => Ok(MsgType::Hello),
            0x07..=0xFF => Ok(MsgType::Domain(value)),
            _ => Err(WireError::Type(value)),
        }
    }
}

bitflags! {
    /// Header flag bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        /// Sender wants a cumulative ACK back
        const ACK_REQUESTED = 0x01;
        /// Frame is an ACK
        const IS_ACK = 0x02;
        /// Frame is a NACK
        const IS_NACK = 0x04;
    }
}

/// MDP header (16 bytes on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message type
    pub msg_type: MsgType,
    /// Sender's monotonically increasing sequence, per directed edge
    pub seq: u32,
    /// Cumulative ACK: every seq <= this value was received from the peer
    pub ack: u32,
    /// Flag bits
    pub flags: Flags,
    /// Sender endpoint
    pub src: u8,
    /// Intended recipient endpoint
    pub dst: u8,
}

impl Header {
    /// Create a header with empty flags and zero ack
    pub fn new(msg_type: MsgType, seq: u32, src: u8, dst: u8) -> Self {
        Self {
            msg_type,
            seq,
            ack: 0,
            flags: Flags::empty(),
            src,
            dst,
        }
    }

    /// Encode the header to the wire form (little-endian)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(MDP_MAGIC);
        buf.put_u8(MDP_VERSION);
        buf.put_u8(self.msg_type.to_u8());
        buf.put_u32_le(self.seq);
        buf.put_u32_le(self.ack);
        buf.put_u8(self.flags.bits());
        buf.put_u8(self.src);
        buf.put_u8(self.dst);
        buf.put_u8(0); // rsv
    }

    /// Encode into a fresh 16-byte buffer
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        self.encode(&mut buf);
        buf
    }

    /// Decode the header from the front of a payload.
    ///
    /// Unknown flag bits and the reserved byte are carried, not rejected;
    /// only magic and version gate acceptance.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        if payload.len() < HEADER_SIZE {
            return Err(WireError::Truncated);
        }

        let mut buf = payload;
        let magic = buf.get_u16_le();
        if magic != MDP_MAGIC {
            return Err(WireError::Magic(magic));
        }

        let version = buf.get_u8();
        if version != MDP_VERSION {
            return Err(WireError::Version(version));
        }

        let msg_type = MsgType::try_from(buf.get_u8())?;
        let seq = buf.get_u32_le();
        let ack = buf.get_u32_le();
        let flags = Flags::from_bits_retain(buf.get_u8());
        let src = buf.get_u8();
        let dst = buf.get_u8();
        let _rsv = buf.get_u8();

        Ok(Self {
            msg_type,
            seq,
            ack,
            flags,
            src,
            dst,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_type_conversion() {
        assert_eq!(MsgType::try_from(0x01).unwrap(), MsgType::Telemetry);
        assert_eq!(MsgType::try_from(0x06).unwrap(), MsgType::Hello);
        assert_eq!(MsgType::try_from(0x08).unwrap(), MsgType::Domain(0x08));
        assert!(MsgType::try_from(0x00).is_err());
        assert!(MsgType::try_from(0x04).is_err());
        assert_eq!(MsgType::Domain(0x42).to_u8(), 0x42);
    }

    #[test]
    fn test_header_roundtrip() {
        let mut hdr = Header::new(MsgType::Telemetry, 7, endpoint::ORIGIN, endpoint::ROUTER);
        hdr.ack = 3;
        hdr.flags = Flags::ACK_REQUESTED;

        let bytes = hdr.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let decoded = Header::decode(&bytes).unwrap();
        assert_eq!(hdr, decoded);
    }

    #[test]
    fn test_header_wire_layout() {
        let mut hdr = Header::new(MsgType::Command, 0x01020304, endpoint::GATEWAY, endpoint::ORIGIN);
        hdr.ack = 0x0A0B0C0D;
        hdr.flags = Flags::IS_ACK | Flags::ACK_REQUESTED;

        let bytes = hdr.to_bytes();
        assert_eq!(&bytes[0..2], &[0x5A, 0xA1]); // magic LE
        assert_eq!(bytes[2], 1); // version
        assert_eq!(bytes[3], 0x02); // COMMAND
        assert_eq!(&bytes[4..8], &[0x04, 0x03, 0x02, 0x01]); // seq LE
        assert_eq!(&bytes[8..12], &[0x0D, 0x0C, 0x0B, 0x0A]); // ack LE
        assert_eq!(bytes[12], 0x03); // flags
        assert_eq!(bytes[13], endpoint::GATEWAY);
        assert_eq!(bytes[14], endpoint::ORIGIN);
        assert_eq!(bytes[15], 0); // rsv
    }

    #[test]
    fn test_header_rejects_bad_magic_and_version() {
        let hdr = Header::new(MsgType::Ack, 1, endpoint::ROUTER, endpoint::ORIGIN);
        let good = hdr.to_bytes();

        let mut bad_magic = good.clone();
        bad_magic[0] ^= 0xFF;
        assert!(matches!(
            Header::decode(&bad_magic),
            Err(WireError::Magic(_))
        ));

        let mut bad_version = good.clone();
        bad_version[2] = 9;
        assert_eq!(Header::decode(&bad_version), Err(WireError::Version(9)));

        assert_eq!(Header::decode(&good[..10]), Err(WireError::Truncated));
    }
}
