//! Frame codec: COBS byte stuffing over a CRC-16 protected payload.
//!
//! On-wire form of every MDP frame, on every link kind:
//!
//! ```text
//! COBS( payload ‖ CRC16_LE(payload) ) ‖ 0x00
//! ```
//!
//! CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflect, no xor-out,
//! stored little-endian. The trailing 0x00 is the only zero byte in a
//! well-formed encoded stream.

use crate::{DecodeError, WireError, MAX_PAYLOAD};
use bytes::Bytes;
use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16/CCITT-FALSE (the catalog calls it IBM-3740)
pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Frame delimiter byte
pub const DELIMITER: u8 = 0x00;

/// Encode a payload into a delimited frame.
///
/// Appends the CRC, COBS-stuffs the result, and terminates with the single
/// 0x00 delimiter.
pub fn encode(payload: &[u8]) -> Result<Bytes, WireError> {
    if payload.is_empty() || payload.len() > MAX_PAYLOAD {
        return Err(WireError::Size(payload.len()));
    }

    let mut raw = Vec::with_capacity(payload.len() + 2);
    raw.extend_from_slice(payload);
    let crc = CRC16.checksum(payload);
    raw.extend_from_slice(&crc.to_le_bytes());

    let mut enc = vec![0u8; cobs::max_encoding_length(raw.len()) + 1];
    let used = cobs::encode(&raw, &mut enc);
    enc[used] = DELIMITER;
    enc.truncate(used + 1);

    Ok(Bytes::from(enc))
}

/// Decode one frame back into its payload.
///
/// Accepts the encoded bytes with or without the trailing delimiter. Fails
/// with [`DecodeError::BadCobs`] on stuffing violations,
/// [`DecodeError::TooShort`] when the decoded bytes cannot hold a CRC, and
/// [`DecodeError::BadCrc`] on checksum mismatch.
pub fn decode(frame: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let encoded = match frame.last() {
        Some(&DELIMITER) => &frame[..frame.len() - 1],
        Some(_) => frame,
        None => return Err(DecodeError::TooShort),
    };
    if encoded.is_empty() {
        return Err(DecodeError::TooShort);
    }
    if encoded.contains(&DELIMITER) {
        return Err(DecodeError::BadCobs);
    }

    let mut buf = encoded.to_vec();
    let len = cobs::decode_in_place(&mut buf).map_err(|_| DecodeError::BadCobs)?;
    if len < 2 {
        return Err(DecodeError::TooShort);
    }

    buf.truncate(len);
    let stored = u16::from_le_bytes([buf[len - 2], buf[len - 1]]);
    buf.truncate(len - 2);
    if CRC16.checksum(&buf) != stored {
        return Err(DecodeError::BadCrc);
    }

    Ok(buf)
}
