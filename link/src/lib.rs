//! Transport-agnostic full-duplex frame channels.
//!
//! A [`Link`] moves already-encoded MDP frames: `send` submits one encoded
//! frame without blocking, `poll` yields decoded payloads (header ‖ body,
//! COBS and CRC stripped) without blocking. Malformed frames never cross a
//! link: they are dropped below the protocol layer with a per-link counter
//! increment.
//!
//! Shipped kinds: wired serial (UART byte stream with 0x00 resync), UDP
//! (one frame per datagram), an in-memory pair for tests, and a null link
//! standing in for absent hardware. Other transports (BLE notify, packet
//! radio behind a modem) plug in behind the same trait.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accumulator;
pub mod counters;
pub mod mem;
pub mod null;
pub mod serial;
pub mod udp;

use bytes::Bytes;
use thiserror::Error;

pub use accumulator::FrameAccumulator;
pub use counters::{CounterSnapshot, LinkCounters};
pub use mem::MemLink;
pub use null::NullLink;
pub use serial::SerialLink;
pub use udp::UdpLink;

/// Link submission errors. The receive side surfaces nothing: on fault it
/// simply yields no frames.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Outbound buffer is full; try again after the next pump
    #[error("link backpressure")]
    Backpressure,

    /// The transport is gone or rejected the write
    #[error("transport error: {0}")]
    Transport(String),
}

/// A full-duplex frame channel.
pub trait Link: Send {
    /// Submit one encoded frame (delimiter included). Never blocks.
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError>;

    /// Take the next decoded payload, if one has arrived. Never blocks.
    fn poll(&mut self) -> Option<Bytes>;

    /// Handle to this link's traffic counters
    fn counters(&self) -> LinkCounters;
}
