//! Per-edge reliable delivery for MDP links.
//!
//! Every directed link edge owns two independent sequence spaces: the seqs
//! we assign outbound and the seqs we track inbound from the peer. This
//! crate keeps both per edge in [`EdgeState`], together with a bounded slot
//! table of in-flight frames retransmitted on a per-link RTO until the
//! peer's cumulative ACK crosses them.
//!
//! Delivery is at-least-once: receivers advance a cumulative in-order
//! watermark and tolerate duplicates; there is no selective repeat. A slot
//! that exhausts its retries is abandoned silently, and recovery (if any)
//! belongs to the origin's durable queue.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod edge;

pub use edge::{EdgeState, QueueError, RecvDisposition};

/// Retransmissions before a slot is abandoned (total sends = this + 1)
pub const MAX_RETRIES: u8 = 5;

/// Transmit slots per ordinary link edge
pub const DEFAULT_SLOTS: usize = 6;

/// Transmit slots on the router, which carries two edges worth of traffic
pub const ROUTER_SLOTS: usize = 8;

/// Retransmit timeout on the wired serial link
pub const SERIAL_RTO_MS: u64 = 120;

/// Retransmit timeout on the long-range radio link
pub const RADIO_RTO_MS: u64 = 1800;

/// Retransmit timeout on a UDP link
pub const UDP_RTO_MS: u64 = 500;
