//! Node role state machines for the three-node MDP network.
//!
//! One cooperative state machine per role:
//!
//! - [`OriginCore`] (Side A) generates signed telemetry, consumes commands
//!   addressed to it, and answers with result events. Its unacked telemetry
//!   lives in the durable ring until the gateway-side cumulative ACK comes
//!   back through the router.
//! - [`RouterCore`] (Side B) bridges the wired link and the radio link,
//!   rewriting only the 16-byte header: telemetry and events go up to the
//!   gateway, commands come down to the origin, and a frame never leaves on
//!   the link it arrived on.
//! - [`GatewayCore`] surfaces radio traffic as host records and turns host
//!   commands into reliable COMMAND frames.
//!
//! The cores are transport-free: they consume decoded payloads and emit
//! payloads for the shell to encode and hand to links, which keeps every
//! scenario testable without I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod gateway;
pub mod origin;
pub mod router;
pub mod traits;

pub use gateway::{GatewayCore, HostCommand, HostRecord};
pub use origin::OriginCore;
pub use router::{Outbound, RouterCore, RouterLink};
pub use traits::{CommandEffector, Identity, SensorSource};

/// Command ids interpreted by the core itself. Everything else — including
/// every id above 0x0009 — is routed to the effector verbatim.
pub mod cmd_id {
    /// Reconfigure the sensor bus
    pub const SET_I2C: u16 = 0x0001;
    /// Rescan the sensor bus
    pub const SCAN_I2C: u16 = 0x0002;
    /// Change the origin's telemetry period (u32 LE milliseconds)
    pub const SET_TELEM_MS: u16 = 0x0003;
    /// Switch a MOSFET channel
    pub const SET_MOS: u16 = 0x0004;
    /// Persist effector state
    pub const SAVE_NVS: u16 = 0x0007;
    /// Reload effector state
    pub const LOAD_NVS: u16 = 0x0008;
    /// Reboot the node
    pub const REBOOT: u16 = 0x0009;
}
