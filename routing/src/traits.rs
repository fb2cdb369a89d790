//! Collaborator seams.
//!
//! Everything outside the core — sensing, effectors, identity — sits
//! behind these traits. The binary supplies simulated implementations; a
//! firmware build would supply hardware-backed ones.

use mdp_envelope::{Geo, Reading};

/// Source of telemetry samples (the DSP pipeline's output side).
///
/// The core does not interpret readings; they pass opaquely into the
/// envelope.
pub trait SensorSource {
    /// Poll for a fresh sample; `None` when nothing new this iteration
    fn read_sample(&mut self) -> Option<Vec<Reading>>;

    /// Current position fix, when the node has one
    fn geo(&mut self) -> Option<Geo> {
        None
    }
}

/// Executor for commands delivered to this node.
///
/// Returns one of the statuses from [`mdp_wire::status`]: `0` ok, `-1`
/// unknown command, `-2` bad length, `-3` bad argument, `-4` parse
/// failure, `-5` validation failure.
pub trait CommandEffector {
    /// Execute `cmd_id` with its argument bytes
    fn dispatch(&mut self, cmd_id: u16, payload: &[u8]) -> i16;
}

/// Provider of the node's persisted identity.
pub trait Identity {
    /// Stable device identifier, e.g. `mb-A-01`
    fn device_id(&self) -> String;

    /// Role string, at most 31 bytes
    fn device_role(&self) -> String;

    /// Human-readable name, at most 63 bytes
    fn display_name(&self) -> String {
        self.device_id()
    }
}
