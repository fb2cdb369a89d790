//! Null link for absent hardware.
//!
//! A node role constructed without some physical link still runs the same
//! state machine; the null link discards sends and never yields a frame.

use crate::{Link, LinkCounters, LinkError};
use bytes::Bytes;

/// Link that goes nowhere.
#[derive(Debug, Default)]
pub struct NullLink {
    counters: LinkCounters,
}

impl NullLink {
    /// Create a null link
    pub fn new() -> Self {
        Self::default()
    }
}

impl Link for NullLink {
    fn send(&mut self, _frame: &[u8]) -> Result<(), LinkError> {
        Ok(())
    }

    fn poll(&mut self) -> Option<Bytes> {
        None
    }

    fn counters(&self) -> LinkCounters {
        self.counters.clone()
    }
}
