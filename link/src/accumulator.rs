//! Byte-stream frame accumulation.
//!
//! UARTs hand over bytes in arbitrary chunks. The accumulator gathers them
//! until the 0x00 delimiter, decodes, and resynchronizes on anything
//! malformed or oversized.

use crate::LinkCounters;
use bytes::Bytes;
use mdp_wire::{DELIMITER, MAX_FRAME};
use tracing::trace;

/// Incremental frame assembler for byte-oriented transports.
#[derive(Debug)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    counters: LinkCounters,
}

impl FrameAccumulator {
    /// New accumulator reporting drops on `counters`
    pub fn new(counters: LinkCounters) -> Self {
        Self {
            buf: Vec::with_capacity(MAX_FRAME),
            counters,
        }
    }

    /// Feed a chunk of received bytes, returning every payload completed
    /// by it. Corrupt or oversized frames are counted and discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut out = Vec::new();
        for &byte in chunk {
            if byte == DELIMITER {
                if self.buf.is_empty() {
                    continue; // idle delimiter, stay synchronized
                }
                match mdp_wire::decode(&self.buf) {
                    Ok(payload) => {
                        self.counters.inc_rx();
                        out.push(Bytes::from(payload));
                    }
                    Err(e) => {
                        trace!(error = %e, len = self.buf.len(), "frame dropped");
                        self.counters.inc_dropped();
                    }
                }
                self.buf.clear();
                continue;
            }

            if self.buf.len() >= MAX_FRAME {
                // Oversized: discard and resync on the next delimiter
                self.counters.inc_dropped();
                self.buf.clear();
            }
            self.buf.push(byte);
        }
        out
    }
}
