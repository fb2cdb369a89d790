//! Per-link traffic counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    rx_frames: AtomicU64,
    rx_dropped: AtomicU64,
    tx_frames: AtomicU64,
}

/// Shared handle to one link's counters. Clones observe the same values;
/// the receive worker holds one clone, the owner another.
#[derive(Debug, Default, Clone)]
pub struct LinkCounters(Arc<Inner>);

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Well-formed frames delivered upward
    pub rx_frames: u64,
    /// Frames dropped for corruption (bad COBS or CRC) or overflow
    pub rx_dropped: u64,
    /// Frames accepted for transmission
    pub tx_frames: u64,
}

impl LinkCounters {
    /// Fresh zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delivered frame
    pub fn inc_rx(&self) {
        self.0.rx_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped frame
    pub fn inc_dropped(&self) {
        self.0.rx_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transmitted frame
    pub fn inc_tx(&self) {
        self.0.tx_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            rx_frames: self.0.rx_frames.load(Ordering::Relaxed),
            rx_dropped: self.0.rx_dropped.load(Ordering::Relaxed),
            tx_frames: self.0.tx_frames.load(Ordering::Relaxed),
        }
    }
}
