//! Edge state: sequence spaces, slot table, ACK bookkeeping.

use crate::MAX_RETRIES;
use bytes::Bytes;
use mdp_wire::Flags;
use thiserror::Error;
use tracing::{debug, trace};

/// Enqueue errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// No free transmit slot. Telemetry falls back on the durable queue;
    /// commands and events surface this as status -6.
    #[error("no free transmit slot")]
    QueueFull,

    /// The payload's seq was never assigned on this edge
    #[error("seq {0} not assigned on this edge")]
    SeqUnassigned(u32),
}

/// What an inbound seq meant to the in-order watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvDisposition {
    /// Next expected seq; watermark advanced
    InOrder,
    /// At or below the watermark; already seen
    Duplicate,
    /// Ahead of the watermark; accepted for processing, watermark held
    /// (the peer retransmits the gap)
    OutOfOrder,
}

#[derive(Debug, Clone, Default)]
struct TxSlot {
    used: bool,
    seq: u32,
    payload: Bytes,
    last_send_ms: Option<u64>,
    retries: u8,
    rto_ms: u64,
    ack_requested: bool,
}

/// Reliability state for one directed link edge.
#[derive(Debug)]
pub struct EdgeState {
    tx_seq: u32,
    peer_acked: u32,
    peer_last_inorder: u32,
    ack_due: bool,
    slots: Vec<TxSlot>,
}

impl EdgeState {
    /// New edge with a fresh sequence space (next assigned seq is 1)
    pub fn new(slots: usize) -> Self {
        Self::with_tx_seq(slots, 1)
    }

    /// New edge continuing an existing sequence space, as after a reboot
    /// when `tx_seq` was restored from durable storage
    pub fn with_tx_seq(slots: usize, tx_seq: u32) -> Self {
        Self {
            tx_seq,
            peer_acked: 0,
            peer_last_inorder: 0,
            ack_due: false,
            slots: vec![TxSlot::default(); slots],
        }
    }

    /// Assign the next outbound sequence number
    pub fn next_seq(&mut self) -> u32 {
        let seq = self.tx_seq;
        self.tx_seq += 1;
        seq
    }

    /// Next seq that [`Self::next_seq`] would assign
    pub fn tx_seq(&self) -> u32 {
        self.tx_seq
    }

    /// Highest cumulative ACK seen from the peer
    pub fn peer_acked(&self) -> u32 {
        self.peer_acked
    }

    /// Highest in-order seq received from the peer; this is the value an
    /// outbound header's `ack` field carries
    pub fn peer_last_inorder(&self) -> u32 {
        self.peer_last_inorder
    }

    /// Occupied transmit slots
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|s| s.used).count()
    }

    /// Place an already-headered payload into a transmit slot.
    ///
    /// The header's seq must have been assigned via [`Self::next_seq`] on
    /// this edge (boot replay enqueues older assigned seqs). The payload is
    /// held verbatim and transmitted by the next [`Self::pump`].
    pub fn enqueue(
        &mut self,
        seq: u32,
        payload: &[u8],
        rto_ms: u64,
        ack_requested: bool,
    ) -> Result<(), QueueError> {
        if seq == 0 || seq >= self.tx_seq {
            return Err(QueueError::SeqUnassigned(seq));
        }
        let slot = self
            .slots
            .iter_mut()
            .find(|s| !s.used)
            .ok_or(QueueError::QueueFull)?;

        slot.used = true;
        slot.seq = seq;
        slot.payload = Bytes::copy_from_slice(payload);
        slot.last_send_ms = None;
        slot.retries = 0;
        slot.rto_ms = rto_ms;
        slot.ack_requested = ack_requested;
        trace!(seq, len = payload.len(), ack_requested, "slot enqueued");
        Ok(())
    }

    /// Fold in a cumulative ACK from the peer and free covered slots.
    /// Returns the (monotone) cumulative value for durable-queue trimming.
    pub fn on_ack(&mut self, peer_ack_val: u32) -> u32 {
        if peer_ack_val > self.peer_acked {
            self.peer_acked = peer_ack_val;
        }
        for slot in &mut self.slots {
            if slot.used && slot.seq <= self.peer_acked {
                trace!(seq = slot.seq, "slot acked");
                slot.used = false;
            }
        }
        self.peer_acked
    }

    /// Track an inbound frame's seq against the in-order watermark and
    /// schedule an ACK when the peer asked for one.
    pub fn on_receive(&mut self, seq: u32, flags: Flags) -> RecvDisposition {
        if flags.contains(Flags::ACK_REQUESTED) {
            self.ack_due = true;
        }

        if seq == self.peer_last_inorder + 1 {
            self.peer_last_inorder = seq;
            RecvDisposition::InOrder
        } else if seq <= self.peer_last_inorder {
            RecvDisposition::Duplicate
        } else {
            RecvDisposition::OutOfOrder
        }
    }

    /// Take the deferred-ACK flag. ACK generation coalesces: at most one
    /// ACK-only frame per peer per pump, reflecting the latest watermark.
    pub fn take_ack_due(&mut self) -> bool {
        std::mem::take(&mut self.ack_due)
    }

    /// Collect every payload due for (re)transmission at `now_ms`.
    ///
    /// A slot already covered by `peer_acked` is freed. A slot past
    /// [`MAX_RETRIES`] retransmissions is abandoned. A best-effort slot
    /// (no ACK requested) is freed after its single transmission.
    pub fn pump(&mut self, now_ms: u64) -> Vec<Bytes> {
        let mut due = Vec::new();
        for slot in &mut self.slots {
            if !slot.used {
                continue;
            }
            if slot.seq <= self.peer_acked {
                slot.used = false;
                continue;
            }
            if let Some(last) = slot.last_send_ms {
                if now_ms.saturating_sub(last) < slot.rto_ms {
                    continue;
                }
            }
            if slot.retries > MAX_RETRIES {
                debug!(seq = slot.seq, "slot abandoned after retry limit");
                slot.used = false;
                continue;
            }
            due.push(slot.payload.clone());
            slot.last_send_ms = Some(now_ms);
            slot.retries += 1;
            if !slot.ack_requested {
                slot.used = false;
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_SLOTS, SERIAL_RTO_MS};

    fn edge() -> EdgeState {
        EdgeState::new(DEFAULT_SLOTS)
    }

    fn enqueue_next(edge: &mut EdgeState, payload: &[u8], ack: bool) -> u32 {
        let seq = edge.next_seq();
        edge.enqueue(seq, payload, SERIAL_RTO_MS, ack).unwrap();
        seq
    }

    #[test]
    fn test_seq_assignment_monotonic() {
        let mut e = edge();
        assert_eq!(e.next_seq(), 1);
        assert_eq!(e.next_seq(), 2);
        assert_eq!(e.tx_seq(), 3);

        let restored = EdgeState::with_tx_seq(DEFAULT_SLOTS, 106);
        assert_eq!(restored.tx_seq(), 106);
    }

    #[test]
    fn test_enqueue_rejects_unassigned_seq() {
        let mut e = edge();
        assert_eq!(
            e.enqueue(1, b"x", SERIAL_RTO_MS, true),
            Err(QueueError::SeqUnassigned(1))
        );
        assert_eq!(
            e.enqueue(0, b"x", SERIAL_RTO_MS, true),
            Err(QueueError::SeqUnassigned(0))
        );
    }

    #[test]
    fn test_queue_full() {
        let mut e = edge();
        for _ in 0..DEFAULT_SLOTS {
            enqueue_next(&mut e, b"frame", true);
        }
        let seq = e.next_seq();
        assert_eq!(
            e.enqueue(seq, b"frame", SERIAL_RTO_MS, true),
            Err(QueueError::QueueFull)
        );
    }

    #[test]
    fn test_cumulative_ack_is_max_and_frees() {
        let mut e = edge();
        for _ in 0..4 {
            enqueue_next(&mut e, b"frame", true);
        }
        assert_eq!(e.in_flight(), 4);

        assert_eq!(e.on_ack(2), 2);
        assert_eq!(e.in_flight(), 2);

        // Stale ACK does not regress
        assert_eq!(e.on_ack(1), 2);
        assert_eq!(e.peer_acked(), 2);

        assert_eq!(e.on_ack(4), 4);
        assert_eq!(e.in_flight(), 0);
    }

    #[test]
    fn test_receive_watermark_and_duplicates() {
        let mut e = edge();
        assert_eq!(e.on_receive(1, Flags::empty()), RecvDisposition::InOrder);
        assert_eq!(e.on_receive(2, Flags::empty()), RecvDisposition::InOrder);
        assert_eq!(e.peer_last_inorder(), 2);

        // Redelivery does not perturb state
        assert_eq!(e.on_receive(2, Flags::empty()), RecvDisposition::Duplicate);
        assert_eq!(e.on_receive(1, Flags::empty()), RecvDisposition::Duplicate);
        assert_eq!(e.peer_last_inorder(), 2);

        // Gap: accepted but watermark held
        assert_eq!(e.on_receive(5, Flags::empty()), RecvDisposition::OutOfOrder);
        assert_eq!(e.peer_last_inorder(), 2);

        // The gap closes only in order
        assert_eq!(e.on_receive(3, Flags::empty()), RecvDisposition::InOrder);
        assert_eq!(e.peer_last_inorder(), 3);
    }

    #[test]
    fn test_ack_due_coalesces() {
        let mut e = edge();
        e.on_receive(1, Flags::ACK_REQUESTED);
        e.on_receive(2, Flags::ACK_REQUESTED);
        assert!(e.take_ack_due());
        assert!(!e.take_ack_due());
        e.on_receive(3, Flags::empty());
        assert!(!e.take_ack_due());
    }

    #[test]
    fn test_pump_sends_then_respects_rto() {
        let mut e = edge();
        enqueue_next(&mut e, b"reliable", true);

        // Initial transmission is immediate
        assert_eq!(e.pump(1000).len(), 1);
        // Within the RTO nothing is due
        assert!(e.pump(1000 + SERIAL_RTO_MS - 1).is_empty());
        // At the RTO the slot retransmits
        assert_eq!(e.pump(1000 + SERIAL_RTO_MS).len(), 1);
    }

    #[test]
    fn test_retransmit_bound_exact() {
        let mut e = edge();
        enqueue_next(&mut e, b"doomed", true);

        let mut sends = 0;
        let mut now = 0;
        // Peer never ACKs: drive well past the limit.
        for _ in 0..20 {
            now += SERIAL_RTO_MS;
            sends += e.pump(now).len();
        }
        assert_eq!(sends, usize::from(MAX_RETRIES) + 1);
        assert_eq!(e.in_flight(), 0);
    }

    #[test]
    fn test_best_effort_sent_once() {
        let mut e = edge();
        enqueue_next(&mut e, b"telemetry", false);

        assert_eq!(e.pump(10).len(), 1);
        assert_eq!(e.in_flight(), 0);
        assert!(e.pump(10 + 10 * SERIAL_RTO_MS).is_empty());
    }

    #[test]
    fn test_ack_stops_retransmit_and_notifies() {
        let mut e = edge();
        let seq = enqueue_next(&mut e, b"frame", true);
        assert_eq!(e.pump(100).len(), 1);

        let cum = e.on_ack(seq);
        assert_eq!(cum, seq);
        assert!(e.pump(100 + SERIAL_RTO_MS).is_empty());
        assert_eq!(e.in_flight(), 0);
    }

    #[test]
    fn test_retransmission_keeps_payload_and_seq() {
        let mut e = edge();
        let seq = enqueue_next(&mut e, b"payload-bytes", true);
        let first = e.pump(100);
        let second = e.pump(100 + SERIAL_RTO_MS);
        assert_eq!(first, second);
        assert_eq!(seq, 1);
    }
}
