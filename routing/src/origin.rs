//! The Side-A origin: telemetry generation, durable replay, command
//! dispatch.

use crate::cmd_id;
use crate::traits::CommandEffector;
use bytes::{BufMut, Bytes, BytesMut};
use mdp_durable::{DurableRing, Kv};
use mdp_envelope::{EnvelopeFields, Geo, KeyStore, Proto, Reading};
use mdp_reliability::{EdgeState, RecvDisposition, ROUTER_SLOTS, SERIAL_RTO_MS};
use mdp_wire::{endpoint, status, CommandBody, EventBody, Flags, Header, MsgType};
use tracing::{debug, info, warn};

const TELEM_PERIOD_MIN_MS: u64 = 100;
const TELEM_PERIOD_MAX_MS: u64 = 60_000;

/// Origin role state machine.
///
/// One edge toward the router over the wired link. Telemetry goes through
/// the durable ring before its first transmission; the edge's sequence
/// space continues across reboots from the ring's persisted counter.
pub struct OriginCore<K: Kv> {
    edge: EdgeState,
    ring: DurableRing<K>,
    rto_ms: u64,
    device_id: String,
    device_role: String,
    proto: Proto,
    telemetry_period_ms: u64,
    last_telemetry_ms: Option<u64>,
}

impl<K: Kv> OriginCore<K> {
    /// Build the origin around an opened durable ring.
    ///
    /// The edge gets as many slots as the ring has capacity so a full boot
    /// replay always fits.
    pub fn new(
        ring: DurableRing<K>,
        device_id: String,
        device_role: String,
        telemetry_period_ms: u64,
    ) -> Self {
        let slots = usize::from(ring.capacity()).max(ROUTER_SLOTS);
        let edge = EdgeState::with_tx_seq(slots, ring.tx_seq());
        Self {
            edge,
            ring,
            rto_ms: SERIAL_RTO_MS,
            device_id,
            device_role,
            proto: Proto::LoRaWan,
            telemetry_period_ms,
            last_telemetry_ms: None,
        }
    }

    /// Edge bookkeeping toward the router
    pub fn edge(&self) -> &EdgeState {
        &self.edge
    }

    /// The durable ring
    pub fn ring(&self) -> &DurableRing<K> {
        &self.ring
    }

    /// Give back the durable ring, e.g. across a simulated reboot
    pub fn into_ring(self) -> DurableRing<K> {
        self.ring
    }

    /// Current telemetry period
    pub fn telemetry_period_ms(&self) -> u64 {
        self.telemetry_period_ms
    }

    /// Re-enqueue every durable slot into the live edge, oldest first.
    /// Stored payloads already carry their original headers; no seq is
    /// reassigned. Must run before the first new telemetry.
    pub fn replay_on_boot(&mut self) {
        let slots = match self.ring.replay() {
            Ok(slots) => slots,
            Err(e) => {
                warn!(error = %e, "durable replay failed");
                return;
            }
        };
        for (seq, payload) in slots {
            info!(seq, "replaying unacked telemetry");
            if let Err(e) = self.edge.enqueue(seq, &payload, self.rto_ms, true) {
                warn!(seq, error = %e, "replay enqueue failed");
            }
        }
    }

    /// Queue a boot HELLO (best-effort, sent once by the next pump)
    pub fn hello(&mut self) {
        let seq = self.edge.next_seq();
        self.ring.note_assigned(seq);
        let hdr = Header::new(MsgType::Hello, seq, endpoint::ORIGIN, endpoint::ROUTER);
        let payload = hdr.to_bytes();
        if let Err(e) = self.edge.enqueue(seq, &payload, self.rto_ms, false) {
            warn!(error = %e, "hello dropped");
        }
    }

    /// Whether the telemetry period has elapsed
    pub fn telemetry_due(&self, now_ms: u64) -> bool {
        match self.last_telemetry_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.telemetry_period_ms,
        }
    }

    /// Build, durably store, and queue one telemetry envelope.
    ///
    /// Returns the assigned seq. With a full transmit queue the envelope
    /// still lands in the durable ring and is re-sent after the next
    /// reboot (best-effort-reliable telemetry).
    pub fn generate_telemetry(
        &mut self,
        readings: Vec<Reading>,
        geo: Option<Geo>,
        msg_id: [u8; 16],
        ts_ms: i64,
        now_ms: u64,
        key: Option<&dyn KeyStore>,
    ) -> Result<u32, mdp_envelope::EnvelopeError> {
        self.last_telemetry_ms = Some(now_ms);

        let seq = self.edge.next_seq();
        self.ring.note_assigned(seq);

        let fields = EnvelopeFields {
            device_id: self.device_id.clone(),
            device_role: self.device_role.clone(),
            proto: self.proto,
            msg_id,
            ts_ms,
            seq,
            mono_ms: now_ms,
            geo,
            readings,
            meta: None,
        };
        let body = mdp_envelope::build_signed(&fields, key)?;

        let hdr = Header {
            msg_type: MsgType::Telemetry,
            seq,
            ack: self.edge.peer_last_inorder(),
            flags: Flags::ACK_REQUESTED,
            src: endpoint::ORIGIN,
            dst: endpoint::ROUTER,
        };
        let mut payload = BytesMut::with_capacity(mdp_wire::HEADER_SIZE + body.len());
        hdr.encode(&mut payload);
        payload.put_slice(&body);

        // Durable first: the write is flushed before the first transmission
        // is even queued.
        self.ring.enqueue(seq, &payload);
        if let Err(e) = self.edge.enqueue(seq, &payload, self.rto_ms, true) {
            warn!(seq, error = %e, "transmit queue full, durable copy only");
        }
        debug!(seq, "telemetry queued");
        Ok(seq)
    }

    /// Process one decoded payload from the router link.
    pub fn on_frame(&mut self, payload: &[u8], effector: &mut dyn CommandEffector) {
        let hdr = match Header::decode(payload) {
            Ok(hdr) => hdr,
            Err(e) => {
                debug!(error = %e, "frame dropped");
                return;
            }
        };

        let cum = self.edge.on_ack(hdr.ack);
        self.ring.ack(cum);
        let disposition = self.edge.on_receive(hdr.seq, hdr.flags);

        if disposition == RecvDisposition::Duplicate {
            return;
        }

        if hdr.msg_type == MsgType::Command
            && (hdr.dst == endpoint::ORIGIN || hdr.dst == endpoint::BROADCAST)
        {
            self.handle_command(&hdr, &payload[mdp_wire::HEADER_SIZE..], effector);
        }
    }

    fn handle_command(&mut self, hdr: &Header, body: &[u8], effector: &mut dyn CommandEffector) {
        let cmd = match CommandBody::decode(body) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(error = %e, "undecodable command body");
                return;
            }
        };

        let status = match cmd.cmd_id {
            cmd_id::SET_TELEM_MS => self.set_telemetry_period(&cmd.data),
            _ => effector.dispatch(cmd.cmd_id, &cmd.data),
        };
        info!(cmd_id = cmd.cmd_id, status, "command dispatched");

        self.queue_event(EventBody::cmd_result(cmd.cmd_id, status), hdr.src);
    }

    fn set_telemetry_period(&mut self, data: &[u8]) -> i16 {
        let Some(raw) = data.get(..4) else {
            return status::BAD_LENGTH;
        };
        let ms = u64::from(u32::from_le_bytes(raw.try_into().expect("4 bytes")));
        self.telemetry_period_ms = ms.clamp(TELEM_PERIOD_MIN_MS, TELEM_PERIOD_MAX_MS);
        info!(period_ms = self.telemetry_period_ms, "telemetry period set");
        status::OK
    }

    fn queue_event(&mut self, event: EventBody, dst: u8) {
        let seq = self.edge.next_seq();
        self.ring.note_assigned(seq);
        let hdr = Header {
            msg_type: MsgType::Event,
            seq,
            ack: self.edge.peer_last_inorder(),
            flags: Flags::ACK_REQUESTED,
            src: endpoint::ORIGIN,
            dst,
        };
        let body = event.encode();
        let mut payload = BytesMut::with_capacity(mdp_wire::HEADER_SIZE + body.len());
        hdr.encode(&mut payload);
        payload.put_slice(&body);

        if let Err(e) = self.edge.enqueue(seq, &payload, self.rto_ms, true) {
            // Events fail fast; there is no durable fallback for them.
            warn!(seq, error = %e, "event dropped, queue full");
        }
    }

    /// Emit everything due at `now_ms`, ACK-only frames first.
    pub fn pump(&mut self, now_ms: u64) -> Vec<Bytes> {
        if self.edge.take_ack_due() {
            let seq = self.edge.next_seq();
            self.ring.note_assigned(seq);
            let hdr = Header {
                msg_type: MsgType::Ack,
                seq,
                ack: self.edge.peer_last_inorder(),
                // Request an ack back so both sequence spaces stay tight
                flags: Flags::IS_ACK | Flags::ACK_REQUESTED,
                src: endpoint::ORIGIN,
                dst: endpoint::ROUTER,
            };
            let ack = hdr.to_bytes();
            if let Err(e) = self.edge.enqueue(seq, &ack, self.rto_ms, true) {
                warn!(error = %e, "ack frame dropped");
            }
        }
        self.edge.pump(now_ms)
    }
}
