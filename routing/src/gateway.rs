//! The gateway: radio traffic in, host lines out.

use bytes::{BufMut, Bytes, BytesMut};
use mdp_reliability::{EdgeState, QueueError, RADIO_RTO_MS, ROUTER_SLOTS};
use mdp_wire::{endpoint, CommandBody, Flags, Header, MsgType};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One line of the host surface, emitted for every frame received from
/// the radio.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HostRecord {
    /// Gateway uptime when the frame arrived
    pub t_ms: u32,
    /// Sender endpoint
    pub src: u8,
    /// Recipient endpoint
    pub dst: u8,
    /// Sender seq
    pub seq: u32,
    /// Cumulative ack carried by the frame
    pub ack: u32,
    /// Raw message type byte
    #[serde(rename = "type")]
    pub msg_type: u8,
    /// Raw flag byte
    pub flags: u8,
}

/// A host request: turn this into a COMMAND frame.
#[derive(Debug, Clone, Deserialize)]
pub struct HostCommand {
    /// Command id
    pub cmd: u16,
    /// Target endpoint, the origin by default
    #[serde(default = "default_dst")]
    pub dst: u8,
    /// Argument bytes
    #[serde(default)]
    pub data: Vec<u8>,
}

fn default_dst() -> u8 {
    endpoint::ORIGIN
}

/// Gateway role state machine: one edge toward the router over the radio.
pub struct GatewayCore {
    edge: EdgeState,
    rto_ms: u64,
}

impl Default for GatewayCore {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayCore {
    /// Gateway with the stock radio RTO
    pub fn new() -> Self {
        Self::with_rto(RADIO_RTO_MS)
    }

    /// Gateway with an explicit RTO
    pub fn with_rto(rto_ms: u64) -> Self {
        Self {
            edge: EdgeState::new(ROUTER_SLOTS),
            rto_ms,
        }
    }

    /// Edge bookkeeping toward the router
    pub fn edge(&self) -> &EdgeState {
        &self.edge
    }

    /// Process one decoded payload from the radio. Every well-formed frame
    /// yields a host record; bookkeeping and ACK scheduling happen here.
    pub fn on_frame(&mut self, payload: &[u8], now_ms: u64) -> Option<HostRecord> {
        let hdr = match Header::decode(payload) {
            Ok(hdr) => hdr,
            Err(e) => {
                debug!(error = %e, "frame dropped");
                return None;
            }
        };

        self.edge.on_ack(hdr.ack);
        self.edge.on_receive(hdr.seq, hdr.flags);

        Some(HostRecord {
            t_ms: now_ms as u32,
            src: hdr.src,
            dst: hdr.dst,
            seq: hdr.seq,
            ack: hdr.ack,
            msg_type: hdr.msg_type.to_u8(),
            flags: hdr.flags.bits(),
        })
    }

    /// Turn a host request into a reliable COMMAND frame with a fresh seq
    /// in the gateway→router space. Returns the seq for the host reply.
    pub fn host_command(&mut self, cmd: &HostCommand) -> Result<u32, QueueError> {
        let seq = self.edge.next_seq();
        let hdr = Header {
            msg_type: MsgType::Command,
            seq,
            ack: self.edge.peer_last_inorder(),
            flags: Flags::ACK_REQUESTED,
            src: endpoint::GATEWAY,
            dst: cmd.dst,
        };
        let body = CommandBody {
            cmd_id: cmd.cmd,
            data: Bytes::copy_from_slice(&cmd.data),
        }
        .encode();

        let mut payload = BytesMut::with_capacity(mdp_wire::HEADER_SIZE + body.len());
        hdr.encode(&mut payload);
        payload.put_slice(&body);

        self.edge.enqueue(seq, &payload, self.rto_ms, true)?;
        debug!(seq, cmd_id = cmd.cmd, dst = cmd.dst, "host command queued");
        Ok(seq)
    }

    /// Emit everything due at `now_ms`, the coalesced ACK first.
    pub fn pump(&mut self, now_ms: u64) -> Vec<Bytes> {
        if self.edge.take_ack_due() {
            let seq = self.edge.next_seq();
            let hdr = Header {
                msg_type: MsgType::Ack,
                seq,
                ack: self.edge.peer_last_inorder(),
                flags: Flags::IS_ACK,
                src: endpoint::GATEWAY,
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
