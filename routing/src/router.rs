//! The Side-B router: two link edges, one forward rule table.

use bytes::{BufMut, Bytes, BytesMut};
use mdp_reliability::{EdgeState, RecvDisposition, RADIO_RTO_MS, ROUTER_SLOTS, SERIAL_RTO_MS};
use mdp_wire::{endpoint, Flags, Header, MsgType};
use tracing::{debug, trace, warn};

/// Which physical side of the router a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterLink {
    /// The wired serial link toward the origin
    A,
    /// The radio link toward the gateway
    Gateway,
}

impl RouterLink {
    fn other(self) -> Self {
        match self {
            RouterLink::A => RouterLink::Gateway,
            RouterLink::Gateway => RouterLink::A,
        }
    }
}

/// A payload the shell must encode and transmit on `link`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Target link
    pub link: RouterLink,
    /// Header ‖ body, ready for the frame codec
    pub payload: Bytes,
}

/// Router role state machine.
///
/// Holds one [`EdgeState`] per link; sequence numbers never cross edges.
/// All transmissions flow out of [`RouterCore::pump`].
pub struct RouterCore {
    a_edge: EdgeState,
    gw_edge: EdgeState,
    a_rto_ms: u64,
    gw_rto_ms: u64,
    a_peer_seen: bool,
    gw_peer_seen: bool,
}

impl Default for RouterCore {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterCore {
    /// Router with the stock wired/radio RTOs
    pub fn new() -> Self {
        Self::with_rtos(SERIAL_RTO_MS, RADIO_RTO_MS)
    }

    /// Router with explicit per-link RTOs
    pub fn with_rtos(a_rto_ms: u64, gw_rto_ms: u64) -> Self {
        Self {
            a_edge: EdgeState::new(ROUTER_SLOTS),
            gw_edge: EdgeState::new(ROUTER_SLOTS),
            a_rto_ms,
            gw_rto_ms,
            a_peer_seen: false,
            gw_peer_seen: false,
        }
    }

    /// Edge bookkeeping for the wired side
    pub fn a_edge(&self) -> &EdgeState {
        &self.a_edge
    }

    /// Edge bookkeeping for the radio side
    pub fn gw_edge(&self) -> &EdgeState {
        &self.gw_edge
    }

    /// Whether a HELLO has arrived on the given link
    pub fn peer_seen(&self, link: RouterLink) -> bool {
        match link {
            RouterLink::A => self.a_peer_seen,
            RouterLink::Gateway => self.gw_peer_seen,
        }
    }

    fn edge_mut(&mut self, link: RouterLink) -> &mut EdgeState {
        match link {
            RouterLink::A => &mut self.a_edge,
            RouterLink::Gateway => &mut self.gw_edge,
        }
    }

    fn rto(&self, link: RouterLink) -> u64 {
        match link {
            RouterLink::A => self.a_rto_ms,
            RouterLink::Gateway => self.gw_rto_ms,
        }
    }

    /// Process one decoded payload received on `from`.
    ///
    /// Updates the inbound edge's bookkeeping, then applies the forward
    /// rule table. Forwarded frames keep their body bytes bit-identical;
    /// only the header is rewritten, and the output edge is always the
    /// other link. Transmissions happen at the next [`Self::pump`].
    pub fn on_frame(&mut self, from: RouterLink, payload: &[u8]) {
        let hdr = match Header::decode(payload) {
            Ok(hdr) => hdr,
            Err(e) => {
                trace!(?from, error = %e, "frame dropped");
                return;
            }
        };

        let edge = self.edge_mut(from);
        edge.on_ack(hdr.ack);
        let disposition = edge.on_receive(hdr.seq, hdr.flags);

        if disposition == RecvDisposition::Duplicate {
            trace!(?from, seq = hdr.seq, "duplicate, ack only");
            return;
        }

        match hdr.msg_type {
            MsgType::Ack => {} // bookkeeping already folded in
            MsgType::Hello => {
                debug!(?from, src = hdr.src, "peer hello");
                match from {
                    RouterLink::A => self.a_peer_seen = true,
                    RouterLink::Gateway => self.gw_peer_seen = true,
                }
            }
            t if from == RouterLink::A && (t.is_telemetry_like() || t == MsgType::Event) => {
                self.forward(from, t, payload, endpoint::GATEWAY);
            }
            MsgType::Command if from == RouterLink::Gateway => {
                self.forward(from, MsgType::Command, payload, endpoint::ORIGIN);
            }
            t => {
                trace!(?from, msg_type = ?t, "no forward rule, consumed");
            }
        }
    }

    /// Rewrite the header and enqueue on the opposite edge, reliable.
    fn forward(&mut self, from: RouterLink, msg_type: MsgType, payload: &[u8], dst: u8) {
        let out_link = from.other();
        let rto = self.rto(out_link);
        let body = &payload[mdp_wire::HEADER_SIZE..];

        let edge = self.edge_mut(out_link);
        let seq = edge.next_seq();
        let hdr = Header {
            msg_type,
            seq,
            ack: edge.peer_last_inorder(),
            flags: Flags::ACK_REQUESTED,
            src: endpoint::ROUTER,
            dst,
        };

        let mut out = BytesMut::with_capacity(mdp_wire::HEADER_SIZE + body.len());
        hdr.encode(&mut out);
        out.put_slice(body);

        if let Err(e) = edge.enqueue(seq, &out, rto, true) {
            warn!(?out_link, seq, error = %e, "forward dropped");
        }
    }

    /// Emit everything due at `now_ms`: coalesced ACK-only frames first,
    /// then initial transmissions and retransmissions, per edge.
    pub fn pump(&mut self, now_ms: u64) -> Vec<Outbound> {
        let mut out = Vec::new();
        for link in [RouterLink::A, RouterLink::Gateway] {
            let dst = match link {
                RouterLink::A => endpoint::ORIGIN,
                RouterLink::Gateway => endpoint::GATEWAY,
            };
            let rto = self.rto(link);
            let edge = self.edge_mut(link);

            if edge.take_ack_due() {
                let seq = edge.next_seq();
                let hdr = Header {
                    msg_type: MsgType::Ack,
                    seq,
                    ack: edge.peer_last_inorder(),
                    flags: Flags::IS_ACK,
                    src: endpoint::ROUTER,
                    dst,
                };
                let ack = hdr.to_bytes();
                if let Err(e) = edge.enqueue(seq, &ack, rto, true) {
                    // Peer keeps requesting; the next pump retries.
                    warn!(?link, error = %e, "ack frame dropped");
                }
            }

            for payload in edge.pump(now_ms) {
                out.push(Outbound { link, payload });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry_payload(seq: u32, body: &[u8]) -> BytesMut {
        let mut hdr = Header::new(MsgType::Telemetry, seq, endpoint::ORIGIN, endpoint::ROUTER);
        hdr.flags = Flags::ACK_REQUESTED;
        let mut buf = hdr.to_bytes();
        buf.put_slice(body);
        buf
    }

    fn command_payload(seq: u32, body: &[u8]) -> BytesMut {
        let mut hdr = Header::new(MsgType::Command, seq, endpoint::GATEWAY, endpoint::ORIGIN);
        hdr.flags = Flags::ACK_REQUESTED;
        let mut buf = hdr.to_bytes();
        buf.put_slice(body);
        buf
    }

    fn forwards_only(out: Vec<Outbound>, msg_type: MsgType) -> Vec<Outbound> {
        out.into_iter()
            .filter(|o| Header::decode(&o.payload).unwrap().msg_type == msg_type)
            .collect()
    }

    #[test]
    fn test_telemetry_rewrite_matches_rule_table() {
        let mut r = RouterCore::new();
        let body = b"envelope-bytes";
        r.on_frame(RouterLink::A, &telemetry_payload(1, body));

        let out = forwards_only(r.pump(0), MsgType::Telemetry);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, RouterLink::Gateway);

        let hdr = Header::decode(&out[0].payload).unwrap();
        assert_eq!(hdr.src, endpoint::ROUTER);
        assert_eq!(hdr.dst, endpoint::GATEWAY);
        assert_eq!(hdr.seq, 1);
        assert_eq!(hdr.ack, 0);
        assert_eq!(hdr.flags, Flags::ACK_REQUESTED);
    }

    #[test]
    fn test_forwarded_body_bit_identical() {
        let mut r = RouterCore::new();
        let body: Vec<u8> = (0..200).map(|i| (i * 7 % 251) as u8).collect();
        r.on_frame(RouterLink::A, &telemetry_payload(1, &body));

        let out = forwards_only(r.pump(0), MsgType::Telemetry);
        assert_eq!(&out[0].payload[mdp_wire::HEADER_SIZE..], &body[..]);
    }

    #[test]
    fn test_command_forwarded_down() {
        let mut r = RouterCore::new();
        r.on_frame(RouterLink::Gateway, &command_payload(42, &[4, 0, 2, 0, 5, 1]));

        let out = forwards_only(r.pump(0), MsgType::Command);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, RouterLink::A);

        let hdr = Header::decode(&out[0].payload).unwrap();
        assert_eq!(hdr.src, endpoint::ROUTER);
        assert_eq!(hdr.dst, endpoint::ORIGIN);
        assert_eq!(hdr.seq, 1); // fresh seq in the A-edge space
    }

    #[test]
    fn test_no_loopback_forward() {
        let mut r = RouterCore::new();
        // Telemetry arriving on the gateway link has no rule; commands
        // arriving on the A link have no rule either.
        let mut t = telemetry_payload(1, b"x");
        t[13] = endpoint::GATEWAY; // src
        r.on_frame(RouterLink::Gateway, &t);
        r.on_frame(RouterLink::A, &command_payload(1, &[1, 0, 0, 0]));

        for o in r.pump(0) {
            let hdr = Header::decode(&o.payload).unwrap();
            assert_eq!(hdr.msg_type, MsgType::Ack);
        }
    }

    #[test]
    fn test_duplicate_not_reforwarded_but_acked() {
        let mut r = RouterCore::new();
        let p = telemetry_payload(1, b"one");
        r.on_frame(RouterLink::A, &p);
        let first = forwards_only(r.pump(0), MsgType::Telemetry);
        assert_eq!(first.len(), 1);

        // Same seq again (the peer's ACK was lost)
        r.on_frame(RouterLink::A, &p);
        let again = r.pump(1);
        assert!(forwards_only(again.clone(), MsgType::Telemetry).is_empty());
        // but an ACK still goes back toward A
        assert!(again
            .iter()
            .any(|o| o.link == RouterLink::A
                && Header::decode(&o.payload).unwrap().msg_type == MsgType::Ack));
    }

    #[test]
    fn test_domain_types_ride_like_telemetry() {
        let mut r = RouterCore::new();
        let mut hdr = Header::new(MsgType::Domain(0x07), 1, endpoint::ORIGIN, endpoint::ROUTER);
        hdr.flags = Flags::ACK_REQUESTED;
        let mut p = hdr.to_bytes();
        p.put_slice(b"wifisense");
        r.on_frame(RouterLink::A, &p);

        let out = forwards_only(r.pump(0), MsgType::Domain(0x07));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, RouterLink::Gateway);
        assert_eq!(&out[0].payload[mdp_wire::HEADER_SIZE..], b"wifisense");
    }

    #[test]
    fn test_corrupt_header_ignored() {
        let mut r = RouterCore::new();
        let mut p = telemetry_payload(1, b"x");
        p[0] ^= 0xFF; // magic
        r.on_frame(RouterLink::A, &p);
        assert!(r.pump(0).is_empty());
        assert_eq!(r.a_edge().peer_last_inorder(), 0);
    }

    #[test]
    fn test_ack_from_gateway_frees_slot() {
        let mut r = RouterCore::with_rtos(120, 1800);
        r.on_frame(RouterLink::A, &telemetry_payload(1, b"t"));
        let out = forwards_only(r.pump(0), MsgType::Telemetry);
        let fwd_seq = Header::decode(&out[0].payload).unwrap().seq;
        assert_eq!(r.gw_edge().in_flight(), 1);

        let mut ack = Header::new(MsgType::Ack, 1, endpoint::GATEWAY, endpoint::ROUTER);
        ack.ack = fwd_seq;
        ack.flags = Flags::IS_ACK;
        r.on_frame(RouterLink::Gateway, &ack.to_bytes());
        assert_eq!(r.gw_edge().in_flight(), 0);

        // No retransmission after the RTO
        assert!(forwards_only(r.pump(5000), MsgType::Telemetry).is_empty());
    }

    #[test]
    fn test_dropped_forward_retransmits_on_radio_rto() {
        let mut r = RouterCore::new();
        r.on_frame(RouterLink::A, &telemetry_payload(1, b"t"));

        let first = forwards_only(r.pump(0), MsgType::Telemetry);
        assert_eq!(first.len(), 1);
        // Nothing before the radio RTO elapses
        assert!(forwards_only(r.pump(RADIO_RTO_MS - 1), MsgType::Telemetry).is_empty());
        // Retransmission carries the same seq and body
        let second = forwards_only(r.pump(RADIO_RTO_MS), MsgType::Telemetry);
        assert_eq!(first, second);
    }

    #[test]
    fn test_hello_consumed_for_discovery() {
        let mut r = RouterCore::new();
        assert!(!r.peer_seen(RouterLink::A));
        let hello = Header::new(MsgType::Hello, 1, endpoint::ORIGIN, endpoint::ROUTER).to_bytes();
        r.on_frame(RouterLink::A, &hello);
        assert!(r.peer_seen(RouterLink::A));
        // HELLO is not forwarded
        assert!(forwards_only(r.pump(0), MsgType::Hello).is_empty());
    }
}

