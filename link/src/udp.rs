//! UDP datagram link.
//!
//! One datagram carries exactly one encoded frame. The long-range radio
//! hop behaves the same way (whole packets with the delimiter appended),
//! so this link doubles as its development stand-in.

use crate::{Link, LinkCounters, LinkError};
use bytes::Bytes;
use mdp_wire::MAX_FRAME;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

const TX_QUEUE: usize = 32;
const RX_QUEUE: usize = 64;

/// Datagram frame link.
pub struct UdpLink {
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
    counters: LinkCounters,
}

impl UdpLink {
    /// Bind `local` and exchange frames with `peer`. Must be called from
    /// within a tokio runtime.
    pub async fn bind(local: SocketAddr, peer: SocketAddr) -> Result<Self, LinkError> {
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| LinkError::Transport(format!("bind {local}: {e}")))?;
        socket
            .connect(peer)
            .await
            .map_err(|e| LinkError::Transport(format!("connect {peer}: {e}")))?;
        info!(%local, %peer, "udp link open");

        let socket = Arc::new(socket);
        let (tx, tx_queue) = mpsc::channel::<Bytes>(TX_QUEUE);
        let (rx_feed, rx) = mpsc::channel::<Bytes>(RX_QUEUE);
        let counters = LinkCounters::new();

        tokio::spawn(rx_worker(socket.clone(), rx_feed, counters.clone()));
        tokio::spawn(tx_worker(socket, tx_queue, counters.clone()));

        Ok(Self { tx, rx, counters })
    }
}

async fn rx_worker(socket: Arc<UdpSocket>, feed: mpsc::Sender<Bytes>, counters: LinkCounters) {
    let mut buf = vec![0u8; MAX_FRAME + 1];
    loop {
        match socket.recv(&mut buf).await {
            Err(e) => {
                warn!(error = %e, "udp receive failed");
                return;
            }
            Ok(n) => match mdp_wire::decode(&buf[..n]) {
                Ok(payload) => {
                    counters.inc_rx();
                    if feed.send(Bytes::from(payload)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    trace!(error = %e, len = n, "datagram dropped");
                    counters.inc_dropped();
                }
            },
        }
    }
}

async fn tx_worker(socket: Arc<UdpSocket>, mut queue: mpsc::Receiver<Bytes>, counters: LinkCounters) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = socket.send(&frame).await {
            warn!(error = %e, "udp send failed");
            continue;
        }
        counters.inc_tx();
    }
}

impl Link for UdpLink {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.tx
            .try_send(Bytes::copy_from_slice(frame))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => LinkError::Backpressure,
                mpsc::error::TrySendError::Closed(_) => {
                    LinkError::Transport("udp tx worker gone".to_string())
                }
            })
    }

    fn poll(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    fn counters(&self) -> LinkCounters {
        self.counters.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_pair_roundtrip() {
        let a_addr: SocketAddr = "127.0.0.1:17761".parse().unwrap();
        let b_addr: SocketAddr = "127.0.0.1:17762".parse().unwrap();

        let mut a = UdpLink::bind(a_addr, b_addr).await.unwrap();
        let mut b = UdpLink::bind(b_addr, a_addr).await.unwrap();

        let frame = mdp_wire::encode(b"over the wire").unwrap();
        a.send(&frame).unwrap();

        let mut got = None;
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if let Some(p) = b.poll() {
                got = Some(p);
                break;
            }
        }
        assert_eq!(got.unwrap(), Bytes::from_static(b"over the wire"));
        assert_eq!(a.counters().snapshot().tx_frames, 1);
        assert_eq!(b.counters().snapshot().rx_frames, 1);
    }

    #[tokio::test]
    async fn test_udp_drops_corrupt_datagram() {
        let a_addr: SocketAddr = "127.0.0.1:17763".parse().unwrap();
        let b_addr: SocketAddr = "127.0.0.1:17764".parse().unwrap();

        let mut a = UdpLink::bind(a_addr, b_addr).await.unwrap();
        let mut b = UdpLink::bind(b_addr, a_addr).await.unwrap();

        let mut bad = mdp_wire::encode(b"payload").unwrap().to_vec();
        bad[0] ^= 0x10;
        a.send(&bad).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(b.poll().is_none());
        assert_eq!(b.counters().snapshot().rx_dropped, 1);
    }
}
