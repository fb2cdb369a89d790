//! Wired serial (UART) link.
//!
//! The port is split into read/write halves, each driven by a worker task.
//! The receive worker assembles delimited frames from the byte stream; the
//! transmit worker drains a bounded queue so `send` never blocks the
//! protocol loop.

use crate::{FrameAccumulator, Link, LinkCounters, LinkError};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{info, warn};

const TX_QUEUE: usize = 32;
const RX_QUEUE: usize = 64;

/// UART frame link.
pub struct SerialLink {
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
    counters: LinkCounters,
}

impl SerialLink {
    /// Open `path` at `baud` and start the worker tasks. Must be called
    /// from within a tokio runtime.
    pub fn open(path: &str, baud: u32) -> Result<Self, LinkError> {
        let port = tokio_serial::new(path, baud)
            .open_native_async()
            .map_err(|e| LinkError::Transport(format!("open {path}: {e}")))?;
        info!(path, baud, "serial link open");

        let (rd, wr) = tokio::io::split(port);
        let (tx, tx_queue) = mpsc::channel::<Bytes>(TX_QUEUE);
        let (rx_feed, rx) = mpsc::channel::<Bytes>(RX_QUEUE);
        let counters = LinkCounters::new();

        tokio::spawn(rx_worker(rd, rx_feed, counters.clone()));
        tokio::spawn(tx_worker(wr, tx_queue, counters.clone()));

        Ok(Self { tx, rx, counters })
    }
}

async fn rx_worker(
    mut rd: ReadHalf<SerialStream>,
    feed: mpsc::Sender<Bytes>,
    counters: LinkCounters,
) {
    let mut acc = FrameAccumulator::new(counters.clone());
    let mut buf = vec![0u8; 4096];
    loop {
        match rd.read(&mut buf).await {
            Ok(0) | Err(_) => {
                warn!("serial receive side closed");
                return;
            }
            Ok(n) => {
                for payload in acc.feed(&buf[..n]) {
                    if feed.send(payload).await.is_err() {
                        return; // link handle dropped
                    }
                }
            }
        }
    }
}

async fn tx_worker(
    mut wr: WriteHalf<SerialStream>,
    mut queue: mpsc::Receiver<Bytes>,
    counters: LinkCounters,
) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = wr.write_all(&frame).await {
            warn!(error = %e, "serial write failed");
            return;
        }
        counters.inc_tx();
    }
}

impl Link for SerialLink {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.tx
            .try_send(Bytes::copy_from_slice(frame))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => LinkError::Backpressure,
                mpsc::error::TrySendError::Closed(_) => {
                    LinkError::Transport("serial tx worker gone".to_string())
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
