//! Router role shell: wired link ↔ radio link.

use crate::origin::transmit;
use anyhow::Result;
use mdp_link::Link;
use mdp_routing::{RouterCore, RouterLink};
use std::time::{Duration, Instant};
use tracing::info;

/// Run the router loop until ctrl-c.
pub async fn run(
    tick: Duration,
    mut wired: Box<dyn Link>,
    mut radio: Box<dyn Link>,
) -> Result<()> {
    let mut core = RouterCore::new();
    let started = Instant::now();
    let mut interval = tokio::time::interval(tick);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("router running");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
            _ = interval.tick() => {}
        }
        let now_ms = started.elapsed().as_millis() as u64;

        while let Some(payload) = wired.poll() {
            core.on_frame(RouterLink::A, &payload);
        }
        while let Some(payload) = radio.poll() {
            core.on_frame(RouterLink::Gateway, &payload);
        }

        for out in core.pump(now_ms) {
            match out.link {
                RouterLink::A => transmit(wired.as_mut(), &out.payload),
                RouterLink::Gateway => transmit(radio.as_mut(), &out.payload),
            }
        }
    }

    let wired_stats = wired.counters().snapshot();
    let radio_stats = radio.counters().snapshot();
    info!(
        wired_rx = wired_stats.rx_frames,
        wired_dropped = wired_stats.rx_dropped,
        radio_rx = radio_stats.rx_frames,
        radio_dropped = radio_stats.rx_dropped,
        "final link counters"
    );
    Ok(())
}
