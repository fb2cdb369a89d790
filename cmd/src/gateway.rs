//! Gateway role shell: radio link in, line-delimited JSON on stdio.

use crate::origin::transmit;
use anyhow::Result;
use mdp_link::Link;
use mdp_routing::{GatewayCore, HostCommand};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Run the gateway loop until ctrl-c.
pub async fn run(tick: Duration, mut radio: Box<dyn Link>) -> Result<()> {
    let mut core = GatewayCore::new();
    let started = Instant::now();
    let mut interval = tokio::time::interval(tick);

    // Host lines arrive on stdin; a reader task feeds them to the loop.
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("gateway running");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
            _ = interval.tick() => {}
        }
        let now_ms = started.elapsed().as_millis() as u64;

        while let Some(payload) = radio.poll() {
            if let Some(record) = core.on_frame(&payload, now_ms) {
                println!("{}", serde_json::to_string(&record)?);
            }
        }

        while let Ok(line) = line_rx.try_recv() {
            handle_host_line(&mut core, line.trim());
        }

        for payload in core.pump(now_ms) {
            transmit(radio.as_mut(), &payload);
        }
    }
    Ok(())
}

fn handle_host_line(core: &mut GatewayCore, line: &str) {
    if line.is_empty() {
        return;
    }
    let cmd: HostCommand = match serde_json::from_str(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!(error = %e, "bad host line");
            println!("{}", json!({"error": "json_parse"}));
            return;
        }
    };
    match core.host_command(&cmd) {
        Ok(seq) => println!("{}", json!({"sent": true, "seq": seq})),
        Err(e) => {
            warn!(error = %e, "host command rejected");
            println!("{}", json!({"error": e.to_string()}));
        }
    }
}
