//! Origin role shell: sensor → envelope → durable ring → wired link.

use crate::collaborators::{load_identity, load_signing_key, SimEffector, SimSensor};
use crate::config::NodeConfig;
use anyhow::Result;
use mdp_durable::{DurableRing, FileKv, RING_CAPACITY};
use mdp_envelope::KeyStore;
use mdp_link::{Link, LinkError};
use mdp_routing::{Identity, OriginCore, SensorSource};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Run the origin loop until ctrl-c or a REBOOT command.
pub async fn run(
    config: &NodeConfig,
    storage_dir: &Path,
    tick: Duration,
    mut link: Box<dyn Link>,
) -> Result<()> {
    let ns = storage_dir.join("origin");
    let mut kv = FileKv::open(&ns)?;
    let identity = load_identity(
        &mut kv,
        &config.device_id,
        &config.device_role,
        &config.display_name,
    )?;
    info!(
        device_id = %identity.device_id(),
        device_role = %identity.device_role(),
        display_name = %identity.display_name(),
        "identity loaded"
    );

    let ring = DurableRing::open(FileKv::open(&ns)?, RING_CAPACITY)?;
    let key = load_signing_key(config.signing_key_file.as_deref())?;

    let mut core = OriginCore::new(
        ring,
        identity.device_id(),
        identity.device_role(),
        config.telemetry_period_ms,
    );
    core.replay_on_boot();
    core.hello();

    let mut sensor = SimSensor::new();
    let mut effector = SimEffector::new();
    let started = Instant::now();
    let mut interval = tokio::time::interval(tick);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("origin running");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
            _ = interval.tick() => {}
        }
        let now_ms = started.elapsed().as_millis() as u64;

        while let Some(payload) = link.poll() {
            core.on_frame(&payload, &mut effector);
        }

        if core.telemetry_due(now_ms) {
            if let Some(readings) = sensor.read_sample() {
                let msg_id: [u8; 16] = rand::random();
                let ts_ms = chrono::Utc::now().timestamp_millis();
                let geo = sensor.geo();
                if let Err(e) = core.generate_telemetry(
                    readings,
                    geo,
                    msg_id,
                    ts_ms,
                    now_ms,
                    key.as_ref().map(|k| k as &dyn KeyStore),
                ) {
                    warn!(error = %e, "envelope build failed");
                }
            }
        }

        for payload in core.pump(now_ms) {
            transmit(link.as_mut(), &payload);
        }

        if effector.reboot_requested() {
            info!("reboot command accepted; durable queue replays on restart");
            break;
        }
    }
    Ok(())
}

pub(crate) fn transmit(link: &mut dyn Link, payload: &[u8]) {
    let frame = match mdp_wire::encode(payload) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "frame encode failed");
            return;
        }
    };
    match link.send(&frame) {
        Ok(()) => {}
        Err(LinkError::Backpressure) => {
            debug!("link backpressure, frame deferred to next pump");
        }
        Err(LinkError::Transport(e)) => {
            warn!(error = %e, "transport send failed");
        }
    }
}
