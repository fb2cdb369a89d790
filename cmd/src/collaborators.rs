//! Simulated collaborators for desktop deployments.
//!
//! A firmware build binds the real ADC pipeline and effector hardware to
//! the same traits; these stand-ins keep the full protocol path exercised
//! without either.

use anyhow::{Context, Result};
use ed25519_dalek::SigningKey;
use mdp_durable::{FileKv, Kv};
use mdp_envelope::Reading;
use mdp_routing::{cmd_id, CommandEffector, Identity, SensorSource};
use mdp_wire::status;
use std::path::Path;
use tracing::{info, warn};

// Unit ids as the ingestors expect them
const UNIT_MILLIVOLT: u16 = 1;
const UNIT_CELSIUS_X10: u16 = 7;

/// Deterministic sensor that walks four ADC channels and a temperature
/// through slow ramps.
#[derive(Debug, Default)]
pub struct SimSensor {
    tick: u32,
}

impl SimSensor {
    /// New simulated sensor
    pub fn new() -> Self {
        Self::default()
    }
}

impl SensorSource for SimSensor {
    fn read_sample(&mut self) -> Option<Vec<Reading>> {
        self.tick = self.tick.wrapping_add(1);
        let base = (self.tick % 200) as i32;

        let mut readings: Vec<Reading> = (0..4)
            .map(|ch| Reading {
                sid: ch + 1,
                vi: 1200 + base * 3 + (ch as i32) * 40,
                vs: 1,
                unit: UNIT_MILLIVOLT,
                quality: 0,
            })
            .collect();
        readings.push(Reading {
            sid: 10,
            vi: 215 + (base / 20),
            vs: 1,
            unit: UNIT_CELSIUS_X10,
            quality: 0,
        });
        Some(readings)
    }
}

/// Effector with three MOSFET channels and a fake sensor bus.
#[derive(Debug, Default)]
pub struct SimEffector {
    mosfets: [bool; 3],
    reboot_requested: bool,
}

impl SimEffector {
    /// New simulated effector
    pub fn new() -> Self {
        Self::default()
    }

    /// MOSFET states, for tests and status logs
    pub fn mosfets(&self) -> [bool; 3] {
        self.mosfets
    }

    /// Whether a REBOOT command has been accepted
    pub fn reboot_requested(&self) -> bool {
        self.reboot_requested
    }
}

impl CommandEffector for SimEffector {
    fn dispatch(&mut self, cmd_id_raw: u16, payload: &[u8]) -> i16 {
        match cmd_id_raw {
            cmd_id::SET_I2C => {
                if payload.len() < 2 {
                    return status::BAD_LENGTH;
                }
                info!(sda = payload[0], scl = payload[1], "i2c pins set");
                status::OK
            }
            cmd_id::SCAN_I2C => {
                info!("i2c scan requested");
                status::OK
            }
            cmd_id::SET_MOS => {
                if payload.len() < 2 {
                    return status::BAD_LENGTH;
                }
                let idx = payload[0] as usize;
                if !(1..=3).contains(&idx) {
                    return status::BAD_ARG;
                }
                self.mosfets[idx - 1] = payload[1] != 0;
                info!(channel = idx, on = self.mosfets[idx - 1], "mosfet switched");
                status::OK
            }
            cmd_id::SAVE_NVS | cmd_id::LOAD_NVS => status::OK,
            cmd_id::REBOOT => {
                self.reboot_requested = true;
                status::OK
            }
            other => {
                warn!(cmd_id = other, "unknown command");
                status::UNKNOWN_CMD
            }
        }
    }
}

/// Identity backed by the node's kv namespace (`dev_role`, `dev_disp`).
#[derive(Debug, Clone)]
pub struct KvIdentity {
    device_id: String,
    device_role: String,
    display_name: String,
}

impl Identity for KvIdentity {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn device_role(&self) -> String {
        self.device_role.clone()
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }
}

/// Load the persisted identity, seeding missing keys from the config
/// defaults.
pub fn load_identity(
    kv: &mut FileKv,
    device_id: &str,
    default_role: &str,
    default_display: &str,
) -> Result<KvIdentity> {
    let device_role = match kv.get("dev_role")? {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => {
            let role = default_role.chars().take(31).collect::<String>();
            kv.put("dev_role", role.as_bytes())?;
            role
        }
    };
    let display_name = match kv.get("dev_disp")? {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => {
            let display = default_display.chars().take(63).collect::<String>();
            kv.put("dev_disp", display.as_bytes())?;
            display
        }
    };
    Ok(KvIdentity {
        device_id: device_id.to_string(),
        device_role,
        display_name,
    })
}

/// Read a 32-byte Ed25519 seed from disk, if provisioned.
pub fn load_signing_key(path: Option<&str>) -> Result<Option<SigningKey>> {
    let Some(path) = path else {
        info!("no signing key provisioned, using placeholder signatures");
        return Ok(None);
    };
    let bytes = std::fs::read(Path::new(path))
        .with_context(|| format!("reading signing key {path}"))?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("signing key {path} must be exactly 32 bytes"))?;
    info!(path, "signing key loaded");
    Ok(Some(SigningKey::from_bytes(&seed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effector_statuses() {
        let mut fx = SimEffector::new();
        assert_eq!(fx.dispatch(cmd_id::SET_MOS, &[2, 1]), status::OK);
        assert_eq!(fx.mosfets(), [false, true, false]);
        assert_eq!(fx.dispatch(cmd_id::SET_MOS, &[5, 1]), status::BAD_ARG);
        assert_eq!(fx.dispatch(cmd_id::SET_MOS, &[2]), status::BAD_LENGTH);
        assert_eq!(fx.dispatch(0x0042, &[]), status::UNKNOWN_CMD);
        assert_eq!(fx.dispatch(cmd_id::REBOOT, &[]), status::OK);
        assert!(fx.reboot_requested());
    }

    #[test]
    fn test_sensor_produces_readings() {
        let mut s = SimSensor::new();
        let readings = s.read_sample().unwrap();
        assert_eq!(readings.len(), 5);
        assert!(readings.iter().all(|r| r.quality == 0));
    }

    #[test]
    fn test_identity_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut kv = FileKv::open(dir.path().join("ns")).unwrap();

        let id = load_identity(&mut kv, "mb-A-01", "origin", "Greenhouse").unwrap();
        assert_eq!(id.device_id(), "mb-A-01");
        assert_eq!(id.device_role(), "origin");
        assert_eq!(id.display_name(), "Greenhouse");

        // A different default does not overwrite the stored value
        let again = load_identity(&mut kv, "mb-A-01", "other", "Other").unwrap();
        assert_eq!(again.device_role(), "origin");
    }
}
