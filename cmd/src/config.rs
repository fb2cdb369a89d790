//! Configuration handling for the node binary.
//!
//! Reads the shared YAML config file, then applies environment-variable
//! overrides, so a fleet can ship one file and adjust per device.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Stable device identifier
    pub device_id: String,
    /// Role string persisted alongside the durable queue
    pub device_role: String,
    /// Human-readable name
    pub display_name: String,
    /// Telemetry period in milliseconds (origin only)
    pub telemetry_period_ms: u64,
    /// Path to a 32-byte Ed25519 seed; absent means placeholder signatures
    pub signing_key_file: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: "mb-A-01".to_string(),
            device_role: "origin".to_string(),
            display_name: "MycoBrain".to_string(),
            telemetry_period_ms: 1000,
            signing_key_file: None,
        }
    }
}

/// Root configuration structure (matches the YAML layout)
#[derive(Debug, Deserialize)]
struct RootConfig {
    node: Option<NodeSection>,
}

#[derive(Debug, Deserialize)]
struct NodeSection {
    device_id: Option<String>,
    device_role: Option<String>,
    display_name: Option<String>,
    telemetry_period_ms: Option<u64>,
    signing_key_file: Option<String>,
}

impl NodeConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(content) = std::fs::read_to_string(&config_path) {
            match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    config.apply_root_config(root);
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => {
                    warn!(
                        "Failed to parse config file {:?} ({}), using defaults",
                        config_path.as_ref(),
                        e
                    );
                }
            }
        } else {
            warn!(
                "Config file {:?} not found, using defaults",
                config_path.as_ref()
            );
        }

        config.apply_environment_overrides();

        info!(
            "Final node configuration: device_id={}, device_role={}, telemetry_period_ms={}",
            config.device_id, config.device_role, config.telemetry_period_ms
        );

        Ok(config)
    }

    fn apply_root_config(&mut self, root: RootConfig) {
        let Some(node) = root.node else { return };
        if let Some(v) = node.device_id {
            self.device_id = v;
        }
        if let Some(v) = node.device_role {
            self.device_role = v;
        }
        if let Some(v) = node.display_name {
            self.display_name = v;
        }
        if let Some(v) = node.telemetry_period_ms {
            self.telemetry_period_ms = v;
        }
        if let Some(v) = node.signing_key_file {
            self.signing_key_file = Some(v);
        }
    }

    fn apply_environment_overrides(&mut self) {
        if let Ok(v) = std::env::var("MYCO_DEVICE_ID") {
            info!("Device id overridden by environment: {}", v);
            self.device_id = v;
        }
        if let Ok(v) = std::env::var("MYCO_DEVICE_ROLE") {
            info!("Device role overridden by environment: {}", v);
            self.device_role = v;
        }
        if let Ok(v) = std::env::var("MYCO_TELEM_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                info!("Telemetry period overridden by environment: {}", ms);
                self.telemetry_period_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("MYCO_SIGNING_KEY_FILE") {
            self.signing_key_file = Some(v);
        }
    }
}
