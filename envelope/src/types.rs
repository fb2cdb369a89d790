//! Envelope field types.

use std::collections::BTreeMap;

/// Uplink protocol the envelope was produced for
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proto {
    /// LoRaWAN / long-range radio
    LoRaWan = 1,
    /// MQTT
    Mqtt = 2,
    /// Bluetooth Low Energy
    Ble = 3,
    /// Cellular
    Lte = 4,
    /// Anything else
    Other = 5,
}

impl TryFrom<u64> for Proto {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Proto::LoRaWan),
            2 => Ok(Proto::Mqtt),
            3 => Ok(Proto::Ble),
            4 => Ok(Proto::Lte),
            5 => Ok(Proto::Other),
            other => Err(other),
        }
    }
}

/// One sensor reading.
///
/// The physical value is `vi · 10^(−vs)` in `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Sensor id
    pub sid: u16,
    /// Scaled integer value
    pub vi: i32,
    /// Decimal places (0..=9)
    pub vs: u8,
    /// Unit id
    pub unit: u16,
    /// Quality, 0 = ok
    pub quality: u8,
}

impl Reading {
    /// The reading as a float in `unit`
    pub fn scaled(&self) -> f64 {
        self.vi as f64 / 10f64.powi(self.vs as i32)
    }
}

/// Optional position fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geo {
    /// Latitude, degrees × 1e7
    pub lat_e7: i32,
    /// Longitude, degrees × 1e7
    pub lon_e7: i32,
    /// Horizontal accuracy in meters
    pub acc_m: u16,
}

/// The unsigned fields of a telemetry envelope.
///
/// [`crate::build_signed`] appends the content hash and signature in
/// canonical key order; these fields never change once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeFields {
    /// Device identifier, e.g. `mb-A-01`
    pub device_id: String,
    /// Device role string (≤ 31 bytes, provisioned externally)
    pub device_role: String,
    /// Uplink protocol
    pub proto: Proto,
    /// Random 16-byte message id
    pub msg_id: [u8; 16],
    /// Wall-clock milliseconds since the epoch
    pub ts_ms: i64,
    /// Sender sequence number (same space as the MDP header seq)
    pub seq: u32,
    /// Monotonic uptime milliseconds
    pub mono_ms: u64,
    /// Position fix, absent without one
    pub geo: Option<Geo>,
    /// Sensor readings
    pub readings: Vec<Reading>,
    /// Free-form metadata; BTreeMap keeps the serialization deterministic
    pub meta: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_scaled() {
        let r = Reading {
            sid: 1,
            vi: 217,
            vs: 1,
            unit: 1,
            quality: 0,
        };
        assert!((r.scaled() - 21.7).abs() < 1e-9);

        let r = Reading {
            sid: 2,
            vi: -45,
            vs: 0,
            unit: 7,
            quality: 0,
        };
        assert!((r.scaled() + 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_proto_conversion() {
        assert_eq!(Proto::try_from(1).unwrap(), Proto::LoRaWan);
        assert_eq!(Proto::try_from(5).unwrap(), Proto::Other);
        assert!(Proto::try_from(9).is_err());
    }
}
