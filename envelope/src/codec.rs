//! Canonical CBOR profile for envelopes.
//!
//! Definite lengths only, integer keys written in ascending order, minimal
//! integer widths (ciborium's defaults). Two builds from identical fields
//! are byte-identical; the hash is a function of content, not insertion
//! order, because the order is fixed here and nowhere else.

use crate::{EnvelopeError, EnvelopeFields, Geo, Proto, Reading};
use ciborium::Value;
use std::collections::BTreeMap;

const K_DEVICE_ID: u64 = 0;
const K_DEVICE_ROLE: u64 = 1;
const K_PROTO: u64 = 2;
const K_MSG_ID: u64 = 3;
const K_TS_MS: u64 = 4;
const K_SEQ: u64 = 5;
const K_MONO_MS: u64 = 6;
const K_GEO: u64 = 7;
const K_READINGS: u64 = 8;
const K_META: u64 = 9;
const K_HASH: u64 = 10;
const K_SIG: u64 = 11;

const G_LAT: u64 = 0;
const G_LON: u64 = 1;
const G_ACC: u64 = 2;

const R_SID: u64 = 0;
const R_VI: u64 = 1;
const R_VS: u64 = 2;
const R_UNIT: u64 = 3;
const R_QUALITY: u64 = 4;

fn key(k: u64) -> Value {
    Value::Integer(k.into())
}

fn uint(v: u64) -> Value {
    Value::Integer(v.into())
}

fn int(v: i64) -> Value {
    Value::Integer(v.into())
}

fn geo_value(geo: &Geo) -> Value {
    Value::Map(vec![
        (key(G_LAT), int(geo.lat_e7 as i64)),
        (key(G_LON), int(geo.lon_e7 as i64)),
        (key(G_ACC), uint(geo.acc_m as u64)),
    ])
}

fn reading_value(r: &Reading) -> Value {
    Value::Map(vec![
        (key(R_SID), uint(r.sid as u64)),
        (key(R_VI), int(r.vi as i64)),
        (key(R_VS), uint(r.vs as u64)),
        (key(R_UNIT), uint(r.unit as u64)),
        (key(R_QUALITY), uint(r.quality as u64)),
    ])
}

fn meta_value(meta: &BTreeMap<String, String>) -> Value {
    Value::Map(
        meta.iter()
            .map(|(k, v)| (Value::Text(k.clone()), Value::Text(v.clone())))
            .collect(),
    )
}

/// The unsigned envelope as a CBOR value (keys 0..=9, absent keys skipped)
pub fn unsigned_value(fields: &EnvelopeFields) -> Value {
    let mut entries = vec![
        (key(K_DEVICE_ID), Value::Text(fields.device_id.clone())),
        (key(K_DEVICE_ROLE), Value::Text(fields.device_role.clone())),
        (key(K_PROTO), uint(fields.proto as u64)),
        (key(K_MSG_ID), Value::Bytes(fields.msg_id.to_vec())),
        (key(K_TS_MS), int(fields.ts_ms)),
        (key(K_SEQ), uint(fields.seq as u64)),
        (key(K_MONO_MS), uint(fields.mono_ms)),
    ];
    if let Some(geo) = &fields.geo {
        entries.push((key(K_GEO), geo_value(geo)));
    }
    entries.push((
        key(K_READINGS),
        Value::Array(fields.readings.iter().map(reading_value).collect()),
    ));
    if let Some(meta) = &fields.meta {
        entries.push((key(K_META), meta_value(meta)));
    }
    Value::Map(entries)
}

/// The signed envelope: unsigned entries plus hash (10) and sig (11)
pub fn signed_value(fields: &EnvelopeFields, hash: &[u8; 32], sig: &[u8; 64]) -> Value {
    let Value::Map(mut entries) = unsigned_value(fields) else {
        unreachable!()
    };
    entries.push((key(K_HASH), Value::Bytes(hash.to_vec())));
    entries.push((key(K_SIG), Value::Bytes(sig.to_vec())));
    Value::Map(entries)
}

/// Serialize a CBOR value to bytes
pub fn to_bytes(value: &Value) -> Result<Vec<u8>, EnvelopeError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|_| EnvelopeError::Encode)?;
    Ok(buf)
}

/// Deserialize envelope bytes into a CBOR value, requiring a map
pub fn from_bytes(bytes: &[u8]) -> Result<Value, EnvelopeError> {
    let value: Value = ciborium::from_reader(bytes).map_err(|_| EnvelopeError::Decode)?;
    match value {
        Value::Map(_) => Ok(value),
        _ => Err(EnvelopeError::NotMap),
    }
}

/// Rebuild the unsigned serialization from a decoded envelope by dropping
/// the hash and sig entries. Entry order is preserved, so the result is the
/// exact signing input.
pub fn strip_signature(value: &Value) -> Result<Value, EnvelopeError> {
    let Value::Map(entries) = value else {
        return Err(EnvelopeError::NotMap);
    };
    let kept = entries
        .iter()
        .filter(|(k, _)| !matches!(entry_key(k), Some(K_HASH) | Some(K_SIG)))
        .cloned()
        .collect();
    Ok(Value::Map(kept))
}

fn entry_key(v: &Value) -> Option<u64> {
    match v {
        Value::Integer(i) => u64::try_from(i128::from(*i)).ok(),
        _ => None,
    }
}

fn map_get<'a>(entries: &'a [(Value, Value)], k: u64) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(ek, _)| entry_key(ek) == Some(k))
        .map(|(_, v)| v)
}

fn as_u64(v: &Value, k: u64) -> Result<u64, EnvelopeError> {
    match v {
        Value::Integer(i) => u64::try_from(i128::from(*i)).map_err(|_| EnvelopeError::BadField(k)),
        _ => Err(EnvelopeError::BadField(k)),
    }
}

fn as_i64(v: &Value, k: u64) -> Result<i64, EnvelopeError> {
    match v {
        Value::Integer(i) => i64::try_from(i128::from(*i)).map_err(|_| EnvelopeError::BadField(k)),
        _ => Err(EnvelopeError::BadField(k)),
    }
}

fn as_text(v: &Value, k: u64) -> Result<String, EnvelopeError> {
    match v {
        Value::Text(s) => Ok(s.clone()),
        _ => Err(EnvelopeError::BadField(k)),
    }
}

fn as_bytes<const N: usize>(v: &Value, k: u64) -> Result<[u8; N], EnvelopeError> {
    match v {
        Value::Bytes(b) => b
            .as_slice()
            .try_into()
            .map_err(|_| EnvelopeError::BadField(k)),
        _ => Err(EnvelopeError::BadField(k)),
    }
}

fn parse_geo(v: &Value) -> Result<Geo, EnvelopeError> {
    let Value::Map(entries) = v else {
        return Err(EnvelopeError::BadField(K_GEO));
    };
    let lat = map_get(entries, G_LAT).ok_or(EnvelopeError::MissingField(G_LAT))?;
    let lon = map_get(entries, G_LON).ok_or(EnvelopeError::MissingField(G_LON))?;
    let acc = map_get(entries, G_ACC).ok_or(EnvelopeError::MissingField(G_ACC))?;
    Ok(Geo {
        lat_e7: as_i64(lat, G_LAT)? as i32,
        lon_e7: as_i64(lon, G_LON)? as i32,
        acc_m: as_u64(acc, G_ACC)? as u16,
    })
}

fn parse_reading(v: &Value) -> Result<Reading, EnvelopeError> {
    let Value::Map(entries) = v else {
        return Err(EnvelopeError::BadField(K_READINGS));
    };
    let get = |k: u64| map_get(entries, k).ok_or(EnvelopeError::MissingField(k));
    Ok(Reading {
        sid: as_u64(get(R_SID)?, R_SID)? as u16,
        vi: as_i64(get(R_VI)?, R_VI)? as i32,
        vs: as_u64(get(R_VS)?, R_VS)? as u8,
        unit: as_u64(get(R_UNIT)?, R_UNIT)? as u16,
        quality: as_u64(get(R_QUALITY)?, R_QUALITY)? as u8,
    })
}

fn parse_meta(v: &Value) -> Result<BTreeMap<String, String>, EnvelopeError> {
    let Value::Map(entries) = v else {
        return Err(EnvelopeError::BadField(K_META));
    };
    let mut out = BTreeMap::new();
    for (k, val) in entries {
        if let (Value::Text(k), Value::Text(val)) = (k, val) {
            out.insert(k.clone(), val.clone());
        }
    }
    Ok(out)
}

/// A fully decoded envelope
#[derive(Debug, Clone)]
pub struct ParsedEnvelope {
    /// The unsigned fields
    pub fields: EnvelopeFields,
    /// Content hash, when the envelope carries one
    pub hash: Option<[u8; 32]>,
    /// Signature, when the envelope carries one
    pub sig: Option<[u8; 64]>,
}

/// Decode envelope bytes into typed fields.
pub fn parse(bytes: &[u8]) -> Result<ParsedEnvelope, EnvelopeError> {
    let value = from_bytes(bytes)?;
    let Value::Map(entries) = &value else {
        unreachable!()
    };

    let req = |k: u64| map_get(entries, k).ok_or(EnvelopeError::MissingField(k));

    let proto_raw = as_u64(req(K_PROTO)?, K_PROTO)?;
    let proto = Proto::try_from(proto_raw).map_err(|_| EnvelopeError::BadField(K_PROTO))?;

    let geo = match map_get(entries, K_GEO) {
        Some(v) => Some(parse_geo(v)?),
        None => None,
    };

    let readings = match req(K_READINGS)? {
        Value::Array(items) => items
            .iter()
            .map(parse_reading)
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(EnvelopeError::BadField(K_READINGS)),
    };

    let meta = match map_get(entries, K_META) {
        Some(v) => Some(parse_meta(v)?),
        None => None,
    };

    let hash = match map_get(entries, K_HASH) {
        Some(v) => Some(as_bytes::<32>(v, K_HASH)?),
        None => None,
    };
    let sig = match map_get(entries, K_SIG) {
        Some(v) => Some(as_bytes::<64>(v, K_SIG)?),
        None => None,
    };

    Ok(ParsedEnvelope {
        fields: EnvelopeFields {
            device_id: as_text(req(K_DEVICE_ID)?, K_DEVICE_ID)?,
            device_role: as_text(req(K_DEVICE_ROLE)?, K_DEVICE_ROLE)?,
            proto,
            msg_id: as_bytes::<16>(req(K_MSG_ID)?, K_MSG_ID)?,
            ts_ms: as_i64(req(K_TS_MS)?, K_TS_MS)?,
            seq: as_u64(req(K_SEQ)?, K_SEQ)? as u32,
            mono_ms: as_u64(req(K_MONO_MS)?, K_MONO_MS)?,
            geo,
            readings,
            meta,
        },
        hash,
        sig,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> EnvelopeFields {
        EnvelopeFields {
            device_id: "mb-A-01".into(),
            device_role: "origin".into(),
            proto: Proto::LoRaWan,
            msg_id: [7u8; 16],
            ts_ms: 1_700_000_000_000,
            seq: 1,
            mono_ms: 12_345,
            geo: None,
            readings: vec![Reading {
                sid: 1,
                vi: 217,
                vs: 1,
                unit: 1,
                quality: 0,
            }],
            meta: None,
        }
    }

    #[test]
    fn test_unsigned_roundtrip() {
        let f = fields();
        let bytes = to_bytes(&unsigned_value(&f)).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.fields, f);
        assert!(parsed.hash.is_none());
        assert!(parsed.sig.is_none());
    }

    #[test]
    fn test_geo_and_meta_roundtrip() {
        let mut f = fields();
        f.geo = Some(Geo {
            lat_e7: 451234567,
            lon_e7: -758901234,
            acc_m: 12,
        });
        f.meta = Some(BTreeMap::from([("fw".to_string(), "1.4.2".to_string())]));

        let bytes = to_bytes(&unsigned_value(&f)).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.fields, f);
    }

    #[test]
    fn test_strip_signature_recovers_signing_input() {
        let f = fields();
        let unsigned = to_bytes(&unsigned_value(&f)).unwrap();
        let signed = to_bytes(&signed_value(&f, &[1u8; 32], &[2u8; 64])).unwrap();

        let reparsed = from_bytes(&signed).unwrap();
        let stripped = to_bytes(&strip_signature(&reparsed).unwrap()).unwrap();
        assert_eq!(stripped, unsigned);
    }

    #[test]
    fn test_determinism() {
        let f = fields();
        let a = to_bytes(&unsigned_value(&f)).unwrap();
        let b = to_bytes(&unsigned_value(&f.clone())).unwrap();
        assert_eq!(a, b);
    }
}
