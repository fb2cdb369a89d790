//! Hashing, signing, and verification.
//!
//! The content hash is BLAKE2b-256 over the unsigned canonical bytes. The
//! signature is Ed25519 over the 5-byte domain tag `"MYCO1"` followed by
//! the hash, so the signed message is 37 bytes regardless of payload size.

use crate::codec;
use crate::{EnvelopeError, EnvelopeFields};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

type Blake2b256 = Blake2b<U32>;

/// Domain separation tag prepended to the hash before signing
pub const DOMAIN_TAG: &[u8; 5] = b"MYCO1";

/// Signature width; fixed even for placeholder signatures
pub const SIG_LEN: usize = 64;

/// Provider of the device signing key.
///
/// Key provisioning is outside core scope; nodes without a key fall back to
/// [`placeholder_sig`].
pub trait KeyStore {
    /// Ed25519-sign `message`, returning the 64-byte signature
    fn sign(&self, message: &[u8]) -> [u8; SIG_LEN];
}

impl KeyStore for SigningKey {
    fn sign(&self, message: &[u8]) -> [u8; SIG_LEN] {
        Signer::sign(self, message).to_bytes()
    }
}

/// BLAKE2b-256 of the unsigned serialization
pub fn content_hash(unsigned_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(unsigned_bytes);
    hasher.finalize().into()
}

/// Bring-up placeholder: base64 of the hash, zero-padded to the fixed
/// signature width. Never verifies; the field width is what matters.
pub fn placeholder_sig(hash: &[u8; 32]) -> [u8; SIG_LEN] {
    let encoded = BASE64.encode(hash);
    let mut sig = [0u8; SIG_LEN];
    let n = encoded.len().min(SIG_LEN);
    sig[..n].copy_from_slice(&encoded.as_bytes()[..n]);
    sig
}

/// Serialize the unsigned envelope and return `(bytes, hash)`
pub fn build(fields: &EnvelopeFields) -> Result<(Vec<u8>, [u8; 32]), EnvelopeError> {
    let bytes = codec::to_bytes(&codec::unsigned_value(fields))?;
    let hash = content_hash(&bytes);
    Ok((bytes, hash))
}

/// Ed25519 signature over `"MYCO1" ‖ hash`
pub fn sign(hash: &[u8; 32], key: &dyn KeyStore) -> [u8; SIG_LEN] {
    let mut msg = [0u8; DOMAIN_TAG.len() + 32];
    msg[..DOMAIN_TAG.len()].copy_from_slice(DOMAIN_TAG);
    msg[DOMAIN_TAG.len()..].copy_from_slice(hash);
    key.sign(&msg)
}

/// Build the complete signed envelope.
///
/// Without a key store the signature field holds the fixed-width
/// placeholder so the wire shape stays identical during bring-up.
pub fn build_signed(
    fields: &EnvelopeFields,
    key: Option<&dyn KeyStore>,
) -> Result<Vec<u8>, EnvelopeError> {
    let (_, hash) = build(fields)?;
    let sig = match key {
        Some(key) => sign(&hash, key),
        None => placeholder_sig(&hash),
    };
    codec::to_bytes(&codec::signed_value(fields, &hash, &sig))
}

/// Verify a signed envelope against a public key.
///
/// Reparses the canonical bytes, recomputes the hash over the entries minus
/// hash/sig, and checks the Ed25519 signature. Any structural defect fails
/// verification.
pub fn verify(bytes: &[u8], public_key: &VerifyingKey) -> bool {
    verify_inner(bytes, public_key).unwrap_or(false)
}

fn verify_inner(bytes: &[u8], public_key: &VerifyingKey) -> Result<bool, EnvelopeError> {
    let parsed = codec::parse(bytes)?;
    let (Some(stored_hash), Some(sig)) = (parsed.hash, parsed.sig) else {
        return Ok(false);
    };

    let value = codec::from_bytes(bytes)?;
    let unsigned = codec::to_bytes(&codec::strip_signature(&value)?)?;
    if content_hash(&unsigned) != stored_hash {
        return Ok(false);
    }

    let mut msg = [0u8; DOMAIN_TAG.len() + 32];
    msg[..DOMAIN_TAG.len()].copy_from_slice(DOMAIN_TAG);
    msg[DOMAIN_TAG.len()..].copy_from_slice(&stored_hash);

    let signature = Signature::from_bytes(&sig);
    Ok(public_key.verify(&msg, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Proto, Reading};

    fn fields(seq: u32) -> EnvelopeFields {
        EnvelopeFields {
            device_id: "mb-A-01".into(),
            device_role: "origin".into(),
            proto: Proto::LoRaWan,
            msg_id: [0xAB; 16],
            ts_ms: 1_700_000_000_000,
            seq,
            mono_ms: 500,
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

    fn keypair() -> (SigningKey, VerifyingKey) {
        let key = SigningKey::from_bytes(&[0x11; 32]);
        let pk = key.verifying_key();
        (key, pk)
    }

    #[test]
    fn test_build_signed_deterministic() {
        let (key, _) = keypair();
        let a = build_signed(&fields(1), Some(&key)).unwrap();
        let b = build_signed(&fields(1), Some(&key)).unwrap();
        assert_eq!(a, b);

        let c = build_signed(&fields(2), Some(&key)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_verify_good_envelope() {
        let (key, pk) = keypair();
        let bytes = build_signed(&fields(1), Some(&key)).unwrap();
        assert!(verify(&bytes, &pk));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let (key, pk) = keypair();
        let good = build_signed(&fields(1), Some(&key)).unwrap();

        for i in 0..good.len() {
            let mut bad = good.clone();
            bad[i] ^= 0x01;
            assert!(!verify(&bad, &pk), "tampered byte {} verified", i);
        }
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let (key, _) = keypair();
        let other = SigningKey::from_bytes(&[0x22; 32]).verifying_key();
        let bytes = build_signed(&fields(1), Some(&key)).unwrap();
        assert!(!verify(&bytes, &other));
    }

    #[test]
    fn test_placeholder_sig_fixed_width() {
        let bytes = build_signed(&fields(1), None).unwrap();
        let parsed = codec::parse(&bytes).unwrap();
        let sig = parsed.sig.unwrap();
        assert_eq!(sig.len(), SIG_LEN);
        // base64 of 32 bytes is 44 chars; the tail stays zero
        assert!(sig[44..].iter().all(|&b| b == 0));

        let (_, pk) = keypair();
        assert!(!verify(&bytes, &pk));
    }

    #[test]
    fn test_hash_covers_unsigned_bytes_only() {
        let f = fields(1);
        let (unsigned, hash) = build(&f).unwrap();
        assert_eq!(content_hash(&unsigned), hash);

        let signed = build_signed(&f, None).unwrap();
        let parsed = codec::parse(&signed).unwrap();
        assert_eq!(parsed.hash.unwrap(), hash);
    }
}
