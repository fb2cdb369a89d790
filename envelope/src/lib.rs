//! Signed, deterministically-serialized telemetry envelopes.
//!
//! An envelope is the telemetry payload carried inside an MDP frame body,
//! distinct from the link-layer frame that carries it. It is a canonical
//! CBOR map with integer keys in ascending order:
//!
//! ```text
//! 0:device_id 1:device_role 2:proto 3:msg_id[16] 4:ts_ms 5:seq 6:mono_ms
//! 7:geo? 8:readings[] 9:meta? 10:hash[32] 11:sig[64]
//! ```
//!
//! `hash` is BLAKE2b-256 over the unsigned serialization (the same map
//! without keys 10 and 11); `sig` is Ed25519 over `"MYCO1" ‖ hash`. The
//! router forwards envelope bytes untouched, so a signature made at the
//! origin verifies at the far end of the network.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod sign;
pub mod types;

pub use codec::{parse, ParsedEnvelope};
pub use error::EnvelopeError;
pub use sign::{
    build, build_signed, content_hash, placeholder_sig, verify, KeyStore, DOMAIN_TAG, SIG_LEN,
};
pub use types::{EnvelopeFields, Geo, Proto, Reading};
