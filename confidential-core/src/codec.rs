//! Stable payload encoding shared by proofs and session envelopes.
//!
//! Fixed-width integers, little endian, bounded input and no trailing bytes:
//! a payload either decodes to exactly one value or it is rejected.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Maximum encoded payload size (64 KiB)
pub const MAX_PAYLOAD_SIZE: u64 = 64 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_PAYLOAD_SIZE)
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    options().serialize(value)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, bincode::Error> {
    options().deserialize(bytes)
}
