//! Challenge material
//!
//! A [`ChallengeResponse`] is a single-use 32-byte nonce. Each protocol run
//! combines the requester's challenge with a counter-challenge minted by the
//! key owner; the signed digest therefore differs on every run.

use crate::codec;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Challenge length in bytes (SHA-256 output)
pub const CHALLENGE_LEN: usize = 32;

/// SHA-256 of `bytes`
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Single-use random challenge
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeResponse([u8; CHALLENGE_LEN]);

impl ChallengeResponse {
    /// Fresh challenge: SHA-256 over 32 bytes of CSPRNG output
    pub fn random() -> Self {
        let entropy: [u8; 32] = rand::random();
        ChallengeResponse(sha256(&entropy))
    }

    pub fn from_bytes(bytes: [u8; CHALLENGE_LEN]) -> Self {
        ChallengeResponse(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CHALLENGE_LEN] {
        &self.0
    }
}

impl fmt::Debug for ChallengeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChallengeResponse({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for ChallengeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// `requester ‖ counterparty`, the content a key owner signs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatenatedChallenge {
    pub requester: ChallengeResponse,
    pub counterparty: ChallengeResponse,
}

impl ConcatenatedChallenge {
    pub fn new(requester: ChallengeResponse, counterparty: ChallengeResponse) -> Self {
        ConcatenatedChallenge {
            requester,
            counterparty,
        }
    }

    /// Canonical encoding carried as the proof's raw payload
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        codec::encode(self)
    }

    /// Strict decoding: exactly two challenges, nothing before or after
    pub fn decode(raw: &[u8]) -> Result<Self, bincode::Error> {
        codec::decode(raw)
    }

    /// Digest the key owner signs
    pub fn digest(&self) -> Result<[u8; 32], bincode::Error> {
        Ok(sha256(&self.encode()?))
    }
}
