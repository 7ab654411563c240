//! Key ownership request variants and the messages that carry them

use super::challenge::ChallengeResponse;
use super::proof::SignedProof;
use crate::core_identity::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What the counterparty is asked to prove ownership of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOwnershipRequest {
    /// Mint a new key associated with an external id
    FreshKeyFor(Uuid),
    /// Prove ownership of this existing key
    KnownKey(PublicKey),
    /// Mint a new key with no external id
    AnyFreshKey,
}

impl KeyOwnershipRequest {
    /// Key the proof must carry, for `KnownKey` requests
    pub fn expected_key(&self) -> Option<&PublicKey> {
        match self {
            KeyOwnershipRequest::KnownKey(key) => Some(key),
            KeyOwnershipRequest::FreshKeyFor(_) | KeyOwnershipRequest::AnyFreshKey => None,
        }
    }

    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            KeyOwnershipRequest::FreshKeyFor(_) => "fresh_key_for",
            KeyOwnershipRequest::KnownKey(_) => "known_key",
            KeyOwnershipRequest::AnyFreshKey => "any_fresh_key",
        }
    }
}

impl fmt::Display for KeyOwnershipRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyOwnershipRequest::FreshKeyFor(id) => write!(f, "fresh key for {id}"),
            KeyOwnershipRequest::KnownKey(key) => write!(f, "known key {}", key.fingerprint()),
            KeyOwnershipRequest::AnyFreshKey => write!(f, "fresh key"),
        }
    }
}

/// Requester to counterparty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestForKeyMapping {
    pub challenge: ChallengeResponse,
    pub request: KeyOwnershipRequest,
}

/// Counterparty to requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMappingReply {
    Proof(SignedProof),
    Refused(Refusal),
}

/// Why a counterparty declined to produce a proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Refusal {
    /// It does not hold the private half of the requested key
    UnknownKey(PublicKey),
}
