//! Signed ownership proofs

use super::challenge::ChallengeResponse;
use crate::core_identity::{PublicKey, Signature};
use serde::{Deserialize, Serialize};

/// Raw bytes plus a signature over their SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub raw: Vec<u8>,
    pub signature: Signature,
}

/// Proof that the sender holds the private half of `public_key`
///
/// `signed_payload.raw` encodes `requester challenge ‖ counter_challenge`.
/// Proofs are transient: they are consumed by verification and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProof {
    pub public_key: PublicKey,
    pub signed_payload: SignedPayload,
    pub counter_challenge: ChallengeResponse,
}
