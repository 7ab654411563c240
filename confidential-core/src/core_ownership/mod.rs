//! Key ownership proofs
//!
//! Value types exchanged by the key ownership protocol and the service that
//! signs and verifies them.

pub mod challenge;
pub mod errors;
pub mod proof;
pub mod request;
pub mod service;

pub use challenge::{ChallengeResponse, ConcatenatedChallenge};
pub use errors::{ArgumentError, CryptoError, OwnershipError, OwnershipResult, PolicyError, ProtocolError};
pub use proof::{SignedPayload, SignedProof};
pub use request::{KeyMappingReply, KeyOwnershipRequest, Refusal, RequestForKeyMapping};
pub use service::KeyOwnershipService;
