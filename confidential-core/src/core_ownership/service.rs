//! Key ownership service
//!
//! All cryptography behind the key ownership protocol: minting or selecting
//! keys, signing challenge material and verifying proofs. Protocol sessions
//! call it locally; it never talks to the network.

use super::challenge::{ChallengeResponse, ConcatenatedChallenge};
use super::errors::{CryptoError, OwnershipError, OwnershipResult};
use super::proof::{SignedPayload, SignedProof};
use super::request::{KeyOwnershipRequest, RequestForKeyMapping};
use crate::core_identity::{Keystore, PublicKey};
use crate::metrics::{PROOFS_CREATED, PROOFS_VERIFIED};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Creates and verifies key ownership proofs
///
/// Fresh-key requests always mint a new key pair, including concurrent
/// requests for the same external id.
#[derive(Clone)]
pub struct KeyOwnershipService {
    keystore: Arc<dyn Keystore>,
}

impl KeyOwnershipService {
    pub fn new(keystore: Arc<dyn Keystore>) -> Self {
        KeyOwnershipService { keystore }
    }

    pub fn keystore(&self) -> &Arc<dyn Keystore> {
        &self.keystore
    }

    /// Mint a key (scoped to `external_id` if given) and prove ownership of it
    pub fn create_proof_for_new_key(
        &self,
        challenge: &ChallengeResponse,
        external_id: Option<Uuid>,
    ) -> OwnershipResult<SignedProof> {
        let key = self.keystore.generate_key(external_id)?;
        self.concat_and_sign(challenge, key)
    }

    /// Prove ownership of a key this node already holds
    pub fn create_proof_for_known_key(
        &self,
        challenge: &ChallengeResponse,
        key: &PublicKey,
    ) -> OwnershipResult<SignedProof> {
        if !self.keystore.contains(key)? {
            return Err(CryptoError::UnknownKey(*key).into());
        }
        self.concat_and_sign(challenge, *key)
    }

    /// Answer a request by dispatching on its variant
    pub fn respond(&self, request: &RequestForKeyMapping) -> OwnershipResult<SignedProof> {
        match request.request {
            KeyOwnershipRequest::FreshKeyFor(external_id) => {
                self.create_proof_for_new_key(&request.challenge, Some(external_id))
            }
            KeyOwnershipRequest::AnyFreshKey => {
                self.create_proof_for_new_key(&request.challenge, None)
            }
            KeyOwnershipRequest::KnownKey(key) => {
                self.create_proof_for_known_key(&request.challenge, &key)
            }
        }
    }

    // The counter-challenge is minted here: the requester never chooses the
    // signed digest on its own.
    fn concat_and_sign(
        &self,
        challenge: &ChallengeResponse,
        key: PublicKey,
    ) -> OwnershipResult<SignedProof> {
        let counter_challenge = ChallengeResponse::random();
        let concatenated = ConcatenatedChallenge::new(*challenge, counter_challenge);
        let raw = concatenated.encode()?;
        let digest = concatenated.digest()?;
        let signature = self.keystore.sign(&digest, &key)?;

        counter!(PROOFS_CREATED).increment(1);
        debug!(key = %key.fingerprint(), "Signed ownership claim");

        Ok(SignedProof {
            public_key: key,
            signed_payload: SignedPayload { raw, signature },
            counter_challenge,
        })
    }

    /// Verify `proof` answers `original_challenge`
    ///
    /// The signature must verify against `proof.public_key` over the digest of
    /// `original_challenge ‖ proof.counter_challenge`, and the raw payload
    /// must decode to exactly that concatenation.
    pub fn verify_proof(
        &self,
        original_challenge: &ChallengeResponse,
        proof: &SignedProof,
    ) -> OwnershipResult<()> {
        let result = Self::check_proof(original_challenge, proof);
        let outcome = match &result {
            Ok(()) => "valid",
            Err(e) => {
                warn!(key = %proof.public_key.fingerprint(), error = %e, "Ownership proof rejected");
                e.kind()
            }
        };
        counter!(PROOFS_VERIFIED, "result" => outcome).increment(1);
        result
    }

    fn check_proof(original_challenge: &ChallengeResponse, proof: &SignedProof) -> OwnershipResult<()> {
        let expected = ConcatenatedChallenge::new(*original_challenge, proof.counter_challenge);
        let digest = expected.digest()?;

        if !proof
            .public_key
            .verify(&digest, &proof.signed_payload.signature)
        {
            return Err(CryptoError::InvalidSignature {
                key: proof.public_key,
            }
            .into());
        }

        let claimed = ConcatenatedChallenge::decode(&proof.signed_payload.raw)
            .map_err(|e| OwnershipError::malformed(format!("proof payload: {e}")))?;
        if claimed != expected {
            return Err(OwnershipError::malformed(
                "proof payload does not match the challenges of this run",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::core_identity::{Keypair, MemoryKeystore};
    use crate::core_ownership::errors::ProtocolError;
    use proptest::prelude::*;

    fn service() -> KeyOwnershipService {
        KeyOwnershipService::new(Arc::new(MemoryKeystore::new()))
    }

    #[test]
    fn test_fresh_key_proof_verifies() {
        let svc = service();
        let challenge = ChallengeResponse::random();
        let account = Uuid::new_v4();

        let proof = svc.create_proof_for_new_key(&challenge, Some(account)).unwrap();

        svc.verify_proof(&challenge, &proof).unwrap();
        assert_eq!(
            svc.keystore().external_id_of(&proof.public_key).unwrap(),
            Some(account)
        );
    }

    #[test]
    fn test_new_key_is_usable_for_signing() {
        let svc = service();
        let proof = svc
            .create_proof_for_new_key(&ChallengeResponse::random(), None)
            .unwrap();

        let sig = svc.keystore().sign(b"later", &proof.public_key).unwrap();
        assert!(proof.public_key.verify(b"later", &sig));
    }

    #[test]
    fn test_fresh_key_always_minted() {
        let svc = service();
        let account = Uuid::new_v4();
        let a = svc
            .create_proof_for_new_key(&ChallengeResponse::random(), Some(account))
            .unwrap();
        let b = svc
            .create_proof_for_new_key(&ChallengeResponse::random(), Some(account))
            .unwrap();

        assert_ne!(a.public_key, b.public_key);
        assert_eq!(svc.keystore().keys_for_external_id(&account).unwrap().len(), 2);
    }

    #[test]
    fn test_known_key_proof() {
        let svc = service();
        let key = svc.keystore().generate_key(None).unwrap();
        let challenge = ChallengeResponse::random();

        let proof = svc.create_proof_for_known_key(&challenge, &key).unwrap();
        assert_eq!(proof.public_key, key);
        svc.verify_proof(&challenge, &proof).unwrap();
    }

    #[test]
    fn test_known_key_not_held() {
        let svc = service();
        let foreign = Keypair::generate().public_key();

        let err = svc
            .create_proof_for_known_key(&ChallengeResponse::random(), &foreign)
            .unwrap_err();
        assert!(matches!(err, OwnershipError::Crypto(CryptoError::UnknownKey(k)) if k == foreign));
    }

    #[test]
    fn test_respond_dispatches_on_variant() {
        let svc = service();
        let held = svc.keystore().generate_key(None).unwrap();

        let known = svc
            .respond(&RequestForKeyMapping {
                challenge: ChallengeResponse::random(),
                request: KeyOwnershipRequest::KnownKey(held),
            })
            .unwrap();
        assert_eq!(known.public_key, held);

        let fresh = svc
            .respond(&RequestForKeyMapping {
                challenge: ChallengeResponse::random(),
                request: KeyOwnershipRequest::AnyFreshKey,
            })
            .unwrap();
        assert_ne!(fresh.public_key, held);
        assert_eq!(svc.keystore().external_id_of(&fresh.public_key).unwrap(), None);
    }

    #[test]
    fn test_proof_for_other_challenge_rejected() {
        let svc = service();
        let proof = svc
            .create_proof_for_new_key(&ChallengeResponse::random(), None)
            .unwrap();

        let err = svc
            .verify_proof(&ChallengeResponse::random(), &proof)
            .unwrap_err();
        assert!(matches!(err, OwnershipError::Crypto(CryptoError::InvalidSignature { .. })));
    }

    #[test]
    fn test_swapped_public_key_rejected() {
        let svc = service();
        let challenge = ChallengeResponse::random();
        let mut proof = svc.create_proof_for_new_key(&challenge, None).unwrap();
        proof.public_key = Keypair::generate().public_key();

        let err = svc.verify_proof(&challenge, &proof).unwrap_err();
        assert!(matches!(err, OwnershipError::Crypto(CryptoError::InvalidSignature { .. })));
    }

    #[test]
    fn test_raw_payload_with_extra_field_rejected() {
        let svc = service();
        let challenge = ChallengeResponse::random();
        let mut proof = svc.create_proof_for_new_key(&challenge, None).unwrap();
        proof.signed_payload.raw.push(0);

        let err = svc.verify_proof(&challenge, &proof).unwrap_err();
        assert!(matches!(err, OwnershipError::Protocol(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_raw_payload_for_other_challenges_rejected() {
        let svc = service();
        let challenge = ChallengeResponse::random();
        let mut proof = svc.create_proof_for_new_key(&challenge, None).unwrap();
        proof.signed_payload.raw = codec::encode(&ConcatenatedChallenge::new(
            ChallengeResponse::random(),
            proof.counter_challenge,
        ))
        .unwrap();

        let err = svc.verify_proof(&challenge, &proof).unwrap_err();
        assert!(matches!(err, OwnershipError::Protocol(ProtocolError::MalformedPayload(_))));
    }

    proptest! {
        #[test]
        fn prop_proof_verifies_only_for_its_challenge(c1 in any::<[u8; 32]>(), other in any::<[u8; 32]>()) {
            let svc = service();
            let challenge = ChallengeResponse::from_bytes(c1);
            let proof = svc.create_proof_for_new_key(&challenge, None).unwrap();

            prop_assert!(svc.verify_proof(&challenge, &proof).is_ok());
            if other != c1 {
                prop_assert!(svc.verify_proof(&ChallengeResponse::from_bytes(other), &proof).is_err());
            }
        }

        #[test]
        fn prop_distinct_runs_never_share_raw(c1 in any::<[u8; 32]>(), c2 in any::<[u8; 32]>()) {
            prop_assume!(c1 != c2);
            let svc = service();
            let key = svc.keystore().generate_key(None).unwrap();

            let a = svc.create_proof_for_known_key(&ChallengeResponse::from_bytes(c1), &key).unwrap();
            let b = svc.create_proof_for_known_key(&ChallengeResponse::from_bytes(c2), &key).unwrap();
            prop_assert_ne!(a.signed_payload.raw, b.signed_payload.raw);
        }
    }
}
