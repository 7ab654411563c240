//! Key ownership request, both sides
//!
//! The requester sends a fresh challenge with a [`KeyOwnershipRequest`]; the
//! provider answers with a [`SignedProof`] or an explicit refusal. The
//! requester registers `proof.public_key -> counterparty` only once the proof
//! has verified, so an aborted run leaves the registry untouched.
//!
//! The provider records every key it proves as its own before replying, so it
//! can later answer mapping syncs for that key.

use crate::core_identity::{AnonymousParty, IdentityRegistry, PublicKey, Registration};
use crate::core_ownership::{
    ChallengeResponse, CryptoError, KeyMappingReply, KeyOwnershipRequest, KeyOwnershipService,
    OwnershipError, OwnershipResult, PolicyError, Refusal, RequestForKeyMapping, SignedProof,
};
use crate::core_session::Session;
use crate::metrics::{Timer, KEY_MAPPINGS_REGISTERED, KEY_REQUESTS, KEY_REQUEST_DURATION};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Requester progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequesterState {
    Idle,
    AwaitingProof,
    Verifying,
    Accepted,
    Rejected,
}

/// Requesting side of a key ownership run
pub struct RequestKeyFlow {
    session: Session,
    request: KeyOwnershipRequest,
    ownership: KeyOwnershipService,
    registry: Arc<dyn IdentityRegistry>,
    state: RequesterState,
}

impl RequestKeyFlow {
    pub fn new(
        session: Session,
        request: KeyOwnershipRequest,
        ownership: KeyOwnershipService,
        registry: Arc<dyn IdentityRegistry>,
    ) -> Self {
        RequestKeyFlow {
            session,
            request,
            ownership,
            registry,
            state: RequesterState::Idle,
        }
    }

    pub fn state(&self) -> RequesterState {
        self.state
    }

    /// Run the exchange and return the counterparty's key as an anonymous party
    pub async fn call(&mut self) -> OwnershipResult<AnonymousParty> {
        self.execute(true).await.map(AnonymousParty::new)
    }

    /// Run the exchange and verify the proof without registering the key
    pub async fn verify(&mut self) -> OwnershipResult<PublicKey> {
        self.execute(false).await
    }

    async fn execute(&mut self, register: bool) -> OwnershipResult<PublicKey> {
        let timer = Timer::new(KEY_REQUEST_DURATION);
        let result = self.run(register).await;
        timer.stop();

        let outcome = match &result {
            Ok(key) => {
                self.transition(RequesterState::Accepted);
                info!(
                    session = %self.session.id(),
                    counterparty = %self.session.counterparty(),
                    key = %key.fingerprint(),
                    registered = register,
                    "Key ownership accepted"
                );
                "accepted"
            }
            Err(e) => {
                self.transition(RequesterState::Rejected);
                warn!(
                    session = %self.session.id(),
                    counterparty = %self.session.counterparty(),
                    request = %self.request,
                    error = %e,
                    "Key ownership rejected"
                );
                e.kind()
            }
        };
        counter!(KEY_REQUESTS, "request" => self.request.label(), "result" => outcome).increment(1);

        result
    }

    async fn run(&mut self, register: bool) -> OwnershipResult<PublicKey> {
        let challenge = ChallengeResponse::random();
        let message = RequestForKeyMapping {
            challenge,
            request: self.request,
        };

        self.transition(RequesterState::AwaitingProof);
        let reply: KeyMappingReply = self.session.send_and_receive(&message).await?;
        let proof = self.unwrap_reply(reply)?;

        self.transition(RequesterState::Verifying);
        self.ownership.verify_proof(&challenge, &proof)?;
        if let Some(expected) = self.request.expected_key() {
            if proof.public_key != *expected {
                return Err(PolicyError::KeyMismatch {
                    expected: *expected,
                    actual: proof.public_key,
                }
                .into());
            }
        }

        if register {
            let counterparty = self.session.counterparty();
            if self.registry.register_mapping(proof.public_key, counterparty)? == Registration::Added {
                counter!(KEY_MAPPINGS_REGISTERED, "source" => "proof").increment(1);
            }
        }

        Ok(proof.public_key)
    }

    fn unwrap_reply(&self, reply: KeyMappingReply) -> OwnershipResult<SignedProof> {
        match reply {
            KeyMappingReply::Proof(proof) => Ok(proof),
            KeyMappingReply::Refused(Refusal::UnknownKey(key)) => match self.request.expected_key() {
                Some(expected) if *expected == key => Err(CryptoError::UnknownKey(key).into()),
                _ => Err(OwnershipError::malformed(format!(
                    "refusal names key {} which was not requested",
                    key.fingerprint()
                ))),
            },
        }
    }

    fn transition(&mut self, next: RequesterState) {
        debug!(session = %self.session.id(), from = ?self.state, to = ?next, "Requester state");
        self.state = next;
    }
}

/// Provider progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Idle,
    AwaitingRequest,
    ProofGenerated,
}

/// Providing side of a key ownership run
pub struct ProvideKeyFlow {
    session: Session,
    ownership: KeyOwnershipService,
    registry: Arc<dyn IdentityRegistry>,
    state: ProviderState,
}

impl ProvideKeyFlow {
    pub fn new(session: Session, ownership: KeyOwnershipService, registry: Arc<dyn IdentityRegistry>) -> Self {
        ProvideKeyFlow {
            session,
            ownership,
            registry,
            state: ProviderState::Idle,
        }
    }

    pub fn state(&self) -> ProviderState {
        self.state
    }

    /// Answer one request; returns the key ownership was proven for
    ///
    /// A request this node cannot satisfy is answered with a refusal and then
    /// fails the run with the same error. The state is back to `Idle` on return.
    pub async fn call(&mut self) -> OwnershipResult<PublicKey> {
        let result = self.run().await;
        if let Err(e) = &result {
            warn!(
                session = %self.session.id(),
                requester = %self.session.counterparty(),
                error = %e,
                "Key ownership request not satisfied"
            );
        }
        self.transition(ProviderState::Idle);
        result
    }

    async fn run(&mut self) -> OwnershipResult<PublicKey> {
        self.transition(ProviderState::AwaitingRequest);
        let request: RequestForKeyMapping = self.session.receive().await?;
        debug!(session = %self.session.id(), request = %request.request, "Key ownership requested");

        match self.ownership.respond(&request) {
            Ok(proof) => {
                self.transition(ProviderState::ProofGenerated);
                let key = proof.public_key;
                if self.registry.register_mapping(key, self.session.local())? == Registration::Added {
                    counter!(KEY_MAPPINGS_REGISTERED, "source" => "own").increment(1);
                }
                self.session.send(&KeyMappingReply::Proof(proof)).await?;
                Ok(key)
            }
            Err(OwnershipError::Crypto(CryptoError::UnknownKey(key))) => {
                self.session
                    .send(&KeyMappingReply::Refused(Refusal::UnknownKey(key)))
                    .await?;
                Err(CryptoError::UnknownKey(key).into())
            }
            Err(e) => Err(e),
        }
    }

    fn transition(&mut self, next: ProviderState) {
        debug!(session = %self.session.id(), from = ?self.state, to = ?next, "Provider state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_identity::{Keypair, MemoryIdentityRegistry, MemoryKeystore, Party, PartyName};
    use crate::core_ownership::ProtocolError;
    use crate::core_session::SessionSettings;
    use std::time::Duration;
    use uuid::Uuid;

    struct Side {
        party: Party,
        ownership: KeyOwnershipService,
        registry: Arc<MemoryIdentityRegistry>,
    }

    fn side(name: &str) -> Side {
        Side {
            party: Party::new(PartyName::new(name), Keypair::generate().public_key()),
            ownership: KeyOwnershipService::new(Arc::new(MemoryKeystore::new())),
            registry: Arc::new(MemoryIdentityRegistry::new()),
        }
    }

    fn sessions(alice: &Side, bob: &Side, timeout_ms: u64) -> (Session, Session) {
        Session::pair(
            alice.party.clone(),
            bob.party.clone(),
            SessionSettings {
                receive_timeout: Duration::from_millis(timeout_ms),
                buffer: 4,
            },
        )
    }

    async fn run_pair(
        alice: &Side,
        bob: &Side,
        request: KeyOwnershipRequest,
    ) -> (OwnershipResult<AnonymousParty>, OwnershipResult<PublicKey>, RequesterState) {
        let (a, b) = sessions(alice, bob, 1_000);
        let mut provider = ProvideKeyFlow::new(b, bob.ownership.clone(), bob.registry.clone());
        let provider = tokio::spawn(async move { provider.call().await });

        let mut requester =
            RequestKeyFlow::new(a, request, alice.ownership.clone(), alice.registry.clone());
        let requested = requester.call().await;
        (requested, provider.await.unwrap(), requester.state())
    }

    #[tokio::test]
    async fn test_fresh_key_for_external_id() {
        let (alice, bob) = (side("alice"), side("bob"));
        let account = Uuid::new_v4();

        let (requested, provided, state) =
            run_pair(&alice, &bob, KeyOwnershipRequest::FreshKeyFor(account)).await;
        let anon = requested.unwrap();

        assert_eq!(state, RequesterState::Accepted);
        assert_eq!(provided.unwrap(), *anon.owning_key());
        assert_eq!(
            alice.registry.lookup_by_key(anon.owning_key()).unwrap(),
            Some(bob.party.clone())
        );
        assert_eq!(
            bob.ownership.keystore().external_id_of(anon.owning_key()).unwrap(),
            Some(account)
        );
        assert_eq!(
            bob.registry.lookup_by_key(anon.owning_key()).unwrap(),
            Some(bob.party.clone())
        );
    }

    #[tokio::test]
    async fn test_known_key() {
        let (alice, bob) = (side("alice"), side("bob"));
        let key = bob.ownership.keystore().generate_key(None).unwrap();

        let (requested, _, _) = run_pair(&alice, &bob, KeyOwnershipRequest::KnownKey(key)).await;
        assert_eq!(*requested.unwrap().owning_key(), key);
        assert_eq!(bob.registry.lookup_by_key(&key).unwrap(), Some(bob.party.clone()));
    }

    #[tokio::test]
    async fn test_verify_leaves_registry_untouched() {
        let (alice, bob) = (side("alice"), side("bob"));
        let key = bob.ownership.keystore().generate_key(None).unwrap();
        let (a, b) = sessions(&alice, &bob, 1_000);
        let provider = tokio::spawn(async move {
            ProvideKeyFlow::new(b, bob.ownership.clone(), bob.registry.clone())
                .call()
                .await
        });

        let mut requester = RequestKeyFlow::new(
            a,
            KeyOwnershipRequest::KnownKey(key),
            alice.ownership.clone(),
            alice.registry.clone(),
        );
        assert_eq!(requester.verify().await.unwrap(), key);
        assert_eq!(requester.state(), RequesterState::Accepted);
        assert_eq!(alice.registry.lookup_by_key(&key).unwrap(), None);
        assert_eq!(provider.await.unwrap().unwrap(), key);
    }

    #[tokio::test]
    async fn test_provider_key_owned_by_other_party_conflicts() {
        let (alice, bob) = (side("alice"), side("bob"));
        let key = bob.ownership.keystore().generate_key(None).unwrap();
        bob.registry.register_mapping(key, &side("carol").party).unwrap();

        let (requested, provided, _) = run_pair(&alice, &bob, KeyOwnershipRequest::KnownKey(key)).await;

        assert!(matches!(
            provided.unwrap_err(),
            OwnershipError::Policy(PolicyError::MappingConflict { .. })
        ));
        assert!(requested.is_err());
        assert_eq!(alice.registry.lookup_by_key(&key).unwrap(), None);
    }

    #[tokio::test]
    async fn test_known_key_not_held_is_refused() {
        let (alice, bob) = (side("alice"), side("bob"));
        let foreign = Keypair::generate().public_key();

        let (requested, provided, state) =
            run_pair(&alice, &bob, KeyOwnershipRequest::KnownKey(foreign)).await;

        assert!(matches!(
            requested.unwrap_err(),
            OwnershipError::Crypto(CryptoError::UnknownKey(k)) if k == foreign
        ));
        assert!(matches!(
            provided.unwrap_err(),
            OwnershipError::Crypto(CryptoError::UnknownKey(_))
        ));
        assert_eq!(state, RequesterState::Rejected);
        assert_eq!(alice.registry.mapping_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_silent_counterparty_is_unresponsive() {
        let (alice, bob) = (side("alice"), side("bob"));
        let (a, _b) = sessions(&alice, &bob, 30);

        let mut requester = RequestKeyFlow::new(
            a,
            KeyOwnershipRequest::AnyFreshKey,
            alice.ownership.clone(),
            alice.registry.clone(),
        );
        let err = requester.call().await.unwrap_err();

        assert!(matches!(
            err,
            OwnershipError::Protocol(ProtocolError::CounterpartyUnresponsive { .. })
        ));
        assert_eq!(requester.state(), RequesterState::Rejected);
    }

    #[tokio::test]
    async fn test_provider_returns_to_idle() {
        let (alice, bob) = (side("alice"), side("bob"));
        let (a, b) = sessions(&alice, &bob, 1_000);
        drop(a);

        let mut provider = ProvideKeyFlow::new(b, bob.ownership.clone(), bob.registry.clone());
        assert!(provider.call().await.is_err());
        assert_eq!(provider.state(), ProviderState::Idle);
    }
}
