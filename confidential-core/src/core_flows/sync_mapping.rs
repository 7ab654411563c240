//! Key mapping sync
//!
//! The initiator asks a counterparty who owns the anonymous keys referenced
//! by a transaction, or by an explicit list of parties, and registers the
//! answers. Keys the counterparty cannot or will not resolve come back as
//! `unresolved`; that is a normal result, not an error.
//!
//! With [`SyncKeyMappingFlow::verify_owners`] every returned mapping is
//! checked with a `KnownKey` request to the claimed owner before anything is
//! registered. One failed check fails the run and registers nothing.

use super::disclosure::DisclosurePolicy;
use super::request_key::RequestKeyFlow;
use crate::core_identity::{AbstractParty, AnonymousParty, IdentityRegistry, Party, PublicKey, Registration};
use crate::core_ledger::Transaction;
use crate::core_ownership::{CryptoError, KeyOwnershipRequest, KeyOwnershipService, OwnershipError, OwnershipResult};
use crate::core_session::{FlowKind, Messaging, Session};
use crate::metrics::{KEY_MAPPINGS_REGISTERED, SYNC_MAPPINGS_DISCLOSED, SYNC_MAPPINGS_WITHHELD};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Initiator to counterparty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub keys: Vec<PublicKey>,
}

/// One resolved key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMapping {
    pub key: PublicKey,
    pub party: Party,
}

/// Counterparty to initiator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReply {
    pub mappings: Vec<KeyMapping>,
}

/// What a sync is about
#[derive(Debug, Clone)]
pub enum SyncTarget {
    Transaction(Transaction),
    Parties(Vec<AbstractParty>),
}

impl SyncTarget {
    /// Anonymous keys referenced by the target, each once in first-seen order
    pub fn anonymous_keys(&self) -> Vec<PublicKey> {
        match self {
            SyncTarget::Transaction(tx) => tx.referenced_keys(),
            SyncTarget::Parties(parties) => {
                let mut seen = HashSet::new();
                parties
                    .iter()
                    .filter_map(AbstractParty::as_anonymous)
                    .map(|anon| *anon.owning_key())
                    .filter(|key| seen.insert(*key))
                    .collect()
            }
        }
    }
}

/// Result of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Keys now resolvable through the local registry
    pub registered: Vec<AnonymousParty>,
    /// Requested keys the counterparty did not resolve
    pub unresolved: Vec<AnonymousParty>,
}

/// Reaches claimed owners to have them prove synced keys
struct OwnerCheck {
    messaging: Arc<dyn Messaging>,
    ownership: KeyOwnershipService,
}

/// Initiating side of a mapping sync
pub struct SyncKeyMappingFlow {
    session: Session,
    target: SyncTarget,
    registry: Arc<dyn IdentityRegistry>,
    owner_check: Option<OwnerCheck>,
}

impl SyncKeyMappingFlow {
    /// Exactly one of `transaction` and `parties` must be given
    pub fn new(
        session: Session,
        transaction: Option<Transaction>,
        parties: Option<Vec<AbstractParty>>,
        registry: Arc<dyn IdentityRegistry>,
    ) -> OwnershipResult<Self> {
        let target = match (transaction, parties) {
            (Some(tx), None) => SyncTarget::Transaction(tx),
            (None, Some(parties)) => SyncTarget::Parties(parties),
            (None, None) => {
                return Err(OwnershipError::invalid_argument(
                    "neither a transaction nor a list of parties was supplied",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(OwnershipError::invalid_argument(
                    "both a transaction and a list of parties were supplied",
                ))
            }
        };

        Ok(SyncKeyMappingFlow {
            session,
            target,
            registry,
            owner_check: None,
        })
    }

    pub fn for_transaction(session: Session, transaction: Transaction, registry: Arc<dyn IdentityRegistry>) -> Self {
        SyncKeyMappingFlow {
            session,
            target: SyncTarget::Transaction(transaction),
            registry,
            owner_check: None,
        }
    }

    pub fn for_parties(session: Session, parties: Vec<AbstractParty>, registry: Arc<dyn IdentityRegistry>) -> Self {
        SyncKeyMappingFlow {
            session,
            target: SyncTarget::Parties(parties),
            registry,
            owner_check: None,
        }
    }

    /// Require each claimed owner to prove its key before registration
    pub fn verify_owners(mut self, messaging: Arc<dyn Messaging>, ownership: KeyOwnershipService) -> Self {
        self.owner_check = Some(OwnerCheck { messaging, ownership });
        self
    }

    pub async fn call(mut self) -> OwnershipResult<SyncOutcome> {
        let mut unknown = Vec::new();
        for key in self.target.anonymous_keys() {
            if self.registry.lookup_by_key(&key)?.is_none() {
                unknown.push(key);
            }
        }
        debug!(session = %self.session.id(), keys = unknown.len(), "Requesting key mappings");

        // Sent even when empty so the handler completes.
        let request = SyncRequest { keys: unknown };
        let reply: SyncReply = self.session.send_and_receive(&request).await?;

        let requested: HashSet<PublicKey> = request.keys.iter().copied().collect();
        let mut answered = HashSet::new();
        for mapping in &reply.mappings {
            if !requested.contains(&mapping.key) {
                return Err(OwnershipError::malformed(format!(
                    "mapping for key {} which was not requested",
                    mapping.key.fingerprint()
                )));
            }
            if !answered.insert(mapping.key) {
                return Err(OwnershipError::malformed(format!(
                    "key {} mapped more than once",
                    mapping.key.fingerprint()
                )));
            }
        }

        if let Some(check) = &self.owner_check {
            for mapping in &reply.mappings {
                self.verify_owner(check, mapping).await?;
            }
        }

        let batch: Vec<(PublicKey, Party)> = reply
            .mappings
            .iter()
            .map(|mapping| (mapping.key, mapping.party.clone()))
            .collect();
        let outcomes = self.registry.register_mappings(&batch)?;
        let added = outcomes.iter().filter(|o| **o == Registration::Added).count();
        counter!(KEY_MAPPINGS_REGISTERED, "source" => "sync").increment(added as u64);

        let mut outcome = SyncOutcome {
            registered: batch.iter().map(|(key, _)| AnonymousParty::new(*key)).collect(),
            unresolved: Vec::new(),
        };
        outcome.unresolved = request
            .keys
            .into_iter()
            .filter(|key| !answered.contains(key))
            .map(AnonymousParty::new)
            .collect();

        info!(
            session = %self.session.id(),
            counterparty = %self.session.counterparty(),
            registered = outcome.registered.len(),
            unresolved = outcome.unresolved.len(),
            "Key mapping sync complete"
        );
        Ok(outcome)
    }

    async fn verify_owner(&self, check: &OwnerCheck, mapping: &KeyMapping) -> OwnershipResult<()> {
        let claimed = &mapping.party;
        if let Some(known) = self.registry.lookup_by_name(claimed.name())? {
            if known != *claimed {
                return Err(OwnershipError::malformed(format!(
                    "mapping names {} with a legal key other than the registered one",
                    claimed.name()
                )));
            }
        }

        // Only the key store can vouch for a key claimed to be ours
        if claimed.name() == self.session.local().name() {
            return if check.ownership.keystore().contains(&mapping.key)? {
                Ok(())
            } else {
                Err(CryptoError::UnknownKey(mapping.key).into())
            };
        }

        let session = check.messaging.initiate(claimed, FlowKind::VerifyAndAddKey).await?;
        RequestKeyFlow::new(
            session,
            KeyOwnershipRequest::KnownKey(mapping.key),
            check.ownership.clone(),
            Arc::clone(&self.registry),
        )
        .verify()
        .await?;
        debug!(key = %mapping.key.fingerprint(), owner = %claimed, "Synced mapping proven by owner");
        Ok(())
    }
}

/// Responding side of a mapping sync
pub struct SyncKeyMappingHandler {
    session: Session,
    registry: Arc<dyn IdentityRegistry>,
    policy: Arc<dyn DisclosurePolicy>,
}

impl SyncKeyMappingHandler {
    pub fn new(session: Session, registry: Arc<dyn IdentityRegistry>, policy: Arc<dyn DisclosurePolicy>) -> Self {
        SyncKeyMappingHandler {
            session,
            registry,
            policy,
        }
    }

    /// Answer one sync request; returns the number of mappings disclosed
    pub async fn call(mut self) -> OwnershipResult<usize> {
        let request: SyncRequest = self.session.receive().await?;
        let requester = self.session.counterparty().clone();

        let mut mappings = Vec::new();
        let mut withheld = 0usize;
        for key in request.keys {
            let Some(owner) = self.registry.lookup_by_key(&key)? else {
                continue;
            };
            if self.policy.may_disclose(&requester, &key, &owner) {
                mappings.push(KeyMapping { key, party: owner });
            } else {
                withheld += 1;
            }
        }

        let disclosed = mappings.len();
        self.session.send(&SyncReply { mappings }).await?;

        counter!(SYNC_MAPPINGS_DISCLOSED).increment(disclosed as u64);
        counter!(SYNC_MAPPINGS_WITHHELD).increment(withheld as u64);
        debug!(
            session = %self.session.id(),
            requester = %requester,
            disclosed,
            withheld,
            "Answered key mapping sync"
        );
        Ok(disclosed)
    }
}
