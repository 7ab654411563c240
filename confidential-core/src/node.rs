//! Node: one party's services, its network endpoint, and its responders
//!
//! A started node answers every inbound session in its own task, dispatching
//! on the session's [`FlowKind`]. Initiating calls open a session to the
//! counterparty and drive the matching flow to completion.

use crate::config::Config;
use crate::core_flows::{
    DisclosurePolicy, ProvideKeyFlow, RequestKeyFlow, SyncKeyMappingFlow, SyncKeyMappingHandler, SyncOutcome,
};
use crate::core_identity::{
    AbstractParty, AnonymousParty, IdentityRegistry, Keystore, MemoryIdentityRegistry, MemoryKeystore, Party,
    PartyName, PublicKey, Registration,
};
use crate::core_ledger::Transaction;
use crate::core_ownership::{KeyOwnershipRequest, KeyOwnershipService, OwnershipError, OwnershipResult};
use crate::core_session::{FlowKind, InMemoryNetwork, InboundSession, Messaging, Session};
use crate::metrics::INBOUND_SESSIONS;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Services a node's flows run against
#[derive(Clone)]
pub struct NodeServices {
    pub keystore: Arc<dyn Keystore>,
    pub registry: Arc<dyn IdentityRegistry>,
    pub ownership: KeyOwnershipService,
}

impl NodeServices {
    pub fn new(keystore: Arc<dyn Keystore>, registry: Arc<dyn IdentityRegistry>) -> Self {
        let ownership = KeyOwnershipService::new(Arc::clone(&keystore));
        NodeServices {
            keystore,
            registry,
            ownership,
        }
    }

    /// Non-persistent key store and registry
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeystore::new()), Arc::new(MemoryIdentityRegistry::new()))
    }
}

pub struct Node {
    identity: Party,
    services: NodeServices,
    messaging: Arc<dyn Messaging>,
    disclosure: Arc<dyn DisclosurePolicy>,
    verify_mappings: bool,
    network: Arc<InMemoryNetwork>,
}

impl Node {
    /// Start a node with in-memory services
    pub async fn start(config: &Config, network: &Arc<InMemoryNetwork>) -> OwnershipResult<Arc<Node>> {
        Self::start_with_services(config, network, NodeServices::in_memory()).await
    }

    /// Start a node on `network`
    ///
    /// Mints the node's legal key, registers the node's own identity, and
    /// spawns the responder loop for inbound sessions. Sessions on both sides
    /// use the configured protocol settings.
    pub async fn start_with_services(
        config: &Config,
        network: &Arc<InMemoryNetwork>,
        services: NodeServices,
    ) -> OwnershipResult<Arc<Node>> {
        config
            .validate()
            .map_err(|e| OwnershipError::invalid_argument(e.to_string()))?;

        let legal_key = services.keystore.generate_key(None)?;
        let identity = Party::new(PartyName::new(config.node.name.clone()), legal_key);
        services.registry.register_party(&identity)?;

        let settings = config.session_settings();
        let node = Arc::new(Node {
            messaging: Arc::new(network.handle_with(identity.clone(), settings)),
            disclosure: config.sync.disclosure.into_policy(&identity),
            verify_mappings: config.sync.verify_mappings,
            identity,
            services,
            network: Arc::clone(network),
        });

        let inbound = network.register_with(&node.identity, settings).await;
        Arc::clone(&node).spawn_responders(inbound);

        info!(
            party = %node.identity,
            disclosure = %config.sync.disclosure,
            verify_mappings = config.sync.verify_mappings,
            receive_timeout = ?settings.receive_timeout,
            "Node started"
        );
        Ok(node)
    }

    pub fn identity(&self) -> &Party {
        &self.identity
    }

    pub fn services(&self) -> &NodeServices {
        &self.services
    }

    /// Make another well-known party known to this node
    pub fn introduce(&self, other: &Party) -> OwnershipResult<Registration> {
        Ok(self.services.registry.register_party(other)?)
    }

    /// Resolve `party` to a well-known party through this node's registry
    pub fn resolve(&self, party: &AbstractParty) -> OwnershipResult<Option<Party>> {
        Ok(self.services.registry.resolve(party)?)
    }

    /// Ask `counterparty` for a fresh key associated with `external_id`
    pub async fn request_key_for_external_id(
        &self,
        counterparty: &Party,
        external_id: Uuid,
    ) -> OwnershipResult<AnonymousParty> {
        self.request(
            counterparty,
            FlowKind::RequestKeyForExternalId,
            KeyOwnershipRequest::FreshKeyFor(external_id),
        )
        .await
    }

    /// Have `counterparty` prove it owns `key`, then record the mapping
    pub async fn verify_and_add_key(&self, counterparty: &Party, key: PublicKey) -> OwnershipResult<AnonymousParty> {
        self.request(counterparty, FlowKind::VerifyAndAddKey, KeyOwnershipRequest::KnownKey(key))
            .await
    }

    /// Ask `counterparty` for a fresh key with no external id
    pub async fn request_key(&self, counterparty: &Party) -> OwnershipResult<AnonymousParty> {
        self.request(counterparty, FlowKind::RequestKey, KeyOwnershipRequest::AnyFreshKey)
            .await
    }

    /// Learn from `counterparty` who owns the anonymous keys in `transaction`
    pub async fn sync_key_mappings_for_transaction(
        &self,
        counterparty: &Party,
        transaction: Transaction,
    ) -> OwnershipResult<SyncOutcome> {
        let session = self.open(counterparty, FlowKind::SyncKeyMapping).await?;
        let flow = SyncKeyMappingFlow::for_transaction(session, transaction, Arc::clone(&self.services.registry));
        self.sync(flow).await
    }

    /// Learn from `counterparty` who owns the anonymous keys among `parties`
    pub async fn sync_key_mappings(
        &self,
        counterparty: &Party,
        parties: Vec<AbstractParty>,
    ) -> OwnershipResult<SyncOutcome> {
        let session = self.open(counterparty, FlowKind::SyncKeyMapping).await?;
        let flow = SyncKeyMappingFlow::for_parties(session, parties, Arc::clone(&self.services.registry));
        self.sync(flow).await
    }

    /// Detach from the network; the responder loop ends once queued sessions drain
    pub async fn shutdown(&self) {
        self.network.deregister(self.identity.name()).await;
        info!(party = %self.identity, "Node stopped");
    }

    async fn request(
        &self,
        counterparty: &Party,
        flow: FlowKind,
        request: KeyOwnershipRequest,
    ) -> OwnershipResult<AnonymousParty> {
        let session = self.open(counterparty, flow).await?;
        RequestKeyFlow::new(
            session,
            request,
            self.services.ownership.clone(),
            Arc::clone(&self.services.registry),
        )
        .call()
        .await
    }

    async fn sync(&self, flow: SyncKeyMappingFlow) -> OwnershipResult<SyncOutcome> {
        let flow = if self.verify_mappings {
            flow.verify_owners(Arc::clone(&self.messaging), self.services.ownership.clone())
        } else {
            flow
        };
        flow.call().await
    }

    async fn open(&self, counterparty: &Party, flow: FlowKind) -> OwnershipResult<Session> {
        if counterparty.name() == self.identity.name() {
            return Err(OwnershipError::invalid_argument(format!(
                "{} cannot open a {} session with itself",
                self.identity, flow
            )));
        }
        Ok(self.messaging.initiate(counterparty, flow).await?)
    }

    fn spawn_responders(self: Arc<Self>, mut inbound: mpsc::Receiver<InboundSession>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(InboundSession { flow, session }) = inbound.recv().await {
                counter!(INBOUND_SESSIONS, "flow" => flow.to_string()).increment(1);
                let node = Arc::clone(&self);
                tokio::spawn(async move {
                    let id = session.id();
                    if let Err(e) = node.respond(flow, session).await {
                        warn!(session = %id, flow = %flow, error = %e, "Responder failed");
                    }
                });
            }
            debug!(party = %self.identity, "Inbound session queue closed");
        })
    }

    async fn respond(&self, flow: FlowKind, session: Session) -> OwnershipResult<()> {
        debug!(session = %session.id(), from = %session.counterparty(), flow = %flow, "Inbound session");
        match flow {
            FlowKind::RequestKeyForExternalId | FlowKind::VerifyAndAddKey | FlowKind::RequestKey => {
                ProvideKeyFlow::new(
                    session,
                    self.services.ownership.clone(),
                    Arc::clone(&self.services.registry),
                )
                .call()
                .await?;
            }
            FlowKind::SyncKeyMapping => {
                SyncKeyMappingHandler::new(
                    session,
                    Arc::clone(&self.services.registry),
                    Arc::clone(&self.disclosure),
                )
                .call()
                .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_ownership::{ArgumentError, ProtocolError};
    use crate::core_session::SessionSettings;
    use crate::test_utils::{assert_completes_within, test_party};
    use std::time::Duration;

    fn config(name: &str) -> Config {
        let mut config = Config::default();
        config.node.name = name.to_string();
        config
    }

    #[tokio::test]
    async fn test_start_registers_own_identity() {
        let network = InMemoryNetwork::new(SessionSettings::default());
        let node = Node::start(&config("alice"), &network).await.unwrap();

        let me = node.identity().clone();
        assert_eq!(me.name().as_str(), "alice");
        assert!(node.services().keystore.contains(me.owning_key()).unwrap());
        assert_eq!(
            node.services().registry.lookup_by_name(me.name()).unwrap(),
            Some(me.clone())
        );
        assert_eq!(node.resolve(&me.anonymise().into()).unwrap(), Some(me));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let network = InMemoryNetwork::new(SessionSettings::default());
        let result = Node::start(&config(""), &network).await;
        assert!(matches!(result, Err(OwnershipError::Argument(_))));
    }

    #[tokio::test]
    async fn test_configured_timeout_applies_to_sessions() {
        // The network default would wait 30s
        let network = InMemoryNetwork::new(SessionSettings::default());
        let mut config = config("alice");
        config.protocol.receive_timeout = Duration::from_millis(100);
        let node = Node::start(&config, &network).await.unwrap();

        let silent = test_party("silent");
        let mut queue = network.register(&silent).await;
        let hold = tokio::spawn(async move {
            let _inbound = queue.recv().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let err = assert_completes_within(Duration::from_secs(2), node.request_key(&silent)).await.unwrap_err();
        assert!(matches!(
            err,
            OwnershipError::Protocol(ProtocolError::CounterpartyUnresponsive { .. })
        ));
        hold.abort();
    }

    #[tokio::test]
    async fn test_responder_uses_configured_timeout() {
        let network = InMemoryNetwork::new(SessionSettings::default());
        let mut config = config("bob");
        config.protocol.receive_timeout = Duration::from_millis(100);
        let bob = Node::start(&config, &network).await.unwrap();

        // Open a session to bob and never send the request
        let mut session = network
            .handle_for(test_party("alice"))
            .initiate(bob.identity(), FlowKind::RequestKey)
            .await
            .unwrap();
        let closed = assert_completes_within(Duration::from_secs(2), session.receive::<u32>()).await;
        assert!(closed.is_err());
    }

    #[tokio::test]
    async fn test_request_key_from_self_rejected() {
        let network = InMemoryNetwork::new(SessionSettings::default());
        let node = Node::start(&config("alice"), &network).await.unwrap();

        let err = node.request_key(&node.identity().clone()).await.unwrap_err();
        assert!(matches!(err, OwnershipError::Argument(ArgumentError::InvalidArgument(_))));
    }
}
