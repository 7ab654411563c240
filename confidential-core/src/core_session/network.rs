//! Session messaging substrate
//!
//! [`Messaging::initiate`] opens a session to a counterparty for a given
//! flow. The counterparty receives an [`InboundSession`] tagged with the same
//! [`FlowKind`] and starts the matching responder.
//!
//! [`InMemoryNetwork`] routes initiations between nodes living in one process.

use super::session::{Session, SessionSettings};
use super::SessionError;
use crate::core_identity::{Party, PartyName};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Protocol a session was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    RequestKeyForExternalId,
    VerifyAndAddKey,
    RequestKey,
    SyncKeyMapping,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowKind::RequestKeyForExternalId => "request-key-for-external-id",
            FlowKind::VerifyAndAddKey => "verify-and-add-key",
            FlowKind::RequestKey => "request-key",
            FlowKind::SyncKeyMapping => "sync-key-mapping",
        };
        f.write_str(name)
    }
}

/// Session opened by a remote initiator
#[derive(Debug)]
pub struct InboundSession {
    pub flow: FlowKind,
    pub session: Session,
}

/// Opens sessions to counterparties
#[async_trait]
pub trait Messaging: Send + Sync {
    async fn initiate(&self, counterparty: &Party, flow: FlowKind) -> Result<Session, SessionError>;
}

/// Capacity of each node's inbound session queue
const INBOUND_QUEUE: usize = 64;

struct Endpoint {
    inbound: mpsc::Sender<InboundSession>,
    settings: SessionSettings,
}

/// In-process network of nodes
///
/// The network's settings apply to endpoints and handles that do not bring
/// their own.
pub struct InMemoryNetwork {
    endpoints: RwLock<HashMap<PartyName, Endpoint>>,
    settings: SessionSettings,
}

impl InMemoryNetwork {
    pub fn new(settings: SessionSettings) -> Arc<Self> {
        Arc::new(InMemoryNetwork {
            endpoints: RwLock::new(HashMap::new()),
            settings,
        })
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Attach `party`; inbound sessions arrive on the returned receiver
    ///
    /// Re-registering a name replaces the previous endpoint.
    pub async fn register(&self, party: &Party) -> mpsc::Receiver<InboundSession> {
        self.register_with(party, self.settings).await
    }

    /// Attach `party`, answering inbound sessions with `settings`
    pub async fn register_with(&self, party: &Party, settings: SessionSettings) -> mpsc::Receiver<InboundSession> {
        let (inbound, rx) = mpsc::channel(INBOUND_QUEUE);
        self.endpoints
            .write()
            .await
            .insert(party.name().clone(), Endpoint { inbound, settings });
        debug!(party = %party, timeout = ?settings.receive_timeout, "Registered on network");
        rx
    }

    /// Detach `name`; later initiations to it fail
    pub async fn deregister(&self, name: &PartyName) {
        self.endpoints.write().await.remove(name);
    }

    /// Messaging handle acting on behalf of `local`
    pub fn handle_for(self: &Arc<Self>, local: Party) -> NetworkHandle {
        self.handle_with(local, self.settings)
    }

    /// Messaging handle whose sessions use `settings` on the initiating end
    pub fn handle_with(self: &Arc<Self>, local: Party, settings: SessionSettings) -> NetworkHandle {
        NetworkHandle {
            network: Arc::clone(self),
            local,
            settings,
        }
    }

    async fn open(
        &self,
        initiator: &Party,
        settings: SessionSettings,
        counterparty: &Party,
        flow: FlowKind,
    ) -> Result<Session, SessionError> {
        let (endpoint, responder_settings) = self
            .endpoints
            .read()
            .await
            .get(counterparty.name())
            .map(|endpoint| (endpoint.inbound.clone(), endpoint.settings))
            .ok_or_else(|| SessionError::UnknownParty(counterparty.name().clone()))?;

        let (initiator_end, responder_end) =
            Session::pair_with(initiator.clone(), settings, counterparty.clone(), responder_settings);
        debug!(session = %initiator_end.id(), from = %initiator, to = %counterparty, flow = %flow, "Opening session");

        endpoint
            .send(InboundSession {
                flow,
                session: responder_end,
            })
            .await
            .map_err(|_| SessionError::Closed {
                party: counterparty.name().clone(),
            })?;

        Ok(initiator_end)
    }
}

/// A node's view of an [`InMemoryNetwork`]
#[derive(Clone)]
pub struct NetworkHandle {
    network: Arc<InMemoryNetwork>,
    local: Party,
    settings: SessionSettings,
}

impl NetworkHandle {
    pub fn local(&self) -> &Party {
        &self.local
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }
}

#[async_trait]
impl Messaging for NetworkHandle {
    async fn initiate(&self, counterparty: &Party, flow: FlowKind) -> Result<Session, SessionError> {
        self.network.open(&self.local, self.settings, counterparty, flow).await
    }
}
