//! Test fixtures for creating common test objects
//!
//! Provides builder patterns and factory functions for parties and networks
//! of started nodes.

use crate::config::Config;
use crate::core_flows::DisclosureMode;
use crate::core_identity::{AnonymousParty, Keypair, Party, PartyName};
use crate::core_session::{InMemoryNetwork, SessionSettings};
use crate::node::Node;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Keypair derived from a one-byte seed
pub fn test_keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

/// Well-known party with a random key
pub fn test_party(name: &str) -> Party {
    Party::new(PartyName::new(name), Keypair::generate().public_key())
}

/// Anonymous party for a key nobody holds
pub fn stray_anonymous_party() -> AnonymousParty {
    AnonymousParty::new(Keypair::generate().public_key())
}

/// Builder for a network of started nodes that all know each other
pub struct TestNetworkBuilder {
    nodes: Vec<(String, DisclosureMode)>,
    settings: SessionSettings,
}

impl Default for TestNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNetworkBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            settings: SessionSettings {
                receive_timeout: Duration::from_secs(5),
                buffer: 16,
            },
        }
    }

    pub fn with_node(self, name: impl Into<String>) -> Self {
        self.with_node_disclosing(name, DisclosureMode::All)
    }

    pub fn with_node_disclosing(mut self, name: impl Into<String>, disclosure: DisclosureMode) -> Self {
        self.nodes.push((name.into(), disclosure));
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.settings.receive_timeout = timeout;
        self
    }

    pub async fn build(self) -> TestNetwork {
        let network = InMemoryNetwork::new(self.settings);
        let mut nodes = HashMap::new();

        for (name, disclosure) in self.nodes {
            let mut config = Config::default();
            config.node.name = name.clone();
            config.sync.disclosure = disclosure;
            config.protocol.receive_timeout = self.settings.receive_timeout;
            config.protocol.session_buffer = self.settings.buffer;

            let node = Node::start(&config, &network)
                .await
                .expect("Failed to start test node");
            nodes.insert(name, node);
        }

        for node in nodes.values() {
            for other in nodes.values() {
                node.introduce(other.identity())
                    .expect("Failed to introduce test nodes");
            }
        }

        TestNetwork { network, nodes }
    }
}

/// Started nodes on one in-memory network
pub struct TestNetwork {
    pub network: Arc<InMemoryNetwork>,
    nodes: HashMap<String, Arc<Node>>,
}

impl TestNetwork {
    pub fn node(&self, name: &str) -> Arc<Node> {
        self.nodes
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("No test node named {}", name))
    }

    pub fn party(&self, name: &str) -> Party {
        self.node(name).identity().clone()
    }
}
