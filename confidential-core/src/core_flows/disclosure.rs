//! Disclosure policies for mapping sync
//!
//! A sync responder resolves every key it is asked about, then asks its
//! policy whether each resolved mapping may be handed to the requester.

use crate::core_identity::{Party, PartyName, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Decides which resolved mappings a sync responder returns
pub trait DisclosurePolicy: Send + Sync {
    /// May `requester` learn that `key` belongs to `owner`?
    fn may_disclose(&self, requester: &Party, key: &PublicKey, owner: &Party) -> bool;
}

/// Return every resolved mapping
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscloseAll;

impl DisclosurePolicy for DiscloseAll {
    fn may_disclose(&self, _requester: &Party, _key: &PublicKey, _owner: &Party) -> bool {
        true
    }
}

/// Return only mappings for keys the local node owns
#[derive(Debug, Clone)]
pub struct DiscloseOwnKeys {
    local: PartyName,
}

impl DiscloseOwnKeys {
    pub fn new(local: PartyName) -> Self {
        DiscloseOwnKeys { local }
    }
}

impl DisclosurePolicy for DiscloseOwnKeys {
    fn may_disclose(&self, _requester: &Party, _key: &PublicKey, owner: &Party) -> bool {
        owner.name() == &self.local
    }
}

/// Return nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscloseNone;

impl DisclosurePolicy for DiscloseNone {
    fn may_disclose(&self, _requester: &Party, _key: &PublicKey, _owner: &Party) -> bool {
        false
    }
}

/// Configurable choice of built-in policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisclosureMode {
    #[default]
    All,
    OwnKeys,
    None,
}

impl DisclosureMode {
    /// Build the policy for a node whose identity is `local`
    pub fn into_policy(self, local: &Party) -> Arc<dyn DisclosurePolicy> {
        match self {
            DisclosureMode::All => Arc::new(DiscloseAll),
            DisclosureMode::OwnKeys => Arc::new(DiscloseOwnKeys::new(local.name().clone())),
            DisclosureMode::None => Arc::new(DiscloseNone),
        }
    }
}

impl FromStr for DisclosureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(DisclosureMode::All),
            "own-keys" | "own_keys" => Ok(DisclosureMode::OwnKeys),
            "none" => Ok(DisclosureMode::None),
            _ => Err(format!("Invalid disclosure mode: {}", s)),
        }
    }
}

impl fmt::Display for DisclosureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisclosureMode::All => "all",
            DisclosureMode::OwnKeys => "own-keys",
            DisclosureMode::None => "none",
        };
        f.write_str(s)
    }
}
