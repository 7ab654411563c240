//! Identity registry
//!
//! Maps public keys to the well-known parties that own them. A key maps to
//! exactly one party for the registry's lifetime: registering the same mapping
//! twice is a no-op, registering a different party is a conflict.

use crate::core_identity::keypair::PublicKey;
use crate::core_identity::party::{AbstractParty, Party, PartyName};
use thiserror::Error;

pub mod memory_registry;

pub use memory_registry::MemoryIdentityRegistry;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Key {key} already maps to {existing}, refusing to map it to {attempted}")]
    MappingConflict {
        key: PublicKey,
        existing: PartyName,
        attempted: PartyName,
    },

    #[error("Party name {0} is already registered with a different owning key")]
    NameConflict(PartyName),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result of a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The mapping was not present before
    Added,
    /// The identical mapping already existed
    AlreadyPresent,
}

/// Identity registry trait
///
/// `register_mapping` and `register_mappings` must be atomic with respect to
/// concurrent calls racing on the same key.
pub trait IdentityRegistry: Send + Sync {
    /// Well-known party owning `key`
    fn lookup_by_key(&self, key: &PublicKey) -> Result<Option<Party>, RegistryError>;

    /// Well-known party registered under `name`
    fn lookup_by_name(&self, name: &PartyName) -> Result<Option<Party>, RegistryError>;

    /// Record that `party` owns `key`
    fn register_mapping(&self, key: PublicKey, party: &Party) -> Result<Registration, RegistryError>;

    /// Record several mappings at once
    ///
    /// Every mapping is checked before any is written: on a conflict nothing
    /// is registered. Outcomes are returned in input order.
    fn register_mappings(&self, mappings: &[(PublicKey, Party)]) -> Result<Vec<Registration>, RegistryError>;

    /// Make a well-known party known, including its legal key
    fn register_party(&self, party: &Party) -> Result<Registration, RegistryError>;

    /// Resolve any party to its well-known identity
    fn resolve(&self, party: &AbstractParty) -> Result<Option<Party>, RegistryError> {
        match party {
            AbstractParty::WellKnown(party) => Ok(Some(party.clone())),
            AbstractParty::Anonymous(anon) => self.lookup_by_key(anon.owning_key()),
        }
    }
}
