//! Party identities
//!
//! A [`Party`] is a well-known identity: a name plus its legal owning key.
//! An [`AnonymousParty`] is only a public key; it says nothing about who
//! holds the private half until an identity registry resolves it.

use super::keypair::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known name of a network participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyName(String);

impl PartyName {
    pub fn new(name: impl Into<String>) -> Self {
        PartyName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartyName {
    fn from(name: &str) -> Self {
        PartyName::new(name)
    }
}

/// Well-known party
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    name: PartyName,
    owning_key: PublicKey,
}

impl Party {
    pub fn new(name: PartyName, owning_key: PublicKey) -> Self {
        Party { name, owning_key }
    }

    pub fn name(&self) -> &PartyName {
        &self.name
    }

    pub fn owning_key(&self) -> &PublicKey {
        &self.owning_key
    }

    /// Present this party's legal key without its name
    pub fn anonymise(&self) -> AnonymousParty {
        AnonymousParty::new(self.owning_key)
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Confidential identity: a public key standing in for a party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnonymousParty {
    owning_key: PublicKey,
}

impl AnonymousParty {
    pub fn new(owning_key: PublicKey) -> Self {
        AnonymousParty { owning_key }
    }

    pub fn owning_key(&self) -> &PublicKey {
        &self.owning_key
    }
}

impl fmt::Display for AnonymousParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Anonymous({})", self.owning_key.fingerprint())
    }
}

/// Either kind of party, as found in transaction participant lists
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbstractParty {
    WellKnown(Party),
    Anonymous(AnonymousParty),
}

impl AbstractParty {
    pub fn owning_key(&self) -> &PublicKey {
        match self {
            AbstractParty::WellKnown(party) => party.owning_key(),
            AbstractParty::Anonymous(anon) => anon.owning_key(),
        }
    }

    pub fn as_anonymous(&self) -> Option<&AnonymousParty> {
        match self {
            AbstractParty::Anonymous(anon) => Some(anon),
            AbstractParty::WellKnown(_) => None,
        }
    }
}

impl From<Party> for AbstractParty {
    fn from(party: Party) -> Self {
        AbstractParty::WellKnown(party)
    }
}

impl From<AnonymousParty> for AbstractParty {
    fn from(anon: AnonymousParty) -> Self {
        AbstractParty::Anonymous(anon)
    }
}
