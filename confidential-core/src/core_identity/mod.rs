//! Identity management module
//!
//! - `keypair`: Ed25519 keys and signatures
//! - `party`: well-known and anonymous parties
//! - `keystore`: keys this node privately holds
//! - `registry`: public key to well-known party mappings

pub mod keypair;
pub mod keystore;
pub mod party;
pub mod registry;

pub use keypair::{KeyError, Keypair, PublicKey, Signature};
pub use keystore::{Keystore, KeystoreError, MemoryKeystore};
pub use party::{AbstractParty, AnonymousParty, Party, PartyName};
pub use registry::{IdentityRegistry, MemoryIdentityRegistry, Registration, RegistryError};
