//! Keystore module
//!
//! Abstract key store API: generate keys this node privately holds and sign
//! with them. Private halves never leave the store.

use crate::core_identity::keypair::{PublicKey, Signature};
use thiserror::Error;
use uuid::Uuid;

pub mod memory_keystore;

pub use memory_keystore::MemoryKeystore;

/// Keystore errors
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("Private key not held for {0}")]
    UnknownKey(PublicKey),

    #[error("Other error: {0}")]
    Other(String),
}

/// Abstract keystore trait
///
/// Implementations serialize concurrent access internally; every method takes
/// `&self` so a store can be shared across protocol tasks behind an `Arc`.
pub trait Keystore: Send + Sync {
    /// Generate a fresh keypair, optionally scoped to an external id
    fn generate_key(&self, external_id: Option<Uuid>) -> Result<PublicKey, KeystoreError>;

    /// Sign `digest` with the private half of `key`
    fn sign(&self, digest: &[u8], key: &PublicKey) -> Result<Signature, KeystoreError>;

    /// Whether this store holds the private half of `key`
    fn contains(&self, key: &PublicKey) -> Result<bool, KeystoreError>;

    /// External id a key was generated for, if any
    fn external_id_of(&self, key: &PublicKey) -> Result<Option<Uuid>, KeystoreError>;

    /// All keys generated for an external id, oldest first
    fn keys_for_external_id(&self, external_id: &Uuid) -> Result<Vec<PublicKey>, KeystoreError>;
}
