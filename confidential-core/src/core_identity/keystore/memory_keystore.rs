//! In-memory keystore

use super::{Keystore, KeystoreError};
use crate::core_identity::keypair::{Keypair, PublicKey, Signature};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Helper to convert poison errors into KeystoreError
fn handle_poison<T>(_err: PoisonError<T>) -> KeystoreError {
    KeystoreError::Other("Lock poisoned: a thread panicked while holding the lock".to_string())
}

struct StoredKey {
    keypair: Keypair,
    external_id: Option<Uuid>,
}

#[derive(Default)]
struct Inner {
    keys: HashMap<PublicKey, StoredKey>,
    by_external_id: HashMap<Uuid, Vec<PublicKey>>,
}

/// In-memory keystore (non-persistent)
#[derive(Clone, Default)]
pub struct MemoryKeystore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryKeystore {
    /// Create a new memory keystore
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an existing keypair
    ///
    /// Importing a key that is already held is a no-op; the key keeps the
    /// external id it was first stored with.
    pub fn import_keypair(
        &self,
        keypair: Keypair,
        external_id: Option<Uuid>,
    ) -> Result<PublicKey, KeystoreError> {
        let public = keypair.public_key();
        let mut inner = self.inner.write().map_err(handle_poison)?;
        if inner.keys.contains_key(&public) {
            return Ok(public);
        }
        if let Some(id) = external_id {
            inner.by_external_id.entry(id).or_default().push(public);
        }
        inner.keys.insert(
            public,
            StoredKey {
                keypair,
                external_id,
            },
        );
        Ok(public)
    }

    /// Number of keys held
    pub fn len(&self) -> Result<usize, KeystoreError> {
        Ok(self.inner.read().map_err(handle_poison)?.keys.len())
    }

    pub fn is_empty(&self) -> Result<bool, KeystoreError> {
        Ok(self.len()? == 0)
    }
}

impl Keystore for MemoryKeystore {
    fn generate_key(&self, external_id: Option<Uuid>) -> Result<PublicKey, KeystoreError> {
        let public = self.import_keypair(Keypair::generate(), external_id)?;
        debug!(key = %public.fingerprint(), external_id = ?external_id, "Generated key");
        Ok(public)
    }

    fn sign(&self, digest: &[u8], key: &PublicKey) -> Result<Signature, KeystoreError> {
        let inner = self.inner.read().map_err(handle_poison)?;
        let stored = inner
            .keys
            .get(key)
            .ok_or(KeystoreError::UnknownKey(*key))?;
        Ok(stored.keypair.sign(digest))
    }

    fn contains(&self, key: &PublicKey) -> Result<bool, KeystoreError> {
        Ok(self.inner.read().map_err(handle_poison)?.keys.contains_key(key))
    }

    fn external_id_of(&self, key: &PublicKey) -> Result<Option<Uuid>, KeystoreError> {
        Ok(self
            .inner
            .read()
            .map_err(handle_poison)?
            .keys
            .get(key)
            .and_then(|stored| stored.external_id))
    }

    fn keys_for_external_id(&self, external_id: &Uuid) -> Result<Vec<PublicKey>, KeystoreError> {
        Ok(self
            .inner
            .read()
            .map_err(handle_poison)?
            .by_external_id
            .get(external_id)
            .cloned()
            .unwrap_or_default())
    }
}
