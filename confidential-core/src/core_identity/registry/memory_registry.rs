//! In-memory identity registry

use super::{IdentityRegistry, Registration, RegistryError};
use crate::core_identity::keypair::PublicKey;
use crate::core_identity::party::{Party, PartyName};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

fn handle_poison<T>(_err: PoisonError<T>) -> RegistryError {
    RegistryError::Other("Lock poisoned: a thread panicked while holding the lock".to_string())
}

#[derive(Default)]
struct Inner {
    by_key: HashMap<PublicKey, Party>,
    by_name: HashMap<PartyName, Party>,
}

impl Inner {
    fn check_mapping(&self, key: &PublicKey, party: &Party) -> Result<Registration, RegistryError> {
        match self.by_key.get(key) {
            Some(existing) if existing == party => Ok(Registration::AlreadyPresent),
            Some(existing) => Err(RegistryError::MappingConflict {
                key: *key,
                existing: existing.name().clone(),
                attempted: party.name().clone(),
            }),
            None => Ok(Registration::Added),
        }
    }

    // Caller holds the write lock, so check-then-insert is atomic.
    fn insert_mapping(&mut self, key: PublicKey, party: &Party) -> Result<Registration, RegistryError> {
        let outcome = self.check_mapping(&key, party)?;
        if outcome == Registration::Added {
            self.by_key.insert(key, party.clone());
        }
        Ok(outcome)
    }
}

/// In-memory identity registry (non-persistent)
#[derive(Clone, Default)]
pub struct MemoryIdentityRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of key mappings, legal keys included
    pub fn mapping_count(&self) -> Result<usize, RegistryError> {
        Ok(self.inner.read().map_err(handle_poison)?.by_key.len())
    }
}

impl IdentityRegistry for MemoryIdentityRegistry {
    fn lookup_by_key(&self, key: &PublicKey) -> Result<Option<Party>, RegistryError> {
        Ok(self.inner.read().map_err(handle_poison)?.by_key.get(key).cloned())
    }

    fn lookup_by_name(&self, name: &PartyName) -> Result<Option<Party>, RegistryError> {
        Ok(self.inner.read().map_err(handle_poison)?.by_name.get(name).cloned())
    }

    fn register_mapping(&self, key: PublicKey, party: &Party) -> Result<Registration, RegistryError> {
        let outcome = self.inner.write().map_err(handle_poison)?.insert_mapping(key, party)?;
        if outcome == Registration::Added {
            debug!(key = %key.fingerprint(), party = %party, "Registered key mapping");
        }
        Ok(outcome)
    }

    fn register_mappings(&self, mappings: &[(PublicKey, Party)]) -> Result<Vec<Registration>, RegistryError> {
        let mut inner = self.inner.write().map_err(handle_poison)?;

        let mut staged: HashMap<PublicKey, &Party> = HashMap::new();
        let mut outcomes = Vec::with_capacity(mappings.len());
        for (key, party) in mappings {
            let outcome = match staged.get(key) {
                Some(earlier) if *earlier == party => Registration::AlreadyPresent,
                Some(earlier) => {
                    return Err(RegistryError::MappingConflict {
                        key: *key,
                        existing: earlier.name().clone(),
                        attempted: party.name().clone(),
                    })
                }
                None => inner.check_mapping(key, party)?,
            };
            if outcome == Registration::Added {
                staged.insert(*key, party);
            }
            outcomes.push(outcome);
        }

        for (key, party) in staged {
            inner.by_key.insert(key, party.clone());
            debug!(key = %key.fingerprint(), party = %party, "Registered key mapping");
        }
        Ok(outcomes)
    }

    fn register_party(&self, party: &Party) -> Result<Registration, RegistryError> {
        let mut inner = self.inner.write().map_err(handle_poison)?;

        if let Some(existing) = inner.by_name.get(party.name()) {
            if existing != party {
                return Err(RegistryError::NameConflict(party.name().clone()));
            }
        }

        let outcome = inner.insert_mapping(*party.owning_key(), party)?;
        inner.by_name.insert(party.name().clone(), party.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_identity::party::AnonymousParty;
    use crate::core_identity::{AbstractParty, Keypair};

    fn party(name: &str) -> Party {
        Party::new(PartyName::new(name), Keypair::generate().public_key())
    }

    #[test]
    fn test_register_mapping_is_idempotent() {
        let registry = MemoryIdentityRegistry::new();
        let bob = party("bob");
        let key = Keypair::generate().public_key();

        assert_eq!(registry.register_mapping(key, &bob).unwrap(), Registration::Added);
        assert_eq!(
            registry.register_mapping(key, &bob).unwrap(),
            Registration::AlreadyPresent
        );
        assert_eq!(registry.mapping_count().unwrap(), 1);
        assert_eq!(registry.lookup_by_key(&key).unwrap(), Some(bob));
    }

    #[test]
    fn test_conflicting_mapping_rejected() {
        let registry = MemoryIdentityRegistry::new();
        let bob = party("bob");
        let carol = party("carol");
        let key = Keypair::generate().public_key();

        registry.register_mapping(key, &bob).unwrap();
        let err = registry.register_mapping(key, &carol).unwrap_err();

        assert!(matches!(
            err,
            RegistryError::MappingConflict { ref existing, ref attempted, .. }
                if existing.as_str() == "bob" && attempted.as_str() == "carol"
        ));
        assert_eq!(registry.lookup_by_key(&key).unwrap(), Some(bob));
    }

    #[test]
    fn test_register_mappings_all_or_nothing() {
        let registry = MemoryIdentityRegistry::new();
        let bob = party("bob");
        let carol = party("carol");
        let (k1, k2, k3) = (
            Keypair::generate().public_key(),
            Keypair::generate().public_key(),
            Keypair::generate().public_key(),
        );
        registry.register_mapping(k3, &carol).unwrap();

        // k3 conflicts, so k1 and k2 must not be written either
        let err = registry
            .register_mappings(&[(k1, bob.clone()), (k2, bob.clone()), (k3, bob.clone())])
            .unwrap_err();
        assert!(matches!(err, RegistryError::MappingConflict { key, .. } if key == k3));
        assert_eq!(registry.lookup_by_key(&k1).unwrap(), None);
        assert_eq!(registry.lookup_by_key(&k2).unwrap(), None);
        assert_eq!(registry.mapping_count().unwrap(), 1);

        let outcomes = registry
            .register_mappings(&[(k1, bob.clone()), (k3, carol.clone()), (k1, bob.clone())])
            .unwrap();
        assert_eq!(
            outcomes,
            vec![Registration::Added, Registration::AlreadyPresent, Registration::AlreadyPresent]
        );
        assert_eq!(registry.lookup_by_key(&k1).unwrap(), Some(bob));
    }

    #[test]
    fn test_register_mappings_conflict_within_batch() {
        let registry = MemoryIdentityRegistry::new();
        let key = Keypair::generate().public_key();

        let err = registry
            .register_mappings(&[(key, party("bob")), (key, party("carol"))])
            .unwrap_err();
        assert!(matches!(err, RegistryError::MappingConflict { .. }));
        assert_eq!(registry.mapping_count().unwrap(), 0);
    }

    #[test]
    fn test_register_party_maps_legal_key_and_name() {
        let registry = MemoryIdentityRegistry::new();
        let alice = party("alice");

        registry.register_party(&alice).unwrap();
        assert_eq!(registry.register_party(&alice).unwrap(), Registration::AlreadyPresent);

        assert_eq!(registry.lookup_by_name(alice.name()).unwrap(), Some(alice.clone()));
        assert_eq!(registry.lookup_by_key(alice.owning_key()).unwrap(), Some(alice));
    }

    #[test]
    fn test_name_reuse_with_other_key_rejected() {
        let registry = MemoryIdentityRegistry::new();
        registry.register_party(&party("alice")).unwrap();

        let err = registry.register_party(&party("alice")).unwrap_err();
        assert!(matches!(err, RegistryError::NameConflict(_)));
    }

    #[test]
    fn test_resolve_abstract_party() {
        let registry = MemoryIdentityRegistry::new();
        let bob = party("bob");
        let confidential = Keypair::generate().public_key();
        registry.register_mapping(confidential, &bob).unwrap();

        let anon = AbstractParty::from(AnonymousParty::new(confidential));
        let unknown = AbstractParty::from(AnonymousParty::new(Keypair::generate().public_key()));

        assert_eq!(registry.resolve(&anon).unwrap(), Some(bob.clone()));
        assert_eq!(registry.resolve(&AbstractParty::from(bob.clone())).unwrap(), Some(bob));
        assert_eq!(registry.resolve(&unknown).unwrap(), None);
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        let registry = MemoryIdentityRegistry::new();
        let key = Keypair::generate().public_key();
        let contenders: Vec<Party> = (0..8).map(|i| party(&format!("p{i}"))).collect();

        let handles: Vec<_> = contenders
            .iter()
            .cloned()
            .map(|p| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.register_mapping(key, &p).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(winners, 1);
        assert!(registry.lookup_by_key(&key).unwrap().is_some());
    }
}
