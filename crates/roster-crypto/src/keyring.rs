//! A keyring holds every generation of the keysets an actor knows.
//!
//! Prior generations stay resolvable so historical lockboxes can still be
//! opened after rotation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::keyset::{KeyMetadata, KeyScope, SecretKeyset};

/// All known generations of the keysets an actor holds, indexed by scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyring {
    /// Scope display string -> keysets sorted by generation (ascending).
    keys: BTreeMap<String, Vec<SecretKeyset>>,
}

impl Keyring {
    /// Create an empty keyring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a keyring holding a single keyset.
    pub fn from_keyset(keyset: SecretKeyset) -> Self {
        let mut ring = Self::new();
        ring.add(keyset);
        ring
    }

    /// Add a keyset. Duplicate (scope, generation) entries are ignored.
    pub fn add(&mut self, keyset: SecretKeyset) {
        let entry = self.keys.entry(keyset.scope().to_string()).or_default();
        if entry
            .iter()
            .any(|k| k.generation() == keyset.generation())
        {
            return;
        }
        entry.push(keyset);
        entry.sort_by_key(|k| k.generation());
    }

    /// Get the latest generation for a scope.
    pub fn get(&self, scope: &KeyScope) -> Option<&SecretKeyset> {
        self.keys.get(&scope.to_string())?.last()
    }

    /// Get a specific generation for a scope.
    pub fn get_generation(&self, scope: &KeyScope, generation: u32) -> Option<&SecretKeyset> {
        self.keys
            .get(&scope.to_string())?
            .iter()
            .find(|k| k.generation() == generation)
    }

    /// Get the keyset matching exact metadata.
    pub fn get_by_metadata(&self, metadata: &KeyMetadata) -> Option<&SecretKeyset> {
        self.get_generation(&metadata.scope, metadata.generation)
    }

    /// Whether the keyring holds any generation for a scope.
    pub fn contains(&self, scope: &KeyScope) -> bool {
        self.keys.contains_key(&scope.to_string())
    }

    /// Iterate over every keyset in the ring.
    pub fn iter(&self) -> impl Iterator<Item = &SecretKeyset> {
        self.keys.values().flatten()
    }

    /// Number of keysets (all generations) in the ring.
    pub fn len(&self) -> usize {
        self.keys.values().map(Vec::len).sum()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Extend<SecretKeyset> for Keyring {
    fn extend<T: IntoIterator<Item = SecretKeyset>>(&mut self, iter: T) {
        for keyset in iter {
            self.add(keyset);
        }
    }
}
