//! Public keyset descriptors.

use serde::{Deserialize, Serialize};

use roster_crypto::{ExchangePublicKey, KeyMetadata, KeyScope, Keyset, SecretKeyset};

/// A public description of a keyset: who it belongs to, which generation,
/// and its public encryption key.
///
/// Manifests appear unencrypted on lockboxes so that any peer can see which
/// lockboxes are addressed to it (`recipient`) and what each one contains
/// (`contents`) without holding any secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyManifest {
    pub metadata: KeyMetadata,
    pub public_key: ExchangePublicKey,
}

impl KeyManifest {
    /// The scope the described keyset belongs to.
    pub fn scope(&self) -> &KeyScope {
        &self.metadata.scope
    }

    /// The generation of the described keyset.
    pub fn generation(&self) -> u32 {
        self.metadata.generation
    }
}

impl From<&Keyset> for KeyManifest {
    fn from(keys: &Keyset) -> Self {
        Self {
            metadata: keys.metadata.clone(),
            public_key: keys.encryption,
        }
    }
}

impl From<&SecretKeyset> for KeyManifest {
    fn from(keys: &SecretKeyset) -> Self {
        Self {
            metadata: keys.metadata.clone(),
            public_key: keys.encryption.public_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_crypto::KeyScope;

    #[test]
    fn test_manifest_from_keyset_has_no_secrets() {
        let secret = SecretKeyset::generate(KeyScope::role("admin"));
        let manifest = KeyManifest::from(&secret);

        assert_eq!(manifest.scope(), &KeyScope::role("admin"));
        assert_eq!(manifest.generation(), 0);
        assert_eq!(manifest.public_key, secret.encryption.public_key());
    }

    #[test]
    fn test_manifest_matches_public_half() {
        let secret = SecretKeyset::generate(KeyScope::user("alice"));
        let from_secret = KeyManifest::from(&secret);
        let from_public = KeyManifest::from(&secret.public());
        assert_eq!(from_secret, from_public);
    }
}
