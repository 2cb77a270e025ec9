//! Scoped, generation-versioned key bundles.
//!
//! A keyset bundles an Ed25519 signing key, an X25519 exchange key, and a
//! symmetric secret, all bound to a scope (the identity the keys belong to)
//! and a generation counter that strictly increases on rotation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::exchange::{ExchangePublicKey, ExchangeSecretKey, SymmetricKey};
use crate::sign::{SigningKeypair, SigningPublicKey};

/// The kind of identity a keyset is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// The team itself.
    Team,
    /// A named role (e.g. "admin").
    Role,
    /// A user.
    User,
    /// A single device belonging to a user.
    Device,
    /// A server.
    Server,
    /// A one-time key (lockbox envelopes).
    Ephemeral,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyType::Team => "team",
            KeyType::Role => "role",
            KeyType::User => "user",
            KeyType::Device => "device",
            KeyType::Server => "server",
            KeyType::Ephemeral => "ephemeral",
        };
        write!(f, "{s}")
    }
}

/// The identity a keyset belongs to: a type plus a name.
///
/// The name is the role name, user id, device id, or server host; for team
/// and ephemeral scopes it is empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyScope {
    pub key_type: KeyType,
    pub name: String,
}

impl KeyScope {
    /// Create a new scope.
    pub fn new(key_type: KeyType, name: impl Into<String>) -> Self {
        Self {
            key_type,
            name: name.into(),
        }
    }

    /// The team scope.
    pub fn team() -> Self {
        Self::new(KeyType::Team, "")
    }

    /// A role scope.
    pub fn role(name: impl Into<String>) -> Self {
        Self::new(KeyType::Role, name)
    }

    /// A user scope.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::new(KeyType::User, user_id)
    }

    /// A device scope.
    pub fn device(device_id: impl Into<String>) -> Self {
        Self::new(KeyType::Device, device_id)
    }

    /// A server scope.
    pub fn server(host: impl Into<String>) -> Self {
        Self::new(KeyType::Server, host)
    }

    /// The ephemeral scope (one-time lockbox keys).
    pub fn ephemeral() -> Self {
        Self::new(KeyType::Ephemeral, "")
    }
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key_type, self.name)
    }
}

/// A scope plus a generation counter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub scope: KeyScope,
    pub generation: u32,
}

impl KeyMetadata {
    /// Metadata for a new (generation 0) keyset.
    pub fn new(scope: KeyScope) -> Self {
        Self {
            scope,
            generation: 0,
        }
    }
}

/// The public half of a keyset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyset {
    pub metadata: KeyMetadata,
    pub signing: SigningPublicKey,
    pub encryption: ExchangePublicKey,
}

impl Keyset {
    /// The scope this keyset belongs to.
    pub fn scope(&self) -> &KeyScope {
        &self.metadata.scope
    }

    /// The generation of this keyset.
    pub fn generation(&self) -> u32 {
        self.metadata.generation
    }
}

/// A complete keyset including secret material.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "SecretKeysetData", into = "SecretKeysetData")]
pub struct SecretKeyset {
    pub metadata: KeyMetadata,
    pub signing: SigningKeypair,
    pub encryption: ExchangeSecretKey,
    pub secret: SymmetricKey,
}

/// Serialization mirror: a keyset's secret material is fully determined by
/// its seeds.
#[derive(Serialize, Deserialize)]
struct SecretKeysetData {
    metadata: KeyMetadata,
    signing_seed: [u8; 32],
    encryption_seed: [u8; 32],
    secret: [u8; 32],
}

impl From<SecretKeysetData> for SecretKeyset {
    fn from(data: SecretKeysetData) -> Self {
        Self {
            metadata: data.metadata,
            signing: SigningKeypair::from_seed(&data.signing_seed),
            encryption: ExchangeSecretKey::from_bytes(data.encryption_seed),
            secret: SymmetricKey::from_bytes(data.secret),
        }
    }
}

impl From<SecretKeyset> for SecretKeysetData {
    fn from(keyset: SecretKeyset) -> Self {
        Self {
            metadata: keyset.metadata,
            signing_seed: keyset.signing.seed(),
            encryption_seed: keyset.encryption.to_bytes(),
            secret: *keyset.secret.as_bytes(),
        }
    }
}

impl SecretKeyset {
    /// Generate a fresh random keyset for a scope (generation 0).
    pub fn generate(scope: KeyScope) -> Self {
        Self {
            metadata: KeyMetadata::new(scope),
            signing: SigningKeypair::generate(),
            encryption: ExchangeSecretKey::generate(),
            secret: SymmetricKey::generate(),
        }
    }

    /// Derive a keyset deterministically from a seed string.
    ///
    /// The same (scope, seed) pair always yields the same key material.
    pub fn from_seed(scope: KeyScope, seed: &str) -> Self {
        let scope_tag = scope.to_string();
        let derive = |context: &str| -> [u8; 32] {
            let mut hasher = blake3::Hasher::new_derive_key(context);
            hasher.update(seed.as_bytes());
            hasher.update(scope_tag.as_bytes());
            *hasher.finalize().as_bytes()
        };

        Self {
            signing: SigningKeypair::from_seed(&derive("roster-crypto-v1-keyset-signing")),
            encryption: ExchangeSecretKey::from_bytes(derive("roster-crypto-v1-keyset-exchange")),
            secret: SymmetricKey::from_bytes(derive("roster-crypto-v1-keyset-secret")),
            metadata: KeyMetadata::new(scope),
        }
    }

    /// Produce the next generation of this keyset: same scope, fresh random
    /// key material, generation incremented.
    pub fn rotate(&self) -> Self {
        let mut next = Self::generate(self.metadata.scope.clone());
        next.metadata.generation = self.metadata.generation + 1;
        next
    }

    /// The public half of this keyset.
    pub fn public(&self) -> Keyset {
        Keyset {
            metadata: self.metadata.clone(),
            signing: self.signing.public_key(),
            encryption: self.encryption.public_key(),
        }
    }

    /// The scope this keyset belongs to.
    pub fn scope(&self) -> &KeyScope {
        &self.metadata.scope
    }

    /// The generation of this keyset.
    pub fn generation(&self) -> u32 {
        self.metadata.generation
    }

    /// Serialize to CBOR bytes (for lockbox payloads).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::error::CryptoError> {
        ciborium::from_reader(bytes)
            .map_err(|e| crate::error::CryptoError::Serialization(e.to_string()))
    }
}

impl PartialEq for SecretKeyset {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata
            && self.signing.seed() == other.signing.seed()
            && self.encryption.to_bytes() == other.encryption.to_bytes()
            && self.secret.as_bytes() == other.secret.as_bytes()
    }
}

impl Eq for SecretKeyset {}

impl fmt::Debug for SecretKeyset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SecretKeyset({} gen {})",
            self.metadata.scope, self.metadata.generation
        )
    }
}
