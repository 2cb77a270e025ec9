//! Lockbox creation, opening, and rotation.

use serde::{Deserialize, Serialize};

use roster_crypto::{
    EphemeralExchangeKeypair, KeyMetadata, KeyScope, Keyset, Nonce24, SecretKeyset,
};

use crate::error::LockboxError;
use crate::manifest::KeyManifest;

/// An encrypted container granting one recipient access to one keyset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockbox {
    /// The one-time public key the envelope was sealed with.
    pub encryption_key: KeyManifest,

    /// Who can open this lockbox.
    pub recipient: KeyManifest,

    /// What is inside (public manifest, unencrypted for discoverability).
    pub contents: KeyManifest,

    /// Nonce for the encrypted payload.
    pub nonce: Nonce24,

    /// The contents keyset's secret material, encrypted.
    pub encrypted_payload: Vec<u8>,
}

impl Lockbox {
    /// Whether this lockbox is addressed to the holder of `keys`.
    pub fn is_addressed_to(&self, keys: &Keyset) -> bool {
        self.recipient.metadata == keys.metadata
            && self.recipient.public_key == keys.encryption
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LockboxError> {
        ciborium::from_reader(bytes).map_err(|e| LockboxError::Serialization(e.to_string()))
    }
}

/// Envelope-encrypt a secret keyset for a recipient.
pub fn create(contents: &SecretKeyset, recipient: &Keyset) -> Result<Lockbox, LockboxError> {
    create_for_manifest(contents, KeyManifest::from(recipient))
}

/// Envelope-encrypt a secret keyset for a recipient known only by manifest.
///
/// Used by [`rotate`], where the recipient's full public keyset is not at
/// hand but the old lockbox's recipient descriptor is.
pub fn create_for_manifest(
    contents: &SecretKeyset,
    recipient: KeyManifest,
) -> Result<Lockbox, LockboxError> {
    // One-time key agreement with the recipient's public encryption key.
    let ephemeral = EphemeralExchangeKeypair::generate();
    let ephemeral_public = ephemeral.public_key();
    let shared = ephemeral.diffie_hellman(&recipient.public_key);

    // Bind the wrap key to the recipient so the same envelope cannot be
    // re-addressed.
    let context = recipient.public_key.as_bytes();
    let wrap_key = shared.derive_key(context);

    let nonce = Nonce24::generate();
    let encrypted_payload = wrap_key
        .encrypt(&contents.to_bytes(), &nonce)
        .map_err(|e| LockboxError::Encrypt(e.to_string()))?;

    Ok(Lockbox {
        encryption_key: KeyManifest {
            metadata: KeyMetadata::new(KeyScope::ephemeral()),
            public_key: ephemeral_public,
        },
        recipient,
        contents: KeyManifest::from(contents),
        nonce,
        encrypted_payload,
    })
}

/// Open a lockbox with the recipient's secret keyset.
///
/// Fails with [`LockboxError::Decrypt`] if the keys are wrong or the
/// payload was tampered with.
pub fn open(lockbox: &Lockbox, recipient: &SecretKeyset) -> Result<SecretKeyset, LockboxError> {
    let shared = recipient
        .encryption
        .diffie_hellman(&lockbox.encryption_key.public_key);

    let context = lockbox.recipient.public_key.as_bytes();
    let wrap_key = shared.derive_key(context);

    let payload = wrap_key
        .decrypt(&lockbox.encrypted_payload, &lockbox.nonce)
        .map_err(|_| LockboxError::Decrypt)?;

    SecretKeyset::from_bytes(&payload).map_err(|e| LockboxError::Serialization(e.to_string()))
}

/// Re-address fresh contents to the same recipient as an existing lockbox.
///
/// Used when a keyset's generation increases but the recipient set is
/// unchanged; the old secret is not needed.
pub fn rotate(old_lockbox: &Lockbox, new_contents: &SecretKeyset) -> Result<Lockbox, LockboxError> {
    create_for_manifest(new_contents, old_lockbox.recipient.clone())
}
