//! # Roster Crypto
//!
//! Cryptographic primitives for Roster: hashing, signing, key agreement,
//! authenticated symmetric encryption, a chunked stream cipher, and the
//! scoped, generation-versioned keysets all higher layers share.
//!
//! This crate contains no I/O and no global state. Every operation takes its
//! key material as an explicit argument and returns a new value.
//!
//! ## Key Types
//!
//! - [`Hash32`] - 32-byte Blake3 content hash
//! - [`SigningKeypair`] / [`SigningPublicKey`] - Ed25519 signing
//! - [`ExchangeSecretKey`] / [`ExchangePublicKey`] - X25519 key agreement
//! - [`SecretKeyset`] / [`Keyset`] - named, generation-versioned key bundles
//! - [`Keyring`] - all known generations of the keysets an actor holds
//!
//! ## Symmetric encryption
//!
//! [`symmetric::encrypt_bytes`] stretches a password into a key, encrypts
//! with XChaCha20-Poly1305, and adds a keyed commitment tag over the nonce
//! and MAC so that a ciphertext cannot be valid under two different keys.
//! [`stream`] provides the chunked variant for unbounded byte sequences.

pub mod error;
pub mod exchange;
pub mod hash;
pub mod keyring;
pub mod keyset;
pub mod sign;
pub mod stream;
pub mod symmetric;

pub use error::{CryptoError, StreamDecryptError};
pub use exchange::{
    EphemeralExchangeKeypair, ExchangePublicKey, ExchangeSecretKey, Nonce24, SharedKey,
    SymmetricKey,
};
pub use hash::Hash32;
pub use keyring::Keyring;
pub use keyset::{KeyMetadata, KeyScope, KeyType, Keyset, SecretKeyset};
pub use sign::{Signature, SigningKeypair, SigningPublicKey};
pub use stream::{
    decrypt_bytes_stream, encrypt_bytes_stream, StreamChunk, StreamDecryptor, StreamEncryptor,
    STREAM_HEADER_BYTES,
};
pub use symmetric::{decrypt_bytes, encrypt_bytes, stretch};
