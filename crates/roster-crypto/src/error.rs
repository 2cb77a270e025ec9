//! Error types for Roster crypto operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Authenticated decryption failed: wrong key, or the ciphertext (or its
    /// commitment tag) was tampered with.
    #[error("decryption failed")]
    Decrypt,

    /// Encryption failed (invalid key material).
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// A signature did not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// A public key could not be parsed.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// A chunk was pushed to a stream that has already been finalized.
    #[error("stream encryption error: {0}")]
    StreamEncrypt(String),

    /// Stream decryption failed. See [`StreamDecryptError`] for the cause.
    #[error("stream decryption error: {0}")]
    StreamDecrypt(#[from] StreamDecryptError),

    /// CBOR encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors specific to decrypting a chunked byte stream.
///
/// Distinct from [`CryptoError::Decrypt`] so callers can tell a failed
/// one-shot decryption from a corrupt or truncated stream.
#[derive(Debug, Error)]
pub enum StreamDecryptError {
    /// A chunk carried a tag byte that is neither Message nor Final.
    #[error("unrecognized chunk tag: {0:#04x}")]
    UnknownTag(u8),

    /// A chunk failed authenticated decryption (tampering or reordering).
    #[error("chunk failed authentication")]
    BadChunk,

    /// The stream ended before a Final chunk was observed.
    #[error("stream truncated before final chunk")]
    Truncated,

    /// A chunk arrived after the Final chunk.
    #[error("chunk received after final chunk")]
    AfterFinal,

    /// A chunk was too short to contain a tag byte and ciphertext.
    #[error("chunk too short")]
    TooShort,
}
