//! Error types for lockbox operations.

use thiserror::Error;

/// Errors raised while creating or opening lockboxes.
#[derive(Debug, Error)]
pub enum LockboxError {
    /// The recipient's key could not unwrap the envelope, or the encrypted
    /// payload was tampered with.
    #[error("could not open lockbox")]
    Decrypt,

    /// Encryption of the envelope failed.
    #[error("could not seal lockbox: {0}")]
    Encrypt(String),

    /// The decrypted payload was not a valid keyset.
    #[error("serialization error: {0}")]
    Serialization(String),
}
