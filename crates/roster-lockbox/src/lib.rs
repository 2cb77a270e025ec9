//! # Roster Lockbox
//!
//! Envelope encryption of keysets.
//!
//! A [`Lockbox`] grants exactly one recipient access to exactly one secret
//! keyset. The secret material is encrypted under a key derived from a
//! one-time X25519 agreement with the recipient's public encryption key;
//! the recipient and contents descriptors stay in the clear so peers can
//! discover which lockboxes are addressed to them without decrypting
//! anything.
//!
//! On key rotation a lockbox is superseded, never mutated: [`rotate`]
//! re-addresses fresh contents to the old lockbox's recipient, and the old
//! lockbox becomes historical (still openable by whoever held it).

pub mod error;
pub mod lockbox;
pub mod manifest;

pub use error::LockboxError;
pub use lockbox::{create, open, rotate, Lockbox};
pub use manifest::KeyManifest;
