//! Invitations derived from a shared secret seed.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use roster_crypto::{SigningKeypair, SigningPublicKey};

use crate::error::InviteError;

/// Length of the derived invitation id in bytes (before hex encoding).
const ID_BYTES: usize = 15;

/// Generate a random invitation seed.
///
/// The seed is the only secret in the protocol; it is transmitted out of
/// band and never appears in the graph.
pub fn random_seed() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Normalize a seed before deriving anything from it, so that incidental
/// whitespace from manual entry does not change the derived keys.
pub fn normalize_seed(seed: &str) -> String {
    seed.trim().to_string()
}

/// Derive the public, non-secret invitation id from a seed.
///
/// One-way: the id reveals nothing about the seed.
pub fn derive_id(seed: &str) -> String {
    let seed = normalize_seed(seed);
    let digest = blake3::derive_key("roster-invite-v1-id", seed.as_bytes());
    hex::encode(&digest[..ID_BYTES])
}

/// Derive the ephemeral signing keypair from a seed.
///
/// Both the inviter (to record the public key) and the invitee (to sign the
/// proof) derive the same keypair from the same seed.
pub fn derive_signing_keypair(seed: &str) -> SigningKeypair {
    let seed = normalize_seed(seed);
    let key_seed = blake3::derive_key("roster-invite-v1-signing", seed.as_bytes());
    SigningKeypair::from_seed(&key_seed)
}

/// The public record of an invitation, stored in team state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    /// Derived from the seed; identifies the invitation without revealing it.
    pub id: String,

    /// Public half of the seed-derived keypair; used to verify proofs.
    pub public_key: SigningPublicKey,

    /// Unix-millisecond expiration; 0 means no time limit.
    pub expiration: i64,

    /// Maximum number of admissions; 0 means unlimited.
    pub max_uses: u32,
}

/// Create an invitation from a seed.
pub fn create(seed: &str, expiration: i64, max_uses: u32) -> Invitation {
    Invitation {
        id: derive_id(seed),
        public_key: derive_signing_keypair(seed).public_key(),
        expiration,
        max_uses,
    }
}

/// An invitation's lifecycle status, evaluated lazily at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationStatus {
    /// Can still be used for admission.
    Pending,
    /// Single-use (or limited-use) invitation that has been consumed.
    Used,
    /// Explicitly revoked.
    Revoked,
    /// Time limit exceeded.
    Expired,
}

/// An invitation plus its usage bookkeeping, as carried in team state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationState {
    pub invitation: Invitation,

    /// How many admissions have consumed this invitation.
    pub uses: u32,

    /// Whether the invitation was explicitly revoked.
    pub revoked: bool,
}

impl InvitationState {
    /// Wrap a freshly created invitation.
    pub fn new(invitation: Invitation) -> Self {
        Self {
            invitation,
            uses: 0,
            revoked: false,
        }
    }

    /// The status of this invitation at time `now` (Unix milliseconds).
    ///
    /// There are no background timers; expiry is observed whenever the
    /// status is computed.
    pub fn status(&self, now: i64) -> InvitationStatus {
        if self.revoked {
            return InvitationStatus::Revoked;
        }
        if self.invitation.expiration > 0 && now > self.invitation.expiration {
            return InvitationStatus::Expired;
        }
        if self.invitation.max_uses > 0 && self.uses >= self.invitation.max_uses {
            return InvitationStatus::Used;
        }
        InvitationStatus::Pending
    }

    /// Check that this invitation can admit someone at time `now`.
    pub fn check_available(&self, now: i64) -> Result<(), InviteError> {
        match self.status(now) {
            InvitationStatus::Pending => Ok(()),
            InvitationStatus::Used => Err(InviteError::UsedUp),
            InvitationStatus::Revoked => Err(InviteError::Revoked),
            InvitationStatus::Expired => Err(InviteError::Expired),
        }
    }

    /// Record a successful admission.
    pub fn record_use(&mut self) {
        self.uses += 1;
    }
}
