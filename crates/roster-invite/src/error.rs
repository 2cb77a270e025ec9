//! Error types for the invitation protocol.

use thiserror::Error;

/// Errors raised while validating invitations and proofs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InviteError {
    /// The proof's id does not match the invitation.
    #[error("proof is for a different invitation")]
    IdMismatch,

    /// The proof's signature does not verify against the invitation's
    /// public key (the prospective member does not hold the seed).
    #[error("proof signature is invalid")]
    InvalidProof,

    /// The invitation has been revoked.
    #[error("invitation has been revoked")]
    Revoked,

    /// The invitation's use limit has been reached.
    #[error("invitation has already been used")]
    UsedUp,

    /// The invitation's time limit has passed.
    #[error("invitation has expired")]
    Expired,
}
