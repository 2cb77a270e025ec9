//! Error types for the team layer.

use thiserror::Error;

use roster_crypto::CryptoError;
use roster_graph::GraphError;
use roster_invite::InviteError;
use roster_lockbox::LockboxError;

/// Errors surfaced by the `Team` API.
///
/// Graph-level integrity and structural failures abort whole operations
/// (merge, load). Per-link validation failures are *not* errors: they are
/// recorded on the reduce outcome and replay continues.
#[derive(Debug, Error)]
pub enum TeamError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Lockbox(#[from] LockboxError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The invitation cannot admit anyone: expired, used up, or revoked.
    #[error("invitation is expired, used up, or revoked")]
    ExpiredOrRevokedInvitation,

    /// The proof of invitation does not verify.
    #[error("proof of invitation is invalid")]
    InvalidProof,

    #[error("unknown invitation: {0}")]
    UnknownInvitation(String),

    #[error("unknown member: {0}")]
    UnknownMember(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown server: {0}")]
    UnknownServer(String),

    #[error("member {0} is not an admin")]
    NotAdmin(String),

    /// No secret keyset for this scope is reachable from the keys we hold.
    #[error("no keys held for scope {0}")]
    MissingKeys(String),

    /// The graph's root link does not carry a well-formed team creation.
    #[error("graph root is not a valid team root")]
    InvalidRoot,

    /// A keyset was supplied for the wrong identity.
    #[error("keyset scope mismatch: expected {expected}, got {got}")]
    ScopeMismatch { expected: String, got: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<InviteError> for TeamError {
    fn from(e: InviteError) -> Self {
        match e {
            InviteError::Revoked | InviteError::UsedUp | InviteError::Expired => {
                TeamError::ExpiredOrRevokedInvitation
            }
            InviteError::IdMismatch | InviteError::InvalidProof => TeamError::InvalidProof,
        }
    }
}
