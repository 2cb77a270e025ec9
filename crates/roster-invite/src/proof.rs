//! Proof that the prospective member holds the invitation seed.

use serde::{Deserialize, Serialize};

use roster_crypto::Signature;

use crate::error::InviteError;
use crate::invitation::{derive_id, derive_signing_keypair, Invitation};

/// Domain prefix for proof signatures.
const PROOF_DOMAIN: &[u8] = b"roster-invite-v1-proof:";

/// A signed claim to an invitation.
///
/// Produced by the prospective member from the seed alone; verified by any
/// existing member against the invitation's stored public key, and
/// re-verified by every peer when the admission replays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfInvitation {
    /// The invitation being claimed.
    pub id: String,

    /// Signature over the id by the seed-derived keypair.
    pub signature: Signature,
}

/// Generate a proof from the seed.
pub fn generate_proof(seed: &str) -> ProofOfInvitation {
    let id = derive_id(seed);
    let keypair = derive_signing_keypair(seed);
    let signature = keypair.sign(&proof_message(&id));
    ProofOfInvitation { id, signature }
}

/// Validate a proof against a stored invitation.
pub fn validate_proof(
    proof: &ProofOfInvitation,
    invitation: &Invitation,
) -> Result<(), InviteError> {
    if proof.id != invitation.id {
        return Err(InviteError::IdMismatch);
    }

    invitation
        .public_key
        .verify(&proof_message(&proof.id), &proof.signature)
        .map_err(|_| InviteError::InvalidProof)
}

fn proof_message(id: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(PROOF_DOMAIN.len() + id.len());
    message.extend_from_slice(PROOF_DOMAIN);
    message.extend_from_slice(id.as_bytes());
    message
}
