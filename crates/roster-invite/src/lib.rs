//! # Roster Invite
//!
//! The invitation/admission protocol: a holder of a pre-shared secret seed
//! can join a team without any existing member vouching for their keys in
//! advance.
//!
//! The inviter derives from the seed a stable, non-secret invitation id and
//! an ephemeral signing keypair, and records only the id and public key in
//! team state. The seed itself travels out of band (verbally, QR code) and
//! never appears in the graph. The prospective member, holding the same
//! seed, derives the same keypair and produces a signed
//! [`ProofOfInvitation`]; any member can then verify the proof against the
//! stored public key and admit them.

pub mod error;
pub mod invitation;
pub mod proof;

pub use error::InviteError;
pub use invitation::{
    create, normalize_seed, random_seed, Invitation, InvitationState, InvitationStatus,
};
pub use proof::{generate_proof, validate_proof, ProofOfInvitation};
