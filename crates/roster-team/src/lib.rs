//! # Roster Team
//!
//! Team state derived from a signed hash graph.
//!
//! Every mutation of the team (membership, roles, devices, servers,
//! invitations, key rotations) is a [`TeamAction`] recorded as a signed
//! link. Peers exchange and merge graphs; each peer independently replays
//! the merged graph through the reducer, which validates every link against
//! the state at its point in the deterministic order and skips (but keeps)
//! the ones that fail. The result is a [`TeamState`] every honest peer
//! agrees on, including who currently holds which key material via
//! lockboxes.
//!
//! The [`Team`] struct is the external surface: create or load a team,
//! apply mutations, merge peers' updates, query the derived state.
//!
//! ```no_run
//! use roster_crypto::{KeyScope, SecretKeyset};
//! use roster_team::{LocalContext, LocalDevice, LocalMember, Team};
//!
//! let context = LocalContext {
//!     member: LocalMember {
//!         user_id: "alice".into(),
//!         user_name: "Alice".into(),
//!         keys: SecretKeyset::generate(KeyScope::user("alice")),
//!     },
//!     device: LocalDevice {
//!         device_id: "alice-laptop".into(),
//!         device_name: "Alice's laptop".into(),
//!         keys: SecretKeyset::generate(KeyScope::device("alice-laptop")),
//!     },
//! };
//!
//! let team_keys = SecretKeyset::generate(KeyScope::team());
//! let mut team = Team::create("spies", team_keys, context).unwrap();
//! let invite = team.invite_member(None, 0, 1).unwrap();
//! // invite.seed goes to the prospective member out of band
//! ```

pub mod action;
pub mod context;
pub mod device;
pub mod enforcer;
pub mod error;
pub mod keys;
pub mod member;
pub mod reducer;
pub mod role;
pub mod server;
pub mod state;
pub mod team;
pub mod transforms;
pub mod validators;

pub use action::TeamAction;
pub use context::{LocalContext, LocalDevice, LocalMember};
pub use device::Device;
pub use error::TeamError;
pub use member::Member;
pub use reducer::{reduce, InvalidLink, ReduceOutcome};
pub use role::{PermissionsMap, Role, ADMIN};
pub use server::Server;
pub use state::{MessageRecord, TeamState};
pub use team::{InviteResult, Team};
pub use validators::ValidationResult;

/// The team graph: a hash graph whose actions are [`TeamAction`]s.
pub type TeamGraph = roster_graph::Graph<TeamAction>;

/// One link in the team graph.
pub type TeamLink = roster_graph::Link<TeamAction>;
