//! The materialized team state.
//!
//! `TeamState` is a deterministic pure function of (graph, keyring): the
//! reducer replays the ordered graph into it, and two peers holding the
//! same graph always derive byte-identical state. All collections are
//! ordered so serialization is stable.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use roster_crypto::{Hash32, KeyScope, KeyType};
use roster_graph::{to_canonical_bytes, LinkHash};
use roster_invite::InvitationState;
use roster_lockbox::Lockbox;

use crate::device::Device;
use crate::member::Member;
use crate::role::{Role, ADMIN};
use crate::server::Server;

/// An opaque message posted to the team, with its sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender: String,
    pub message: Value,
}

/// Everything the team graph materializes into.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TeamState {
    /// The graph heads this state was derived from (staleness check).
    pub head: Vec<LinkHash>,

    /// Human-facing team name.
    pub team_name: String,

    /// Current members by user id.
    pub members: BTreeMap<String, Member>,

    /// Current roles by role name.
    pub roles: BTreeMap<String, Role>,

    /// Current servers by host.
    pub servers: BTreeMap<String, Server>,

    /// Every lockbox ever distributed, in replay order. Superseded
    /// generations stay listed so historical lockboxes remain openable.
    pub lockboxes: Vec<Lockbox>,

    /// Invitations by id.
    pub invitations: BTreeMap<String, InvitationState>,

    /// Opaque messages in replay order.
    pub messages: Vec<MessageRecord>,

    /// Tombstones. Kept so a peer can tell a stranger from an ex-member
    /// when refusing a connection.
    pub removed_members: BTreeMap<String, Member>,
    pub removed_devices: BTreeMap<String, Device>,
    pub removed_servers: BTreeMap<String, Server>,

    /// Members whose admission was later invalidated; any keys they saw
    /// must be rotated at the first opportunity.
    pub pending_key_rotations: BTreeSet<String>,
}

impl TeamState {
    /// Look up a member.
    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.get(user_id)
    }

    /// Whether a user is a current member.
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.contains_key(user_id)
    }

    /// Whether a member holds a role.
    pub fn member_has_role(&self, user_id: &str, role_name: &str) -> bool {
        self.member(user_id).is_some_and(|m| m.has_role(role_name))
    }

    /// Whether a member holds the admin role.
    pub fn member_is_admin(&self, user_id: &str) -> bool {
        self.member_has_role(user_id, ADMIN)
    }

    /// Find a device across all members.
    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.members.values().find_map(|m| m.device(device_id))
    }

    /// Look up a server.
    pub fn server(&self, host: &str) -> Option<&Server> {
        self.servers.get(host)
    }

    /// Look up an invitation.
    pub fn invitation(&self, id: &str) -> Option<&InvitationState> {
        self.invitations.get(id)
    }

    /// The current (highest) key generation for a scope, if the scope
    /// resolves to a known identity.
    ///
    /// User and server generations come from the stored keysets; team and
    /// role generations come from the lockboxes that distributed them.
    pub fn current_generation(&self, scope: &KeyScope) -> Option<u32> {
        match scope.key_type {
            KeyType::User => self.member(&scope.name).map(|m| m.keys.generation()),
            KeyType::Server => self.server(&scope.name).map(|s| s.keys.generation()),
            KeyType::Device => self.device(&scope.name).map(|d| d.keys.generation()),
            KeyType::Team | KeyType::Role => self
                .lockboxes
                .iter()
                .filter(|b| b.contents.scope() == scope)
                .map(|b| b.contents.generation())
                .max(),
            KeyType::Ephemeral => None,
        }
    }

    /// Whether a key scope currently resolves to a valid recipient for new
    /// lockboxes. Removed identities are not valid recipients.
    pub fn is_valid_recipient(&self, scope: &KeyScope) -> bool {
        match scope.key_type {
            KeyType::Team => true,
            KeyType::Role => self.roles.contains_key(&scope.name),
            KeyType::User => self.has_member(&scope.name),
            KeyType::Device => self.device(&scope.name).is_some(),
            KeyType::Server => self.servers.contains_key(&scope.name),
            KeyType::Ephemeral => false,
        }
    }

    /// All lockboxes addressed to a recipient scope.
    pub fn lockboxes_for(&self, scope: &KeyScope) -> Vec<&Lockbox> {
        self.lockboxes
            .iter()
            .filter(|b| b.recipient.scope() == scope)
            .collect()
    }

    /// A digest of the full state.
    ///
    /// Two peers that exchange digests and find them equal hold identical
    /// state, without shipping the state itself. Replay determinism
    /// guarantees equal graphs produce equal digests.
    pub fn digest(&self) -> Hash32 {
        let bytes = to_canonical_bytes(self).expect("state is CBOR-serializable");
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"roster-team-v1-state:");
        hasher.update(&bytes);
        Hash32::from_bytes(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_crypto::{KeyScope, SecretKeyset};

    fn member(user_id: &str, roles: &[&str]) -> Member {
        Member {
            user_id: user_id.into(),
            user_name: user_id.into(),
            keys: SecretKeyset::from_seed(KeyScope::user(user_id), user_id).public(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            devices: vec![],
        }
    }

    #[test]
    fn test_member_queries() {
        let mut state = TeamState::default();
        state
            .members
            .insert("alice".into(), member("alice", &[ADMIN]));
        state.members.insert("bob".into(), member("bob", &[]));

        assert!(state.has_member("alice"));
        assert!(state.member_is_admin("alice"));
        assert!(!state.member_is_admin("bob"));
        assert!(!state.member_is_admin("eve"));
    }

    #[test]
    fn test_recipient_validity() {
        let mut state = TeamState::default();
        state.members.insert("alice".into(), member("alice", &[]));
        state.roles.insert(ADMIN.into(), Role::admin());

        assert!(state.is_valid_recipient(&KeyScope::team()));
        assert!(state.is_valid_recipient(&KeyScope::user("alice")));
        assert!(state.is_valid_recipient(&KeyScope::role(ADMIN)));
        assert!(!state.is_valid_recipient(&KeyScope::user("eve")));
        assert!(!state.is_valid_recipient(&KeyScope::ephemeral()));
    }

    #[test]
    fn test_generation_from_member_keys() {
        let mut state = TeamState::default();
        let mut m = member("alice", &[]);
        let rotated = SecretKeyset::from_seed(KeyScope::user("alice"), "alice")
            .rotate()
            .rotate();
        m.keys = rotated.public();
        state.members.insert("alice".into(), m);

        assert_eq!(state.current_generation(&KeyScope::user("alice")), Some(2));
        assert_eq!(state.current_generation(&KeyScope::user("eve")), None);
    }
}
