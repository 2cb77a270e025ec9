//! The Team: unified API over the graph, reducer, and key material.
//!
//! A `Team` owns a local copy of the graph plus the derived state. Every
//! mutation appends one signed link and re-derives; every inbound sync
//! merges the peer's graph wholesale (or not at all) and re-derives.

use ciborium::value::Value;
use tracing::info;

use roster_crypto::{KeyScope, Keyring, Keyset, SecretKeyset};
use roster_graph::Graph;
use roster_invite::{
    create as create_invitation, normalize_seed, random_seed, ProofOfInvitation,
};
use roster_invite::InvitationState;
use roster_lockbox::{create as create_lockbox, Lockbox};

use crate::action::*;
use crate::context::LocalContext;
use crate::device::Device;
use crate::error::TeamError;
use crate::keys::{derive_keyring, rotation_lockboxes, secret_keys};
use crate::member::Member;
use crate::reducer::{reduce, InvalidLink};
use crate::role::{Role, ADMIN};
use crate::server::Server;
use crate::state::TeamState;
use crate::TeamGraph;

/// Returned by the invite operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteResult {
    /// The invitation id recorded in the graph.
    pub id: String,

    /// The secret seed, returned in case it was generated randomly. To be
    /// passed out of band; it never enters the graph.
    pub seed: String,
}

/// A team: local graph copy, derived state, and the local actor's keys.
pub struct Team {
    graph: TeamGraph,
    state: TeamState,
    invalid_links: Vec<InvalidLink>,
    context: LocalContext,
    keyring: Keyring,
}

impl Team {
    // ─────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────

    /// Create a new team. The local actor becomes the founding member and
    /// sole admin.
    ///
    /// The root link carries the lockboxes that make the founder
    /// self-sufficient: team keys and admin role keys for the founder's
    /// user keys, and the user keys for the founding device.
    pub fn create(
        team_name: &str,
        team_keys: SecretKeyset,
        context: LocalContext,
    ) -> Result<Self, TeamError> {
        let admin_keys = SecretKeyset::generate(KeyScope::role(ADMIN));
        let member_keys = context.member.keys.public();
        let device_keys = context.device.keys.public();

        let lockboxes = vec![
            create_lockbox(&team_keys, &member_keys)?,
            create_lockbox(&admin_keys, &member_keys)?,
            create_lockbox(&context.member.keys, &device_keys)?,
        ];

        let action = TeamAction::Root(RootPayload {
            team_name: team_name.to_string(),
            root_member: context.member_public(vec![ADMIN.to_string()]),
            root_device: context.device_public(),
            lockboxes,
        });

        let graph = Graph::create_root(
            action,
            context.author(),
            &context.device.keys.signing,
            now_millis(),
        )?;

        info!(team_name, founder = %context.member.user_id, "created team");
        Self::from_graph(graph, context, Keyring::from_keyset(team_keys))
    }

    /// Rehydrate a team from serialized graph bytes.
    pub fn load(
        bytes: &[u8],
        context: LocalContext,
        keyring: Keyring,
    ) -> Result<Self, TeamError> {
        let graph = Graph::load(bytes)?;
        Self::from_graph(graph, context, keyring)
    }

    /// Rehydrate a team from an existing graph value.
    pub fn from_graph(
        graph: TeamGraph,
        context: LocalContext,
        keyring: Keyring,
    ) -> Result<Self, TeamError> {
        let outcome = reduce(&graph)?;
        Ok(Self {
            graph,
            state: outcome.state,
            invalid_links: outcome.invalid_links,
            context,
            keyring,
        })
    }

    /// Serialize the graph. Round-trips exactly through [`Team::load`].
    pub fn save(&self) -> Vec<u8> {
        self.graph.save()
    }

    /// Merge a peer's serialized graph and re-derive state.
    ///
    /// Fails wholesale on any integrity or structural error; the local
    /// graph is left untouched in that case.
    pub fn merge(&mut self, bytes: &[u8]) -> Result<(), TeamError> {
        let incoming = Graph::load(bytes)?;
        self.merge_graph(&incoming)
    }

    /// Merge a peer's graph value and re-derive state.
    pub fn merge_graph(&mut self, incoming: &TeamGraph) -> Result<(), TeamError> {
        self.graph = self.graph.merge(incoming)?;
        self.rederive()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// The derived team state.
    pub fn state(&self) -> &TeamState {
        &self.state
    }

    /// The underlying graph.
    pub fn graph(&self) -> &TeamGraph {
        &self.graph
    }

    /// Links whose effects were skipped during replay (audit trail).
    pub fn invalid_links(&self) -> &[InvalidLink] {
        &self.invalid_links
    }

    /// The team's name.
    pub fn team_name(&self) -> &str {
        &self.state.team_name
    }

    /// All current members.
    pub fn members(&self) -> Vec<&Member> {
        self.state.members.values().collect()
    }

    /// One member by user id.
    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.state.member(user_id)
    }

    /// Whether a user is a current member.
    pub fn has_member(&self, user_id: &str) -> bool {
        self.state.has_member(user_id)
    }

    /// All current roles.
    pub fn roles(&self) -> Vec<&Role> {
        self.state.roles.values().collect()
    }

    /// One role by name.
    pub fn role(&self, role_name: &str) -> Option<&Role> {
        self.state.roles.get(role_name)
    }

    /// All current servers.
    pub fn servers(&self) -> Vec<&Server> {
        self.state.servers.values().collect()
    }

    /// All lockboxes ever distributed.
    pub fn lockboxes(&self) -> &[Lockbox] {
        &self.state.lockboxes
    }

    /// All invitations and their states.
    pub fn invitations(&self) -> impl Iterator<Item = &InvitationState> {
        self.state.invitations.values()
    }

    /// Whether a member holds a role.
    pub fn member_has_role(&self, user_id: &str, role_name: &str) -> bool {
        self.state.member_has_role(user_id, role_name)
    }

    /// Whether a member holds the admin role.
    pub fn member_is_admin(&self, user_id: &str) -> bool {
        self.state.member_is_admin(user_id)
    }

    /// The current generation of the team keyset, unwrapped from the
    /// lockboxes reachable with the local actor's keys.
    pub fn team_keys(&self) -> Result<SecretKeyset, TeamError> {
        self.keys(&KeyScope::team())
    }

    /// Every secret keyset (all scopes, all generations) reachable with
    /// the local actor's keys.
    pub fn team_keyring(&self) -> Keyring {
        derive_keyring(&self.state, &self.starting_ring())
    }

    /// The latest secret keyset for a scope, if reachable.
    pub fn keys(&self, scope: &KeyScope) -> Result<SecretKeyset, TeamError> {
        secret_keys(&self.state, &self.starting_ring(), scope)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Membership
    // ─────────────────────────────────────────────────────────────────────

    /// Add a member directly (the member's keys are already known).
    pub fn add_member(&mut self, member: Member, roles: Vec<String>) -> Result<(), TeamError> {
        self.require_admin()?;
        let team_keys = self.team_keys()?;
        let lockboxes = vec![create_lockbox(&team_keys, &member.keys)?];
        self.append(TeamAction::AddMember(AddMemberPayload {
            member,
            roles,
            lockboxes,
        }))
    }

    /// Remove a member and rotate the team keys away from them.
    ///
    /// The removal link carries a fresh team keyset generation, lockboxed
    /// for every remaining member; the removed member can still read the
    /// history they witnessed but nothing that follows.
    pub fn remove_member(&mut self, user_id: &str) -> Result<(), TeamError> {
        self.require_admin()?;

        let new_team_keys = self.team_keys()?.rotate();
        let mut lockboxes = Vec::new();
        for member in self.state.members.values() {
            if member.user_id != user_id {
                lockboxes.push(create_lockbox(&new_team_keys, &member.keys)?);
            }
        }

        self.append(TeamAction::RemoveMember(RemoveMemberPayload {
            user_id: user_id.to_string(),
            lockboxes,
        }))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Roles
    // ─────────────────────────────────────────────────────────────────────

    /// Create a role. Its keyset is lockboxed for every current admin.
    pub fn add_role(&mut self, role: Role) -> Result<(), TeamError> {
        self.require_admin()?;

        let role_keys = SecretKeyset::generate(KeyScope::role(&role.role_name));
        let mut lockboxes = Vec::new();
        for member in self.state.members.values() {
            if member.is_admin() {
                lockboxes.push(create_lockbox(&role_keys, &member.keys)?);
            }
        }

        self.append(TeamAction::AddRole(AddRolePayload { role, lockboxes }))
    }

    /// Remove a role.
    pub fn remove_role(&mut self, role_name: &str) -> Result<(), TeamError> {
        self.require_admin()?;
        self.append(TeamAction::RemoveRole(RemoveRolePayload {
            role_name: role_name.to_string(),
            lockboxes: vec![],
        }))
    }

    /// Grant a role to a member, sharing the role keys with them.
    pub fn add_member_role(&mut self, user_id: &str, role_name: &str) -> Result<(), TeamError> {
        self.require_admin()?;
        let member = self
            .state
            .member(user_id)
            .ok_or_else(|| TeamError::UnknownMember(user_id.to_string()))?;

        let role_keys = self.keys(&KeyScope::role(role_name))?;
        let lockboxes = vec![create_lockbox(&role_keys, &member.keys)?];

        self.append(TeamAction::AddMemberRole(AddMemberRolePayload {
            user_id: user_id.to_string(),
            role_name: role_name.to_string(),
            lockboxes,
        }))
    }

    /// Revoke a role from a member. Idempotent.
    pub fn remove_member_role(&mut self, user_id: &str, role_name: &str) -> Result<(), TeamError> {
        self.require_admin()?;
        self.append(TeamAction::RemoveMemberRole(RemoveMemberRolePayload {
            user_id: user_id.to_string(),
            role_name: role_name.to_string(),
            lockboxes: vec![],
        }))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Devices
    // ─────────────────────────────────────────────────────────────────────

    /// Register a new device for the local member, sharing the user keys
    /// with it.
    pub fn add_device(&mut self, device: Device) -> Result<(), TeamError> {
        let lockboxes = vec![create_lockbox(&self.context.member.keys, &device.keys)?];
        self.append(TeamAction::AddDevice(AddDevicePayload { device, lockboxes }))
    }

    /// Remove a device. Idempotent.
    pub fn remove_device(&mut self, device_id: &str) -> Result<(), TeamError> {
        self.append(TeamAction::RemoveDevice(RemoveDevicePayload {
            device_id: device_id.to_string(),
            lockboxes: vec![],
        }))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Invitations
    // ─────────────────────────────────────────────────────────────────────

    /// Invite a new member. Only the derived id and public key enter the
    /// graph; the seed goes to the invitee out of band.
    pub fn invite_member(
        &mut self,
        seed: Option<String>,
        expiration: i64,
        max_uses: u32,
    ) -> Result<InviteResult, TeamError> {
        self.require_admin()?;
        self.invite(seed, expiration, max_uses, true)
    }

    /// Invite one of your own future devices. Single-use.
    pub fn invite_device(&mut self, seed: Option<String>) -> Result<InviteResult, TeamError> {
        self.invite(seed, 0, 1, false)
    }

    fn invite(
        &mut self,
        seed: Option<String>,
        expiration: i64,
        max_uses: u32,
        for_member: bool,
    ) -> Result<InviteResult, TeamError> {
        let seed = normalize_seed(&seed.unwrap_or_else(random_seed));
        let invitation = create_invitation(&seed, expiration, max_uses);
        let id = invitation.id.clone();

        let payload = InvitePayload {
            invitation,
            lockboxes: vec![],
        };
        let action = if for_member {
            TeamAction::InviteMember(payload)
        } else {
            TeamAction::InviteDevice(payload)
        };
        self.append(action)?;

        Ok(InviteResult { id, seed })
    }

    /// Revoke an invitation. Admissions against it fail from here on, even
    /// with a cryptographically correct proof.
    pub fn revoke_invitation(&mut self, id: &str) -> Result<(), TeamError> {
        self.require_admin()?;
        if self.state.invitation(id).is_none() {
            return Err(TeamError::UnknownInvitation(id.to_string()));
        }
        self.append(TeamAction::RevokeInvitation(RevokeInvitationPayload {
            id: id.to_string(),
            lockboxes: vec![],
        }))
    }

    /// Admit a prospective member who presented a proof of invitation.
    ///
    /// The local verification here is an optimization for a fast answer;
    /// the security boundary is the reducer, which re-validates the proof
    /// on every peer when the admission replays.
    pub fn admit_member(
        &mut self,
        proof: ProofOfInvitation,
        user_id: &str,
        user_name: &str,
        member_keys: Keyset,
        device: Device,
    ) -> Result<(), TeamError> {
        let invitation = self
            .state
            .invitation(&proof.id)
            .ok_or_else(|| TeamError::UnknownInvitation(proof.id.clone()))?;
        invitation.check_available(now_millis())?;
        roster_invite::validate_proof(&proof, &invitation.invitation)?;

        let team_keys = self.team_keys()?;
        let lockboxes = vec![create_lockbox(&team_keys, &member_keys)?];

        info!(user_id, invitation = %proof.id, "admitting member");
        self.append(TeamAction::AdmitMember(AdmitMemberPayload {
            proof,
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            member_keys,
            device,
            lockboxes,
        }))
    }

    /// Admit the local device itself using a device invitation.
    ///
    /// Authored by the joining device: its authority is the proof, not an
    /// existing registration.
    pub fn admit_device(&mut self, proof: ProofOfInvitation) -> Result<(), TeamError> {
        let invitation = self
            .state
            .invitation(&proof.id)
            .ok_or_else(|| TeamError::UnknownInvitation(proof.id.clone()))?;
        invitation.check_available(now_millis())?;
        roster_invite::validate_proof(&proof, &invitation.invitation)?;

        let device = self.context.device_public();
        self.append(TeamAction::AdmitDevice(AdmitDevicePayload {
            proof,
            device,
            lockboxes: vec![],
        }))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Keys
    // ─────────────────────────────────────────────────────────────────────

    /// Replace the local member's own keys with the next generation,
    /// re-sharing them with all of the member's devices.
    pub fn change_keys(&mut self, new_keys: SecretKeyset) -> Result<(), TeamError> {
        let expected = KeyScope::user(&self.context.member.user_id);
        if new_keys.scope() != &expected {
            return Err(TeamError::ScopeMismatch {
                expected: expected.to_string(),
                got: new_keys.scope().to_string(),
            });
        }

        let mut lockboxes = Vec::new();
        if let Some(me) = self.state.member(&self.context.member.user_id) {
            for device in &me.devices {
                lockboxes.push(create_lockbox(&new_keys, &device.keys)?);
            }
        }

        self.append(TeamAction::ChangeMemberKeys(ChangeKeysPayload {
            keys: new_keys.public(),
            lockboxes,
        }))?;

        self.keyring.add(self.context.member.keys.clone());
        self.keyring.add(new_keys.clone());
        self.context.member.keys = new_keys;
        Ok(())
    }

    /// Rotate a keyset (team, role, or the local member's own), producing
    /// the next generation and re-addressing it to every current holder.
    pub fn rotate_keys(&mut self, scope: &KeyScope) -> Result<(), TeamError> {
        let own_scope = KeyScope::user(&self.context.member.user_id);
        let current = if scope == &own_scope {
            self.context.member.keys.clone()
        } else {
            self.keys(scope)?
        };

        let new_keys = current.rotate();
        let lockboxes = rotation_lockboxes(&self.state, &new_keys)?;

        info!(scope = %scope, generation = new_keys.generation(), "rotating keys");
        self.append(TeamAction::RotateKeys(RotateKeysPayload {
            keys: new_keys.public(),
            lockboxes,
        }))?;

        if scope == &own_scope {
            self.keyring.add(self.context.member.keys.clone());
            self.context.member.keys = new_keys.clone();
        }
        self.keyring.add(new_keys);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Servers
    // ─────────────────────────────────────────────────────────────────────

    /// Add a server, sharing the team keys with it.
    pub fn add_server(&mut self, server: Server) -> Result<(), TeamError> {
        self.require_admin()?;
        let team_keys = self.team_keys()?;
        let lockboxes = vec![create_lockbox(&team_keys, &server.keys)?];
        self.append(TeamAction::AddServer(AddServerPayload { server, lockboxes }))
    }

    /// Remove a server. Idempotent.
    pub fn remove_server(&mut self, host: &str) -> Result<(), TeamError> {
        self.require_admin()?;
        self.append(TeamAction::RemoveServer(RemoveServerPayload {
            host: host.to_string(),
            lockboxes: vec![],
        }))
    }

    /// Record a server's new public keys.
    pub fn change_server_keys(&mut self, keys: Keyset) -> Result<(), TeamError> {
        self.append(TeamAction::ChangeServerKeys(ChangeKeysPayload {
            keys,
            lockboxes: vec![],
        }))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Misc
    // ─────────────────────────────────────────────────────────────────────

    /// Rename the team.
    pub fn set_team_name(&mut self, team_name: &str) -> Result<(), TeamError> {
        self.require_admin()?;
        self.append(TeamAction::SetTeamName(SetTeamNamePayload {
            team_name: team_name.to_string(),
            lockboxes: vec![],
        }))
    }

    /// Post an opaque message to the team.
    pub fn post_message(&mut self, message: Value) -> Result<(), TeamError> {
        self.append(TeamAction::Message(MessagePayload {
            message,
            lockboxes: vec![],
        }))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Append a signed link and re-derive state.
    fn append(&mut self, action: TeamAction) -> Result<(), TeamError> {
        self.graph.append(
            action,
            self.context.author(),
            &self.context.device.keys.signing,
            now_millis(),
        )?;
        self.rederive()
    }

    fn rederive(&mut self) -> Result<(), TeamError> {
        let outcome = reduce(&self.graph)?;
        self.state = outcome.state;
        self.invalid_links = outcome.invalid_links;
        Ok(())
    }

    /// The host-provided keyring plus the local actor's own secrets.
    fn starting_ring(&self) -> Keyring {
        let mut ring = self.keyring.clone();
        ring.add(self.context.member.keys.clone());
        ring.add(self.context.device.keys.clone());
        ring
    }

    fn require_admin(&self) -> Result<(), TeamError> {
        let me = &self.context.member.user_id;
        if !self.state.member_is_admin(me) {
            return Err(TeamError::NotAdmin(me.clone()));
        }
        Ok(())
    }
}

/// Current time in Unix milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
