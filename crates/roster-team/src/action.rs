//! Team actions: the payload of every link in the team graph.
//!
//! A closed enum with one payload struct per variant. Every payload may
//! carry new lockboxes, since most state changes also redistribute key
//! material.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use roster_crypto::Keyset;
use roster_invite::{Invitation, ProofOfInvitation};
use roster_lockbox::Lockbox;

use crate::device::Device;
use crate::member::Member;
use crate::role::Role;
use crate::server::Server;

/// Every kind of mutation that can be recorded in the team graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TeamAction {
    Root(RootPayload),
    AddMember(AddMemberPayload),
    RemoveMember(RemoveMemberPayload),
    AddRole(AddRolePayload),
    RemoveRole(RemoveRolePayload),
    AddMemberRole(AddMemberRolePayload),
    RemoveMemberRole(RemoveMemberRolePayload),
    AddDevice(AddDevicePayload),
    RemoveDevice(RemoveDevicePayload),
    InviteMember(InvitePayload),
    InviteDevice(InvitePayload),
    RevokeInvitation(RevokeInvitationPayload),
    AdmitMember(AdmitMemberPayload),
    AdmitDevice(AdmitDevicePayload),
    ChangeMemberKeys(ChangeKeysPayload),
    RotateKeys(RotateKeysPayload),
    AddServer(AddServerPayload),
    RemoveServer(RemoveServerPayload),
    ChangeServerKeys(ChangeKeysPayload),
    SetTeamName(SetTeamNamePayload),
    Message(MessagePayload),
}

/// Team creation: the first (and only root) link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootPayload {
    pub team_name: String,
    pub root_member: Member,
    pub root_device: Device,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddMemberPayload {
    pub member: Member,
    /// Roles granted on admission, in addition to any on the member record.
    pub roles: Vec<String>,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveMemberPayload {
    pub user_id: String,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddRolePayload {
    pub role: Role,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveRolePayload {
    pub role_name: String,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddMemberRolePayload {
    pub user_id: String,
    pub role_name: String,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveMemberRolePayload {
    pub user_id: String,
    pub role_name: String,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddDevicePayload {
    pub device: Device,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveDevicePayload {
    pub device_id: String,
    pub lockboxes: Vec<Lockbox>,
}

/// Shared by InviteMember and InviteDevice: only the public invitation
/// record enters the graph, never the seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitePayload {
    pub invitation: Invitation,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevokeInvitationPayload {
    /// The invitation id (derived, not secret).
    pub id: String,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmitMemberPayload {
    /// Proof that the new member holds the invitation seed. Carried in the
    /// graph so every peer re-verifies it on replay.
    pub proof: ProofOfInvitation,
    pub user_id: String,
    pub user_name: String,
    /// Public keys chosen by the new member.
    pub member_keys: Keyset,
    /// The new member's first device.
    pub device: Device,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmitDevicePayload {
    pub proof: ProofOfInvitation,
    pub device: Device,
    pub lockboxes: Vec<Lockbox>,
}

/// Shared by ChangeMemberKeys and ChangeServerKeys: the new public keyset,
/// whose scope names the identity being re-keyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeKeysPayload {
    pub keys: Keyset,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotateKeysPayload {
    /// The new generation's public keys; the scope names what was rotated.
    pub keys: Keyset,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddServerPayload {
    pub server: Server,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveServerPayload {
    pub host: String,
    pub lockboxes: Vec<Lockbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTeamNamePayload {
    pub team_name: String,
    pub lockboxes: Vec<Lockbox>,
}

/// An opaque application message; the team layer does not interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message: Value,
    pub lockboxes: Vec<Lockbox>,
}

impl TeamAction {
    /// The lockboxes this action introduces.
    pub fn lockboxes(&self) -> &[Lockbox] {
        match self {
            TeamAction::Root(p) => &p.lockboxes,
            TeamAction::AddMember(p) => &p.lockboxes,
            TeamAction::RemoveMember(p) => &p.lockboxes,
            TeamAction::AddRole(p) => &p.lockboxes,
            TeamAction::RemoveRole(p) => &p.lockboxes,
            TeamAction::AddMemberRole(p) => &p.lockboxes,
            TeamAction::RemoveMemberRole(p) => &p.lockboxes,
            TeamAction::AddDevice(p) => &p.lockboxes,
            TeamAction::RemoveDevice(p) => &p.lockboxes,
            TeamAction::InviteMember(p) => &p.lockboxes,
            TeamAction::InviteDevice(p) => &p.lockboxes,
            TeamAction::RevokeInvitation(p) => &p.lockboxes,
            TeamAction::AdmitMember(p) => &p.lockboxes,
            TeamAction::AdmitDevice(p) => &p.lockboxes,
            TeamAction::ChangeMemberKeys(p) => &p.lockboxes,
            TeamAction::RotateKeys(p) => &p.lockboxes,
            TeamAction::AddServer(p) => &p.lockboxes,
            TeamAction::RemoveServer(p) => &p.lockboxes,
            TeamAction::ChangeServerKeys(p) => &p.lockboxes,
            TeamAction::SetTeamName(p) => &p.lockboxes,
            TeamAction::Message(p) => &p.lockboxes,
        }
    }

    /// Stable name of the action variant (for audit trails and logs).
    pub fn kind(&self) -> &'static str {
        match self {
            TeamAction::Root(_) => "ROOT",
            TeamAction::AddMember(_) => "ADD_MEMBER",
            TeamAction::RemoveMember(_) => "REMOVE_MEMBER",
            TeamAction::AddRole(_) => "ADD_ROLE",
            TeamAction::RemoveRole(_) => "REMOVE_ROLE",
            TeamAction::AddMemberRole(_) => "ADD_MEMBER_ROLE",
            TeamAction::RemoveMemberRole(_) => "REMOVE_MEMBER_ROLE",
            TeamAction::AddDevice(_) => "ADD_DEVICE",
            TeamAction::RemoveDevice(_) => "REMOVE_DEVICE",
            TeamAction::InviteMember(_) => "INVITE_MEMBER",
            TeamAction::InviteDevice(_) => "INVITE_DEVICE",
            TeamAction::RevokeInvitation(_) => "REVOKE_INVITATION",
            TeamAction::AdmitMember(_) => "ADMIT_MEMBER",
            TeamAction::AdmitDevice(_) => "ADMIT_DEVICE",
            TeamAction::ChangeMemberKeys(_) => "CHANGE_MEMBER_KEYS",
            TeamAction::RotateKeys(_) => "ROTATE_KEYS",
            TeamAction::AddServer(_) => "ADD_SERVER",
            TeamAction::RemoveServer(_) => "REMOVE_SERVER",
            TeamAction::ChangeServerKeys(_) => "CHANGE_SERVER_KEYS",
            TeamAction::SetTeamName(_) => "SET_TEAM_NAME",
            TeamAction::Message(_) => "MESSAGE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_roundtrip() {
        let action = TeamAction::SetTeamName(SetTeamNamePayload {
            team_name: "spies".into(),
            lockboxes: vec![],
        });

        let mut buf = Vec::new();
        ciborium::into_writer(&action, &mut buf).unwrap();
        let recovered: TeamAction = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(action, recovered);
    }

    #[test]
    fn test_kind_names() {
        let action = TeamAction::RemoveMember(RemoveMemberPayload {
            user_id: "bob".into(),
            lockboxes: vec![],
        });
        assert_eq!(action.kind(), "REMOVE_MEMBER");
    }
}
