//! Pure per-action state transforms.
//!
//! Each transform takes the accumulator state and an already-validated link
//! and returns the next state. Transforms never fail and never look outside
//! their inputs; everything that could go wrong was rejected by the
//! validator for the same variant.

use roster_crypto::KeyType;
use roster_invite::InvitationState;

use crate::action::TeamAction;
use crate::role::Role;
use crate::state::{MessageRecord, TeamState};
use crate::TeamLink;

pub fn apply_root(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::Root(payload) = &link.body.action else {
        return state;
    };

    state.team_name = payload.team_name.clone();

    let mut founder = payload.root_member.clone();
    if !founder.has_role(crate::role::ADMIN) {
        founder.roles.push(crate::role::ADMIN.to_string());
    }
    if founder.device(&payload.root_device.device_id).is_none() {
        founder.devices.push(payload.root_device.clone());
    }
    state.members.insert(founder.user_id.clone(), founder);

    state
        .roles
        .insert(crate::role::ADMIN.to_string(), Role::admin());
    state
}

pub fn apply_add_member(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::AddMember(payload) = &link.body.action else {
        return state;
    };

    let mut member = payload.member.clone();
    for role in &payload.roles {
        if !member.has_role(role) {
            member.roles.push(role.clone());
        }
    }
    state.members.insert(member.user_id.clone(), member);
    state
}

pub fn apply_remove_member(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::RemoveMember(payload) = &link.body.action else {
        return state;
    };

    if let Some(member) = state.members.remove(&payload.user_id) {
        for device in &member.devices {
            state
                .removed_devices
                .insert(device.device_id.clone(), device.clone());
        }
        state.removed_members.insert(member.user_id.clone(), member);
    }
    state
}

pub fn apply_add_role(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::AddRole(payload) = &link.body.action else {
        return state;
    };
    state
        .roles
        .insert(payload.role.role_name.clone(), payload.role.clone());
    state
}

pub fn apply_remove_role(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::RemoveRole(payload) = &link.body.action else {
        return state;
    };
    state.roles.remove(&payload.role_name);

    // Members no longer hold a role that no longer exists.
    for member in state.members.values_mut() {
        member.roles.retain(|r| r != &payload.role_name);
    }
    state
}

pub fn apply_add_member_role(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::AddMemberRole(payload) = &link.body.action else {
        return state;
    };
    if let Some(member) = state.members.get_mut(&payload.user_id) {
        if !member.has_role(&payload.role_name) {
            member.roles.push(payload.role_name.clone());
        }
    }
    state
}

pub fn apply_remove_member_role(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::RemoveMemberRole(payload) = &link.body.action else {
        return state;
    };
    if let Some(member) = state.members.get_mut(&payload.user_id) {
        member.roles.retain(|r| r != &payload.role_name);
    }
    state
}

pub fn apply_add_device(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::AddDevice(payload) = &link.body.action else {
        return state;
    };
    if let Some(member) = state.members.get_mut(&payload.device.user_id) {
        member.devices.push(payload.device.clone());
    }
    state
}

pub fn apply_remove_device(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::RemoveDevice(payload) = &link.body.action else {
        return state;
    };
    for member in state.members.values_mut() {
        if let Some(pos) = member
            .devices
            .iter()
            .position(|d| d.device_id == payload.device_id)
        {
            let device = member.devices.remove(pos);
            state
                .removed_devices
                .insert(device.device_id.clone(), device);
            break;
        }
    }
    state
}

pub fn apply_invite(mut state: TeamState, link: &TeamLink) -> TeamState {
    let invitation = match &link.body.action {
        TeamAction::InviteMember(p) | TeamAction::InviteDevice(p) => p.invitation.clone(),
        _ => return state,
    };
    state
        .invitations
        .insert(invitation.id.clone(), InvitationState::new(invitation));
    state
}

pub fn apply_revoke_invitation(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::RevokeInvitation(payload) = &link.body.action else {
        return state;
    };
    if let Some(invitation) = state.invitations.get_mut(&payload.id) {
        invitation.revoked = true;
    }
    state
}

pub fn apply_admit_member(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::AdmitMember(payload) = &link.body.action else {
        return state;
    };

    // The admission and the membership change are one atomic effect.
    if let Some(invitation) = state.invitations.get_mut(&payload.proof.id) {
        invitation.record_use();
    }

    let member = crate::member::Member {
        user_id: payload.user_id.clone(),
        user_name: payload.user_name.clone(),
        keys: payload.member_keys.clone(),
        roles: Vec::new(),
        devices: vec![payload.device.clone()],
    };
    state.members.insert(member.user_id.clone(), member);
    state
}

pub fn apply_admit_device(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::AdmitDevice(payload) = &link.body.action else {
        return state;
    };

    if let Some(invitation) = state.invitations.get_mut(&payload.proof.id) {
        invitation.record_use();
    }
    if let Some(member) = state.members.get_mut(&payload.device.user_id) {
        member.devices.push(payload.device.clone());
    }
    state
}

pub fn apply_change_member_keys(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::ChangeMemberKeys(payload) = &link.body.action else {
        return state;
    };
    if let Some(member) = state.members.get_mut(&payload.keys.scope().name) {
        member.keys = payload.keys.clone();
    }
    state
}

pub fn apply_rotate_keys(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::RotateKeys(payload) = &link.body.action else {
        return state;
    };

    let scope = payload.keys.scope();
    match scope.key_type {
        KeyType::User => {
            if let Some(member) = state.members.get_mut(&scope.name) {
                member.keys = payload.keys.clone();
            }
            state.pending_key_rotations.remove(&scope.name);
        }
        // Rotating the team keys addresses every outstanding exposure.
        KeyType::Team => {
            state.pending_key_rotations.clear();
        }
        _ => {}
    }
    state
}

pub fn apply_add_server(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::AddServer(payload) = &link.body.action else {
        return state;
    };
    state
        .servers
        .insert(payload.server.host.clone(), payload.server.clone());
    state
}

pub fn apply_remove_server(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::RemoveServer(payload) = &link.body.action else {
        return state;
    };
    if let Some(server) = state.servers.remove(&payload.host) {
        state.removed_servers.insert(server.host.clone(), server);
    }
    state
}

pub fn apply_change_server_keys(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::ChangeServerKeys(payload) = &link.body.action else {
        return state;
    };
    if let Some(server) = state.servers.get_mut(&payload.keys.scope().name) {
        server.keys = payload.keys.clone();
    }
    state
}

pub fn apply_set_team_name(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::SetTeamName(payload) = &link.body.action else {
        return state;
    };
    state.team_name = payload.team_name.clone();
    state
}

pub fn apply_message(mut state: TeamState, link: &TeamLink) -> TeamState {
    let TeamAction::Message(payload) = &link.body.action else {
        return state;
    };
    state.messages.push(MessageRecord {
        sender: link.author().user_id.clone(),
        message: payload.message.clone(),
    });
    state
}
