//! Per-action validation rules.
//!
//! Before a link's transform is applied, its validator runs against the
//! accumulator state at that point in the deterministic replay order. A
//! failed validation never aborts the replay: the link is marked invalid,
//! its effects are skipped, and replay continues. (Structural and
//! cryptographic failures are a different animal: they abort the whole
//! merge and never reach this layer.)

use roster_crypto::KeyType;
use roster_invite::{validate_proof, InviteError};

use crate::action::TeamAction;
use crate::state::TeamState;
use crate::TeamLink;

/// The outcome of validating one link against the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    /// Whether the link passed validation.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// The failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(reason) => Some(reason),
        }
    }
}

/// Shorthand: convert a rule-check `Err(reason)` into an invalid result.
macro_rules! check {
    ($expr:expr) => {
        if let Err(reason) = $expr {
            return ValidationResult::Invalid(reason);
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────
// Shared rules
// ─────────────────────────────────────────────────────────────────────────

/// The author must be a current member acting through one of their
/// registered devices, with the device key matching the link signature key.
fn check_member_author(state: &TeamState, link: &TeamLink) -> Result<(), String> {
    let author = link.author();
    let member = state
        .member(&author.user_id)
        .ok_or_else(|| format!("author {} is not a member", author.user_id))?;

    let device = member.device(&author.device_id).ok_or_else(|| {
        format!(
            "author {} has no device {}",
            author.user_id, author.device_id
        )
    })?;

    if device.keys.signing != author.public_key {
        return Err(format!(
            "signing key does not match device {}",
            author.device_id
        ));
    }
    Ok(())
}

/// The author must be a registered server.
fn check_server_author(state: &TeamState, link: &TeamLink) -> Result<(), String> {
    let author = link.author();
    let server = state
        .server(&author.user_id)
        .ok_or_else(|| format!("author {} is not a server", author.user_id))?;

    if server.keys.signing != author.public_key {
        return Err(format!("signing key does not match server {}", server.host));
    }
    Ok(())
}

/// Member author or server author.
fn check_participant_author(state: &TeamState, link: &TeamLink) -> Result<(), String> {
    if state.has_member(&link.author().user_id) {
        check_member_author(state, link)
    } else {
        check_server_author(state, link)
    }
}

/// The author must be an admin member.
fn check_admin_author(state: &TeamState, link: &TeamLink) -> Result<(), String> {
    check_member_author(state, link)?;
    if !state.member_is_admin(&link.author().user_id) {
        return Err(format!("author {} is not an admin", link.author().user_id));
    }
    Ok(())
}

/// Every lockbox on the action must be addressed to a currently-valid
/// identity. Identities introduced by this same action count as valid, so
/// e.g. ADD_MEMBER can carry lockboxes for the member it adds.
fn check_lockboxes(state: &TeamState, link: &TeamLink) -> Result<(), String> {
    let action = &link.body.action;
    let introduced = introduced_names(action);

    for lockbox in action.lockboxes() {
        let scope = lockbox.recipient.scope();
        if scope.key_type == KeyType::Ephemeral {
            return Err("lockbox addressed to an ephemeral key".to_string());
        }
        let ok = state.is_valid_recipient(scope)
            || introduced.contains(&(scope.key_type, scope.name.clone()));
        if !ok {
            return Err(format!("lockbox addressed to unknown identity {scope}"));
        }
    }
    Ok(())
}

/// Identities this action itself introduces, eligible as lockbox recipients.
fn introduced_names(action: &TeamAction) -> Vec<(KeyType, String)> {
    match action {
        TeamAction::Root(p) => vec![
            (KeyType::User, p.root_member.user_id.clone()),
            (KeyType::Device, p.root_device.device_id.clone()),
            (KeyType::Role, crate::role::ADMIN.to_string()),
        ],
        TeamAction::AddMember(p) => {
            let mut names = vec![(KeyType::User, p.member.user_id.clone())];
            names.extend(
                p.member
                    .devices
                    .iter()
                    .map(|d| (KeyType::Device, d.device_id.clone())),
            );
            names
        }
        TeamAction::AdmitMember(p) => vec![
            (KeyType::User, p.user_id.clone()),
            (KeyType::Device, p.device.device_id.clone()),
        ],
        TeamAction::AddDevice(p) => vec![(KeyType::Device, p.device.device_id.clone())],
        TeamAction::AdmitDevice(p) => vec![(KeyType::Device, p.device.device_id.clone())],
        TeamAction::AddRole(p) => vec![(KeyType::Role, p.role.role_name.clone())],
        TeamAction::AddServer(p) => vec![(KeyType::Server, p.server.host.clone())],
        _ => Vec::new(),
    }
}

fn map_invite_error(e: InviteError) -> String {
    match e {
        InviteError::Revoked => "invitation has been revoked".to_string(),
        InviteError::UsedUp => "invitation has already been used".to_string(),
        InviteError::Expired => "invitation has expired".to_string(),
        InviteError::IdMismatch | InviteError::InvalidProof => {
            "proof of invitation is invalid".to_string()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Per-action validators
// ─────────────────────────────────────────────────────────────────────────

/// A ROOT action is only valid as the graph root, which the reducer applies
/// before any validator runs. Seeing one mid-graph is always invalid.
pub fn validate_root(_state: &TeamState, _link: &TeamLink) -> ValidationResult {
    ValidationResult::Invalid("root action can only begin the graph".to_string())
}

pub fn validate_add_member(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::AddMember(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_admin_author(state, link));
    if state.has_member(&payload.member.user_id) {
        return ValidationResult::Invalid(format!(
            "member {} already exists",
            payload.member.user_id
        ));
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_remove_member(state: &TeamState, link: &TeamLink) -> ValidationResult {
    // Removing an absent member is an idempotent no-op, so the target is
    // not checked here.
    check!(check_admin_author(state, link));
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_add_role(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::AddRole(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_admin_author(state, link));
    if state.roles.contains_key(&payload.role.role_name) {
        return ValidationResult::Invalid(format!(
            "role {} already exists",
            payload.role.role_name
        ));
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_remove_role(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::RemoveRole(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_admin_author(state, link));
    if payload.role_name == crate::role::ADMIN {
        return ValidationResult::Invalid("the admin role cannot be removed".to_string());
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_add_member_role(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::AddMemberRole(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_admin_author(state, link));
    if !state.has_member(&payload.user_id) {
        return ValidationResult::Invalid(format!("member {} does not exist", payload.user_id));
    }
    if !state.roles.contains_key(&payload.role_name) {
        return ValidationResult::Invalid(format!("role {} does not exist", payload.role_name));
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_remove_member_role(state: &TeamState, link: &TeamLink) -> ValidationResult {
    // Idempotent: removing a role the member does not hold (or from an
    // absent member) is a no-op, not an error.
    check!(check_admin_author(state, link));
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_add_device(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::AddDevice(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_member_author(state, link));

    let author = link.author();
    // Members add their own devices; admins can add devices for anyone.
    if payload.device.user_id != author.user_id && !state.member_is_admin(&author.user_id) {
        return ValidationResult::Invalid(format!(
            "{} cannot add a device for {}",
            author.user_id, payload.device.user_id
        ));
    }
    if !state.has_member(&payload.device.user_id) {
        return ValidationResult::Invalid(format!(
            "member {} does not exist",
            payload.device.user_id
        ));
    }
    if state.device(&payload.device.device_id).is_some() {
        return ValidationResult::Invalid(format!(
            "device {} already exists",
            payload.device.device_id
        ));
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_remove_device(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::RemoveDevice(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_member_author(state, link));

    let author = link.author();
    if let Some(device) = state.device(&payload.device_id) {
        if device.user_id != author.user_id && !state.member_is_admin(&author.user_id) {
            return ValidationResult::Invalid(format!(
                "{} cannot remove a device belonging to {}",
                author.user_id, device.user_id
            ));
        }
    }
    // Absent device: idempotent no-op.
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_invite_member(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::InviteMember(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_admin_author(state, link));
    if state.invitations.contains_key(&payload.invitation.id) {
        return ValidationResult::Invalid(format!(
            "invitation {} already exists",
            payload.invitation.id
        ));
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_invite_device(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::InviteDevice(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    // Any member may invite a device of their own; no admin role needed.
    check!(check_member_author(state, link));
    if state.invitations.contains_key(&payload.invitation.id) {
        return ValidationResult::Invalid(format!(
            "invitation {} already exists",
            payload.invitation.id
        ));
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_revoke_invitation(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::RevokeInvitation(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_admin_author(state, link));
    if !state.invitations.contains_key(&payload.id) {
        return ValidationResult::Invalid(format!("invitation {} does not exist", payload.id));
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_admit_member(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::AdmitMember(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    // Any current member can perform an admission; the proof carries the
    // real authority.
    check!(check_member_author(state, link));

    let Some(invitation) = state.invitation(&payload.proof.id) else {
        return ValidationResult::Invalid(format!(
            "invitation {} does not exist",
            payload.proof.id
        ));
    };

    // Expiry is evaluated lazily against the admitting link's timestamp;
    // there are no background timers and every peer sees the same instant.
    check!(invitation
        .check_available(link.body.timestamp)
        .map_err(map_invite_error));
    check!(validate_proof(&payload.proof, &invitation.invitation).map_err(map_invite_error));

    if state.has_member(&payload.user_id) {
        return ValidationResult::Invalid(format!("member {} already exists", payload.user_id));
    }
    if state.device(&payload.device.device_id).is_some() {
        return ValidationResult::Invalid(format!(
            "device {} already exists",
            payload.device.device_id
        ));
    }
    if payload.device.user_id != payload.user_id {
        return ValidationResult::Invalid("admitted device belongs to another user".to_string());
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_admit_device(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::AdmitDevice(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };

    // The joining device signs its own admission; authority comes from the
    // proof, not from an already-registered device.
    let author = link.author();
    if author.user_id != payload.device.user_id || author.device_id != payload.device.device_id {
        return ValidationResult::Invalid("device admission must be self-authored".to_string());
    }
    if author.public_key != payload.device.keys.signing {
        return ValidationResult::Invalid(
            "signing key does not match the admitted device".to_string(),
        );
    }
    if !state.has_member(&payload.device.user_id) {
        return ValidationResult::Invalid(format!(
            "member {} does not exist",
            payload.device.user_id
        ));
    }

    let Some(invitation) = state.invitation(&payload.proof.id) else {
        return ValidationResult::Invalid(format!(
            "invitation {} does not exist",
            payload.proof.id
        ));
    };
    check!(invitation
        .check_available(link.body.timestamp)
        .map_err(map_invite_error));
    check!(validate_proof(&payload.proof, &invitation.invitation).map_err(map_invite_error));

    if state.device(&payload.device.device_id).is_some() {
        return ValidationResult::Invalid(format!(
            "device {} already exists",
            payload.device.device_id
        ));
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_change_member_keys(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::ChangeMemberKeys(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_member_author(state, link));

    let author = link.author();
    let scope = payload.keys.scope();
    if scope.key_type != KeyType::User || scope.name != author.user_id {
        return ValidationResult::Invalid("members may only change their own keys".to_string());
    }
    check!(check_generation_advances(state, &payload.keys));
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_rotate_keys(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::RotateKeys(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };

    let scope = payload.keys.scope();
    match scope.key_type {
        KeyType::Team | KeyType::Role | KeyType::User => {}
        _ => {
            return ValidationResult::Invalid(format!("cannot rotate keys for scope {scope}"));
        }
    }

    // Members may rotate their own keys; everything else takes an admin.
    if scope.key_type == KeyType::User && link.author().user_id == scope.name {
        check!(check_member_author(state, link));
    } else {
        check!(check_admin_author(state, link));
    }
    if !state.is_valid_recipient(scope) && scope.key_type != KeyType::Team {
        return ValidationResult::Invalid(format!("unknown rotation target {scope}"));
    }
    check!(check_generation_advances(state, &payload.keys));
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_add_server(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::AddServer(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };
    check!(check_admin_author(state, link));
    if state.servers.contains_key(&payload.server.host) {
        return ValidationResult::Invalid(format!(
            "server {} already exists",
            payload.server.host
        ));
    }
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_remove_server(state: &TeamState, link: &TeamLink) -> ValidationResult {
    // Absent server: idempotent no-op, like member removal.
    check!(check_admin_author(state, link));
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_change_server_keys(state: &TeamState, link: &TeamLink) -> ValidationResult {
    let TeamAction::ChangeServerKeys(payload) = &link.body.action else {
        return ValidationResult::Invalid("wrong payload".to_string());
    };

    let scope = payload.keys.scope();
    if scope.key_type != KeyType::Server {
        return ValidationResult::Invalid("not a server keyset".to_string());
    }

    // Either the server changes its own keys, or an admin does it for them.
    let author = link.author();
    if author.user_id == scope.name {
        check!(check_server_author(state, link));
    } else {
        check!(check_admin_author(state, link));
    }

    if !state.servers.contains_key(&scope.name) {
        return ValidationResult::Invalid(format!("server {} does not exist", scope.name));
    }
    check!(check_generation_advances(state, &payload.keys));
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_set_team_name(state: &TeamState, link: &TeamLink) -> ValidationResult {
    check!(check_admin_author(state, link));
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

pub fn validate_message(state: &TeamState, link: &TeamLink) -> ValidationResult {
    check!(check_participant_author(state, link));
    check!(check_lockboxes(state, link));
    ValidationResult::Valid
}

/// A new keyset's generation must be strictly greater than the current one
/// for the same scope.
fn check_generation_advances(
    state: &TeamState,
    keys: &roster_crypto::Keyset,
) -> Result<(), String> {
    if let Some(current) = state.current_generation(keys.scope()) {
        if keys.generation() <= current {
            return Err(format!(
                "key generation must increase: current {}, supplied {}",
                current,
                keys.generation()
            ));
        }
    }
    Ok(())
}
