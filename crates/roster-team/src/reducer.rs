//! The reducer: replay an ordered graph into team state.
//!
//! Two-pass replay, as the removal race demands:
//!
//! 1. A provisional pass replays every link against the accumulator and
//!    records which member removals were themselves valid.
//! 2. The membership rule enforcer prunes links authored concurrently with
//!    a valid removal of their author.
//! 3. The final pass replays again, skipping pruned links, dispatching each
//!    action to its (validator, transform) pair. Invalid links are skipped
//!    but recorded; they stay in the graph for auditability.

use tracing::debug;

use roster_graph::{topological_sort, LinkHash};

use crate::action::TeamAction;
use crate::enforcer::{enforce_membership_rules, EnforcementOutcome, RemovalRecord};
use crate::error::TeamError;
use crate::state::TeamState;
use crate::transforms;
use crate::validators::{self, ValidationResult};
use crate::{TeamGraph, TeamLink};

/// A link that failed validation during replay, kept for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLink {
    pub hash: LinkHash,
    pub action_kind: &'static str,
    pub reason: String,
}

/// The result of reducing a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceOutcome {
    /// The derived state.
    pub state: TeamState,

    /// Links whose effects were skipped, in replay order.
    pub invalid_links: Vec<InvalidLink>,
}

type ValidatorFn = fn(&TeamState, &TeamLink) -> ValidationResult;
type TransformFn = fn(TeamState, &TeamLink) -> TeamState;

/// The (validator, transform) pair for an action variant.
fn handlers(action: &TeamAction) -> (ValidatorFn, TransformFn) {
    match action {
        TeamAction::Root(_) => (validators::validate_root, transforms::apply_root),
        TeamAction::AddMember(_) => (validators::validate_add_member, transforms::apply_add_member),
        TeamAction::RemoveMember(_) => (
            validators::validate_remove_member,
            transforms::apply_remove_member,
        ),
        TeamAction::AddRole(_) => (validators::validate_add_role, transforms::apply_add_role),
        TeamAction::RemoveRole(_) => (
            validators::validate_remove_role,
            transforms::apply_remove_role,
        ),
        TeamAction::AddMemberRole(_) => (
            validators::validate_add_member_role,
            transforms::apply_add_member_role,
        ),
        TeamAction::RemoveMemberRole(_) => (
            validators::validate_remove_member_role,
            transforms::apply_remove_member_role,
        ),
        TeamAction::AddDevice(_) => (validators::validate_add_device, transforms::apply_add_device),
        TeamAction::RemoveDevice(_) => (
            validators::validate_remove_device,
            transforms::apply_remove_device,
        ),
        TeamAction::InviteMember(_) => (validators::validate_invite_member, transforms::apply_invite),
        TeamAction::InviteDevice(_) => (validators::validate_invite_device, transforms::apply_invite),
        TeamAction::RevokeInvitation(_) => (
            validators::validate_revoke_invitation,
            transforms::apply_revoke_invitation,
        ),
        TeamAction::AdmitMember(_) => (
            validators::validate_admit_member,
            transforms::apply_admit_member,
        ),
        TeamAction::AdmitDevice(_) => (
            validators::validate_admit_device,
            transforms::apply_admit_device,
        ),
        TeamAction::ChangeMemberKeys(_) => (
            validators::validate_change_member_keys,
            transforms::apply_change_member_keys,
        ),
        TeamAction::RotateKeys(_) => (
            validators::validate_rotate_keys,
            transforms::apply_rotate_keys,
        ),
        TeamAction::AddServer(_) => (validators::validate_add_server, transforms::apply_add_server),
        TeamAction::RemoveServer(_) => (
            validators::validate_remove_server,
            transforms::apply_remove_server,
        ),
        TeamAction::ChangeServerKeys(_) => (
            validators::validate_change_server_keys,
            transforms::apply_change_server_keys,
        ),
        TeamAction::SetTeamName(_) => (
            validators::validate_set_team_name,
            transforms::apply_set_team_name,
        ),
        TeamAction::Message(_) => (validators::validate_message, transforms::apply_message),
    }
}

/// Derive team state from a graph.
pub fn reduce(graph: &TeamGraph) -> Result<ReduceOutcome, TeamError> {
    let root = graph.root();
    let TeamAction::Root(root_payload) = &root.body.action else {
        return Err(TeamError::InvalidRoot);
    };
    if root.author().user_id != root_payload.root_member.user_id
        || root.author().public_key != root_payload.root_device.keys.signing
    {
        return Err(TeamError::InvalidRoot);
    }

    let order = topological_sort(graph);

    // Pass 1: provisional replay to find which removals are themselves
    // valid. The resulting state is discarded.
    let provisional = replay(graph, &order, &EnforcementOutcome::default());
    let removals = provisional.removals;

    // Prune links by concurrently-removed authors.
    let enforcement = enforce_membership_rules(graph, &order, &removals);

    // Pass 2: the authoritative replay.
    let mut replayed = replay(graph, &order, &enforcement);
    replayed.state.head = graph.heads();

    Ok(ReduceOutcome {
        state: replayed.state,
        invalid_links: replayed.invalid_links,
    })
}

struct ReplayOutcome {
    state: TeamState,
    invalid_links: Vec<InvalidLink>,
    removals: Vec<RemovalRecord>,
}

fn replay(graph: &TeamGraph, order: &[LinkHash], enforcement: &EnforcementOutcome) -> ReplayOutcome {
    let mut state = TeamState {
        pending_key_rotations: enforcement.pending_key_rotations.clone(),
        ..TeamState::default()
    };
    let mut invalid_links = Vec::new();
    let mut removals = Vec::new();

    for (position, hash) in order.iter().enumerate() {
        let link = graph.get(hash).expect("ordered link must exist");
        let action = &link.body.action;

        // The root is applied without validation; it brings the team into
        // existence, so there is no prior state to validate against.
        if position == 0 {
            state = transforms::apply_root(state, link);
            state.lockboxes.extend(action.lockboxes().iter().cloned());
            continue;
        }

        if let Some(reason) = enforcement.pruned.get(hash) {
            debug!(link = %hash, reason = %reason, "link pruned by membership rules");
            invalid_links.push(InvalidLink {
                hash: *hash,
                action_kind: action.kind(),
                reason: reason.clone(),
            });
            continue;
        }

        let (validate, apply) = handlers(action);
        match validate(&state, link) {
            ValidationResult::Valid => {
                if let TeamAction::RemoveMember(payload) = action {
                    // Only a removal that actually removed someone counts
                    // for the enforcer; idempotent no-ops do not.
                    if state.has_member(&payload.user_id) {
                        removals.push(RemovalRecord {
                            hash: *hash,
                            removed_user: payload.user_id.clone(),
                        });
                    }
                }
                state.lockboxes.extend(action.lockboxes().iter().cloned());
                state = apply(state, link);
            }
            ValidationResult::Invalid(reason) => {
                debug!(link = %hash, kind = action.kind(), reason = %reason, "link failed validation");
                invalid_links.push(InvalidLink {
                    hash: *hash,
                    action_kind: action.kind(),
                    reason,
                });
            }
        }
    }

    ReplayOutcome {
        state,
        invalid_links,
        removals,
    }
}
