//! The membership rule enforcer.
//!
//! Resolves the "concurrent removal vs. action by the removed actor" race,
//! always in favor of removal: a link authored by a user is pruned when a
//! valid removal of that user exists on a concurrent branch. Links causally
//! *before* the removal are untouched, and links causally *after* it are
//! left to the validators (the author is simply no longer a member at that
//! point, unless they were legitimately re-added).
//!
//! Pruning an admission also flags the admitted user for mandatory key
//! rotation: they may have seen key material they were never entitled to.

use std::collections::{BTreeMap, BTreeSet};

use roster_graph::LinkHash;

use crate::action::TeamAction;
use crate::{TeamGraph, TeamLink};

/// A valid member removal observed during the provisional replay pass.
#[derive(Debug, Clone)]
pub struct RemovalRecord {
    /// The REMOVE_MEMBER link.
    pub hash: LinkHash,
    /// The user it removed.
    pub removed_user: String,
}

/// The enforcer's verdict over an ordered link list.
#[derive(Debug, Default)]
pub struct EnforcementOutcome {
    /// Links to skip during the final replay pass, with reasons.
    pub pruned: BTreeMap<LinkHash, String>,

    /// Users whose admission was pruned; their key exposure must be
    /// repaired by rotation.
    pub pending_key_rotations: BTreeSet<String>,
}

/// Mark invalid every link whose author was removed at or concurrent with
/// the link's authorship.
///
/// Removals are processed in replay order; a removal that was itself pruned
/// by an earlier removal has no effect (so mutual concurrent removals
/// resolve deterministically: the one that sorts first wins).
pub fn enforce_membership_rules(
    graph: &TeamGraph,
    order: &[LinkHash],
    removals: &[RemovalRecord],
) -> EnforcementOutcome {
    let mut outcome = EnforcementOutcome::default();
    let mut ancestor_cache: BTreeMap<LinkHash, BTreeSet<LinkHash>> = BTreeMap::new();

    for removal in removals {
        if outcome.pruned.contains_key(&removal.hash) {
            continue;
        }

        let removal_ancestors = ancestors_of(graph, &mut ancestor_cache, &removal.hash);

        for hash in order {
            if *hash == removal.hash || outcome.pruned.contains_key(hash) {
                continue;
            }
            let Some(link) = graph.get(hash) else {
                continue;
            };
            if link.author().user_id != removal.removed_user {
                continue;
            }

            // Causally before the removal: legitimate.
            if removal_ancestors.contains(hash) {
                continue;
            }
            // Causally after the removal: the validators see a non-member
            // author (or a legitimately re-added one) and decide there.
            let link_ancestors = ancestors_of(graph, &mut ancestor_cache, hash);
            if link_ancestors.contains(&removal.hash) {
                continue;
            }

            // Concurrent with the removal: removal wins.
            outcome.pruned.insert(
                *hash,
                format!(
                    "author {} was removed on a concurrent branch",
                    removal.removed_user
                ),
            );
            flag_reversed_admission(link, &mut outcome.pending_key_rotations);
        }
    }

    outcome
}

fn ancestors_of(
    graph: &TeamGraph,
    cache: &mut BTreeMap<LinkHash, BTreeSet<LinkHash>>,
    hash: &LinkHash,
) -> BTreeSet<LinkHash> {
    if let Some(found) = cache.get(hash) {
        return found.clone();
    }
    // The graph was structurally validated before replay, so every
    // predecessor resolves.
    let ancestors = graph.ancestors(hash).unwrap_or_default();
    cache.insert(*hash, ancestors.clone());
    ancestors
}

fn flag_reversed_admission(link: &TeamLink, pending: &mut BTreeSet<String>) {
    match &link.body.action {
        TeamAction::AdmitMember(p) => {
            pending.insert(p.user_id.clone());
        }
        TeamAction::AddMember(p) => {
            pending.insert(p.member.user_id.clone());
        }
        _ => {}
    }
}
