//! Key material derivation from team state.
//!
//! The graph distributes secrets exclusively through lockboxes, so "which
//! keys do I hold" is itself derived state: starting from the local user's
//! and device's own secrets, open every lockbox addressed to a keyset we
//! hold, add its contents to the ring, and repeat until nothing new opens.
//! Chains are expected: a device keyset opens the user keyset, the user
//! keyset opens a role keyset, the role keyset opens the team keyset.

use roster_crypto::{KeyScope, Keyring, SecretKeyset};
use roster_lockbox::{open, Lockbox};

use crate::error::TeamError;
use crate::state::TeamState;

/// Build the full keyring reachable from the given starting secrets.
pub fn derive_keyring(state: &TeamState, starting: &Keyring) -> Keyring {
    let mut ring = starting.clone();

    loop {
        let mut grew = false;
        for lockbox in &state.lockboxes {
            if ring
                .get_by_metadata(&lockbox.contents.metadata)
                .is_some()
            {
                continue;
            }
            let Some(recipient_keys) = ring.get_by_metadata(&lockbox.recipient.metadata) else {
                continue;
            };
            if let Ok(contents) = open(lockbox, recipient_keys) {
                ring.add(contents);
                grew = true;
            }
        }
        if !grew {
            return ring;
        }
    }
}

/// The latest secret keyset for a scope, reachable from the starting ring.
pub fn secret_keys(
    state: &TeamState,
    starting: &Keyring,
    scope: &KeyScope,
) -> Result<SecretKeyset, TeamError> {
    derive_keyring(state, starting)
        .get(scope)
        .cloned()
        .ok_or_else(|| TeamError::MissingKeys(scope.to_string()))
}

/// Lockboxes that re-address a rotated keyset to everyone who held the
/// outgoing generation and is still a valid recipient.
///
/// Recipients of older generations than the outgoing one are not
/// re-addressed: access they lost at an earlier rotation stays lost.
pub fn rotation_lockboxes(
    state: &TeamState,
    new_keys: &SecretKeyset,
) -> Result<Vec<Lockbox>, TeamError> {
    let scope = new_keys.scope();
    let outgoing_generation = new_keys.generation().saturating_sub(1);

    let mut lockboxes = Vec::new();
    let mut seen_recipients = Vec::new();

    for old in &state.lockboxes {
        if old.contents.scope() != scope || old.contents.generation() != outgoing_generation {
            continue;
        }
        if !state.is_valid_recipient(old.recipient.scope()) {
            continue;
        }
        if seen_recipients.contains(&old.recipient) {
            continue;
        }
        seen_recipients.push(old.recipient.clone());
        lockboxes.push(roster_lockbox::rotate(old, new_keys)?);
    }

    Ok(lockboxes)
}
