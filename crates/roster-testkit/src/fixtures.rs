//! Test fixtures and helpers.
//!
//! All key material is derived from the user's name, so fixtures are fully
//! deterministic and tests are reproducible.

use roster_crypto::{KeyScope, Keyring, SecretKeyset};
use roster_invite::generate_proof;
use roster_team::{Device, LocalContext, LocalDevice, LocalMember, Member, Team, TeamError};

/// A named test user with a deterministic context (user + device keys).
#[derive(Debug, Clone)]
pub struct TestUser {
    pub name: String,
    pub context: LocalContext,
}

impl TestUser {
    /// Create a user whose keys derive from their name.
    pub fn named(name: &str) -> Self {
        let device_id = format!("{name}-laptop");
        let context = LocalContext {
            member: LocalMember {
                user_id: name.to_string(),
                user_name: name.to_string(),
                keys: SecretKeyset::from_seed(KeyScope::user(name), name),
            },
            device: LocalDevice {
                device_id: device_id.clone(),
                device_name: format!("{name}'s laptop"),
                keys: SecretKeyset::from_seed(KeyScope::device(&device_id), name),
            },
        };
        Self {
            name: name.to_string(),
            context,
        }
    }

    /// The user's id.
    pub fn user_id(&self) -> &str {
        &self.name
    }

    /// The user's public member record with the given roles.
    pub fn member(&self, roles: &[&str]) -> Member {
        self.context
            .member_public(roles.iter().map(|r| r.to_string()).collect())
    }

    /// The user's public device record.
    pub fn device(&self) -> Device {
        self.context.device_public()
    }

    /// A second (or nth) device for this user.
    pub fn extra_device(&self, suffix: &str) -> (Device, SecretKeyset) {
        let device_id = format!("{}-{suffix}", self.name);
        let keys = SecretKeyset::from_seed(KeyScope::device(&device_id), &device_id);
        let device = Device {
            user_id: self.name.clone(),
            device_id: device_id.clone(),
            device_name: device_id,
            keys: keys.public(),
        };
        (device, keys)
    }
}

/// Create a team founded by the given user, with deterministic team keys.
pub fn founder_team(team_name: &str, founder: &TestUser) -> Team {
    let team_keys = SecretKeyset::from_seed(KeyScope::team(), team_name);
    Team::create(team_name, team_keys, founder.context.clone())
        .expect("team creation should succeed")
}

/// Run the full join flow: the joiner derives a proof from the seed, an
/// existing member's team admits them, and the joiner loads the resulting
/// graph as their own team instance.
pub fn join_as_member(
    admitting_team: &mut Team,
    joiner: &TestUser,
    seed: &str,
) -> Result<Team, TeamError> {
    let proof = generate_proof(seed);
    admitting_team.admit_member(
        proof,
        joiner.user_id(),
        &joiner.name,
        joiner.context.member.keys.public(),
        joiner.device(),
    )?;

    Team::load(
        &admitting_team.save(),
        joiner.context.clone(),
        Keyring::new(),
    )
}
