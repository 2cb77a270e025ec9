//! Team members.

use serde::{Deserialize, Serialize};

use roster_crypto::Keyset;

use crate::device::Device;
use crate::role::ADMIN;

/// A user that belongs to the team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Unique ID, fixed at creation.
    pub user_id: String,

    /// Username or email. Unique, but only used to connect human identities
    /// with other systems, never for lookups.
    pub user_name: String,

    /// The member's public keys.
    pub keys: Keyset,

    /// Names of the roles this member holds.
    pub roles: Vec<String>,

    /// Devices the member has registered.
    pub devices: Vec<Device>,
}

impl Member {
    /// Whether the member holds the given role.
    pub fn has_role(&self, role_name: &str) -> bool {
        self.roles.iter().any(|r| r == role_name)
    }

    /// Whether the member holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN)
    }

    /// Find one of the member's devices by id.
    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_crypto::{KeyScope, SecretKeyset};

    fn member(roles: &[&str]) -> Member {
        Member {
            user_id: "alice".into(),
            user_name: "Alice".into(),
            keys: SecretKeyset::from_seed(KeyScope::user("alice"), "alice").public(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            devices: vec![],
        }
    }

    #[test]
    fn test_has_role() {
        let m = member(&["admin", "managers"]);
        assert!(m.has_role("managers"));
        assert!(m.is_admin());
        assert!(!m.has_role("finance"));
    }

    #[test]
    fn test_not_admin() {
        let m = member(&["managers"]);
        assert!(!m.is_admin());
    }
}
