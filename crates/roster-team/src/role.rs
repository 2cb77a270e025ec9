//! Roles and permissions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The built-in administrator role.
///
/// Admins can change membership, roles, servers, invitations, and keys.
pub const ADMIN: &str = "admin";

/// Named permission flags attached to a role.
pub type PermissionsMap = BTreeMap<String, bool>;

/// A role that members can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_name: String,
    pub permissions: PermissionsMap,
}

impl Role {
    /// Create a role with no special permissions.
    pub fn new(role_name: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            permissions: PermissionsMap::new(),
        }
    }

    /// The built-in admin role.
    pub fn admin() -> Self {
        let mut permissions = PermissionsMap::new();
        permissions.insert("all".to_string(), true);
        Self {
            role_name: ADMIN.to_string(),
            permissions,
        }
    }
}
