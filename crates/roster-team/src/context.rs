//! The local actor: who is running this code, with which secrets.

use roster_crypto::SecretKeyset;
use roster_graph::Author;

use crate::device::Device;
use crate::member::Member;

/// The local user, with their secret keys.
#[derive(Debug, Clone)]
pub struct LocalMember {
    pub user_id: String,
    pub user_name: String,
    pub keys: SecretKeyset,
}

/// The local device, with its secret keys.
#[derive(Debug, Clone)]
pub struct LocalDevice {
    pub device_id: String,
    pub device_name: String,
    pub keys: SecretKeyset,
}

/// The current user and device. Every link this process authors is signed
/// by the device key and attributed to this identity.
#[derive(Debug, Clone)]
pub struct LocalContext {
    pub member: LocalMember,
    pub device: LocalDevice,
}

impl LocalContext {
    /// The author identity for links signed by this context.
    pub fn author(&self) -> Author {
        Author::new(
            self.member.user_id.clone(),
            self.device.device_id.clone(),
            self.device.keys.signing.public_key(),
        )
    }

    /// The public record of the local device.
    pub fn device_public(&self) -> Device {
        Device {
            user_id: self.member.user_id.clone(),
            device_id: self.device.device_id.clone(),
            device_name: self.device.device_name.clone(),
            keys: self.device.keys.public(),
        }
    }

    /// The public record of the local member, holding the given roles and
    /// this context's device.
    pub fn member_public(&self, roles: Vec<String>) -> Member {
        Member {
            user_id: self.member.user_id.clone(),
            user_name: self.member.user_name.clone(),
            keys: self.member.keys.public(),
            roles,
            devices: vec![self.device_public()],
        }
    }
}
