//! Devices: the actual holders of signing keys.
//!
//! Members act through devices; every link in the graph is signed by a
//! device key, and the reducer checks the signing device against the
//! member's registered devices.

use serde::{Deserialize, Serialize};

use roster_crypto::Keyset;

/// A device belonging to a member, with its public keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// The member this device belongs to.
    pub user_id: String,

    /// Unique device identifier.
    pub device_id: String,

    /// Human-facing device name ("alice's laptop").
    pub device_name: String,

    /// The device's public keys.
    pub keys: Keyset,
}
