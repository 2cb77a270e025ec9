//! Servers: non-human team participants addressed by host name.

use serde::{Deserialize, Serialize};

use roster_crypto::Keyset;

/// A server that participates in the team (e.g. an always-on relay that
/// syncs and stores the graph). Addressed by host name instead of user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Host name, e.g. "relay.example.com". Unique.
    pub host: String,

    /// The server's public keys.
    pub keys: Keyset,
}
