//! Links: signed, content-addressed graph nodes.
//!
//! A link is immutable once created. Its hash is a pure function of its
//! body; any mutation invalidates both the hash and the signature.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use roster_crypto::{Signature, SigningKeypair, SigningPublicKey};

use crate::canonical::to_canonical_bytes;
use crate::error::GraphError;

/// Domain prefix for link hashes.
const HASH_DOMAIN: &[u8] = b"roster-graph-v1-hash:";

/// Domain prefix for link signatures.
const SIGN_DOMAIN: &[u8] = b"roster-graph-v1-sign:";

/// A 32-byte link identifier: Blake3 over the canonical body bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkHash(pub [u8; 32]);

impl LinkHash {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for LinkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for LinkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for LinkHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The identity of the device that signed a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// The user the signing device belongs to.
    pub user_id: String,

    /// The signing device.
    pub device_id: String,

    /// The device's public signing key.
    pub public_key: SigningPublicKey,
}

impl Author {
    /// Create a new author identity.
    pub fn new(
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        public_key: SigningPublicKey,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
            public_key,
        }
    }
}

/// The signed portion of a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkBody<A> {
    /// Hashes of the links this one causally follows (sorted). Empty only
    /// for the root.
    pub predecessors: Vec<LinkHash>,

    /// Author-claimed timestamp (Unix milliseconds). Untrusted, but part of
    /// the signed body so it cannot be altered after the fact.
    pub timestamp: i64,

    /// The signing-device identity.
    pub author: Author,

    /// The action this link carries.
    pub action: A,
}

impl<A: Serialize> LinkBody<A> {
    /// Canonical bytes of this body (hash and signature input).
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, GraphError> {
        to_canonical_bytes(self)
    }
}

/// A complete link: body, content hash, and signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link<A> {
    /// Blake3 hash of the canonical body bytes.
    pub hash: LinkHash,

    /// The signed body.
    pub body: LinkBody<A>,

    /// Ed25519 signature by the author's device key over the body bytes.
    pub signature: Signature,
}

impl<A: Serialize + DeserializeOwned + Clone> Link<A> {
    /// Build and sign a link.
    pub fn sign(body: LinkBody<A>, keypair: &SigningKeypair) -> Result<Self, GraphError> {
        let bytes = body.canonical_bytes()?;
        let hash = hash_body(&bytes);
        let signature = keypair.sign(&sign_message(&bytes));

        Ok(Self {
            hash,
            body,
            signature,
        })
    }

    /// The link's content hash.
    pub fn hash(&self) -> &LinkHash {
        &self.hash
    }

    /// The author identity.
    pub fn author(&self) -> &Author {
        &self.body.author
    }

    /// Whether this is a root link (no predecessors).
    pub fn is_root(&self) -> bool {
        self.body.predecessors.is_empty()
    }

    /// Verify the link's hash and signature against its body.
    ///
    /// Called for every link received from a peer; a failure here is a
    /// potential attack and aborts the surrounding merge.
    pub fn verify(&self) -> Result<(), GraphError> {
        let bytes = self.body.canonical_bytes()?;

        let computed = hash_body(&bytes);
        if computed != self.hash {
            return Err(GraphError::HashMismatch {
                expected: self.hash,
                computed,
            });
        }

        self.body
            .author
            .public_key
            .verify(&sign_message(&bytes), &self.signature)
            .map_err(|_| GraphError::SignatureFailed(self.hash))
    }
}

/// Hash canonical body bytes with domain separation.
fn hash_body(body_bytes: &[u8]) -> LinkHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(HASH_DOMAIN);
    hasher.update(body_bytes);
    LinkHash(*hasher.finalize().as_bytes())
}

/// Construct the signed message for body bytes.
fn sign_message(body_bytes: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(SIGN_DOMAIN.len() + body_bytes.len());
    message.extend_from_slice(SIGN_DOMAIN);
    message.extend_from_slice(body_bytes);
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum TestAction {
        Set(String),
    }

    fn test_author(keypair: &SigningKeypair) -> Author {
        Author::new("alice", "alice-laptop", keypair.public_key())
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = SigningKeypair::from_seed(&[0x42; 32]);
        let body = LinkBody {
            predecessors: vec![],
            timestamp: 1736870400000,
            author: test_author(&keypair),
            action: TestAction::Set("hello".into()),
        };

        let link = Link::sign(body, &keypair).unwrap();
        assert!(link.verify().is_ok());
        assert!(link.is_root());
    }

    #[test]
    fn test_hash_deterministic() {
        let keypair = SigningKeypair::from_seed(&[0x42; 32]);
        let body = LinkBody {
            predecessors: vec![],
            timestamp: 1736870400000,
            author: test_author(&keypair),
            action: TestAction::Set("hello".into()),
        };

        let link1 = Link::sign(body.clone(), &keypair).unwrap();
        let link2 = Link::sign(body, &keypair).unwrap();
        assert_eq!(link1.hash, link2.hash);
    }

    #[test]
    fn test_tampered_action_detected() {
        let keypair = SigningKeypair::from_seed(&[0x42; 32]);
        let body = LinkBody {
            predecessors: vec![],
            timestamp: 1736870400000,
            author: test_author(&keypair),
            action: TestAction::Set("hello".into()),
        };

        let mut link = Link::sign(body, &keypair).unwrap();
        link.body.action = TestAction::Set("tampered".into());

        assert!(matches!(
            link.verify(),
            Err(GraphError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_forged_signature_detected() {
        let keypair = SigningKeypair::from_seed(&[0x42; 32]);
        let forger = SigningKeypair::from_seed(&[0x66; 32]);

        let body = LinkBody {
            predecessors: vec![],
            timestamp: 1736870400000,
            author: test_author(&keypair),
            action: TestAction::Set("hello".into()),
        };

        // Forger signs a body claiming the honest author's identity.
        let bytes = body.canonical_bytes().unwrap();
        let mut link = Link::sign(body, &keypair).unwrap();
        link.signature = forger.sign(&bytes);

        assert!(matches!(
            link.verify(),
            Err(GraphError::SignatureFailed(_))
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let keypair = SigningKeypair::from_seed(&[0x42; 32]);
        let body = LinkBody {
            predecessors: vec![LinkHash::from_bytes([0xab; 32])],
            timestamp: 1736870400000,
            author: test_author(&keypair),
            action: TestAction::Set("payload".into()),
        };

        let link = Link::sign(body, &keypair).unwrap();

        let mut buf = Vec::new();
        ciborium::into_writer(&link, &mut buf).unwrap();
        let recovered: Link<TestAction> = ciborium::from_reader(buf.as_slice()).unwrap();

        assert_eq!(link, recovered);
        assert!(recovered.verify().is_ok());
    }
}
