//! Error types for graph operations.

use thiserror::Error;

use crate::link::LinkHash;

/// Errors raised while building, merging, or loading a graph.
///
/// Integrity errors mean a link's content does not match its hash or its
/// signature does not verify (possible tampering). Structural errors mean
/// the graph is malformed (missing predecessors, conflicting roots). Both
/// abort the whole operation; there is no partial merge.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("link hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        expected: LinkHash,
        computed: LinkHash,
    },

    #[error("signature verification failed for link {0}")]
    SignatureFailed(LinkHash),

    #[error("link {link} references missing predecessor {missing}")]
    MissingPredecessor { link: LinkHash, missing: LinkHash },

    #[error("graphs have different roots: {ours} vs {theirs}")]
    RootMismatch { ours: LinkHash, theirs: LinkHash },

    #[error("link {0} has no predecessors but is not the root")]
    OrphanLink(LinkHash),

    #[error("root link not present in link set")]
    MissingRoot,

    #[error("graph is not a connected DAG over its root")]
    Disconnected,

    #[error("unknown link: {0}")]
    UnknownLink(LinkHash),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl GraphError {
    /// Whether this is a cryptographic integrity failure (potential attack).
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            GraphError::HashMismatch { .. } | GraphError::SignatureFailed(_)
        )
    }

    /// Whether this is a structural failure (malformed graph).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            GraphError::MissingPredecessor { .. }
                | GraphError::RootMismatch { .. }
                | GraphError::OrphanLink(_)
                | GraphError::MissingRoot
                | GraphError::Disconnected
        )
    }
}
