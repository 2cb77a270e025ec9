//! # Roster Graph
//!
//! An append-only DAG of signed, content-addressed links.
//!
//! Every mutation of shared state is a [`Link`]: an action, the identity of
//! the device that authored it, the hashes of the links it causally follows,
//! and a signature over all of the above. A [`Graph`] is the full set of
//! links plus a distinguished root. Peers exchange graphs and [`Graph::merge`]
//! them; merge is commutative, associative, and idempotent over the link set,
//! so every peer that has seen the same links holds an identical graph.
//!
//! Replay order is provided by [`topological_sort`], which breaks ties
//! between concurrently-ready links with a stable comparator so that every
//! peer computes the same sequence from the same link set.
//!
//! This crate knows nothing about what actions *mean*; it is generic over
//! the action type. Interpretation belongs to the layer above.

pub mod canonical;
pub mod error;
pub mod graph;
pub mod link;
pub mod sort;

pub use canonical::to_canonical_bytes;
pub use error::GraphError;
pub use graph::Graph;
pub use link::{Author, Link, LinkBody, LinkHash};
pub use sort::topological_sort;
