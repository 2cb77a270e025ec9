//! The graph: a root link plus every link that descends from it.
//!
//! Links reference each other only by hash, never by live pointer. All
//! operations are pure: `append` and `merge` return information about the
//! new state without hidden inputs, so the same calls on the same values
//! produce the same graphs on every peer.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::warn;

use roster_crypto::SigningKeypair;

use crate::error::GraphError;
use crate::link::{Author, Link, LinkBody, LinkHash};
use crate::sort::topological_sort;

/// An append-only DAG of signed links with a single root.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph<A> {
    root: LinkHash,
    links: BTreeMap<LinkHash, Link<A>>,
}

/// Wire form of a graph: the root hash plus every link, sorted by hash.
#[derive(Serialize, Deserialize)]
#[serde(bound(serialize = "A: Serialize", deserialize = "A: DeserializeOwned"))]
struct GraphPack<A> {
    root: LinkHash,
    links: Vec<Link<A>>,
}

impl<A: Serialize + DeserializeOwned + Clone> Graph<A> {
    /// Create a graph containing only a root link.
    pub fn create_root(
        action: A,
        author: Author,
        keypair: &SigningKeypair,
        timestamp: i64,
    ) -> Result<Self, GraphError> {
        let body = LinkBody {
            predecessors: Vec::new(),
            timestamp,
            author,
            action,
        };
        let link = Link::sign(body, keypair)?;
        let root = *link.hash();

        let mut links = BTreeMap::new();
        links.insert(root, link);

        Ok(Self { root, links })
    }

    /// Append a link whose predecessors are the current heads.
    ///
    /// Returns the new link's hash.
    pub fn append(
        &mut self,
        action: A,
        author: Author,
        keypair: &SigningKeypair,
        timestamp: i64,
    ) -> Result<LinkHash, GraphError> {
        let body = LinkBody {
            predecessors: self.heads(),
            timestamp,
            author,
            action,
        };
        let link = Link::sign(body, keypair)?;
        let hash = *link.hash();
        self.links.insert(hash, link);
        Ok(hash)
    }

    /// The root link's hash.
    pub fn root_hash(&self) -> &LinkHash {
        &self.root
    }

    /// The root link.
    pub fn root(&self) -> &Link<A> {
        &self.links[&self.root]
    }

    /// Get a link by hash.
    pub fn get(&self, hash: &LinkHash) -> Option<&Link<A>> {
        self.links.get(hash)
    }

    /// Whether a link is present.
    pub fn contains(&self, hash: &LinkHash) -> bool {
        self.links.contains_key(hash)
    }

    /// Number of links (including the root).
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// A graph always contains at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over all links in hash order.
    pub fn links(&self) -> impl Iterator<Item = &Link<A>> {
        self.links.values()
    }

    /// The heads: hashes with no successors, sorted. More than one under
    /// concurrent authorship.
    pub fn heads(&self) -> Vec<LinkHash> {
        let mut referenced: BTreeSet<LinkHash> = BTreeSet::new();
        for link in self.links.values() {
            referenced.extend(link.body.predecessors.iter().copied());
        }

        self.links
            .keys()
            .filter(|h| !referenced.contains(h))
            .copied()
            .collect()
    }

    /// Map from each link to the links that name it as a predecessor.
    pub fn successor_map(&self) -> BTreeMap<LinkHash, Vec<LinkHash>> {
        let mut successors: BTreeMap<LinkHash, Vec<LinkHash>> = BTreeMap::new();
        for link in self.links.values() {
            for pred in &link.body.predecessors {
                successors.entry(*pred).or_default().push(*link.hash());
            }
        }
        successors
    }

    /// All causal ancestors of a link (excluding the link itself).
    pub fn ancestors(&self, hash: &LinkHash) -> Result<BTreeSet<LinkHash>, GraphError> {
        let start = self.get(hash).ok_or(GraphError::UnknownLink(*hash))?;

        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<LinkHash> = start.body.predecessors.iter().copied().collect();

        while let Some(h) = queue.pop_front() {
            if !seen.insert(h) {
                continue;
            }
            let link = self.get(&h).ok_or(GraphError::MissingPredecessor {
                link: *hash,
                missing: h,
            })?;
            queue.extend(link.body.predecessors.iter().copied());
        }

        Ok(seen)
    }

    /// Whether `a` is a causal ancestor of `b`.
    pub fn is_ancestor(&self, a: &LinkHash, b: &LinkHash) -> Result<bool, GraphError> {
        Ok(self.ancestors(b)?.contains(a))
    }

    /// Merge another graph into this one, producing a new graph.
    ///
    /// Every link not already known locally is re-verified (hash recomputed
    /// from its body, signature checked). Any failure aborts the whole merge:
    /// there is no partial merge. Merging is commutative, associative, and
    /// idempotent over the link set.
    pub fn merge(&self, other: &Graph<A>) -> Result<Graph<A>, GraphError> {
        if self.root != other.root {
            return Err(GraphError::RootMismatch {
                ours: self.root,
                theirs: other.root,
            });
        }

        let mut merged = self.links.clone();
        for (hash, link) in &other.links {
            if merged.contains_key(hash) {
                continue;
            }
            if let Err(e) = link.verify() {
                if e.is_integrity() {
                    warn!(link = %hash, error = %e, "rejected link during merge");
                }
                return Err(e);
            }
            // The map key must match the link's own hash; verify() already
            // recomputed the hash from the body.
            if link.hash() != hash {
                return Err(GraphError::HashMismatch {
                    expected: *hash,
                    computed: *link.hash(),
                });
            }
            merged.insert(*hash, link.clone());
        }

        let graph = Graph {
            root: self.root,
            links: merged,
        };
        graph.check_structure()?;
        Ok(graph)
    }

    /// Serialize to a content-addressed binary pack. Round-trips exactly.
    pub fn save(&self) -> Vec<u8> {
        let pack = GraphPack {
            root: self.root,
            links: self.links.values().cloned().collect(),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&pack, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize a graph, verifying every link.
    pub fn load(bytes: &[u8]) -> Result<Self, GraphError> {
        let pack: GraphPack<A> =
            ciborium::from_reader(bytes).map_err(|e| GraphError::Encoding(e.to_string()))?;

        let mut links = BTreeMap::new();
        for link in pack.links {
            if let Err(e) = link.verify() {
                if e.is_integrity() {
                    warn!(link = %link.hash(), error = %e, "rejected link while loading graph");
                }
                return Err(e);
            }
            links.insert(*link.hash(), link);
        }

        let graph = Graph {
            root: pack.root,
            links,
        };
        graph.check_structure()?;
        Ok(graph)
    }

    /// Structural invariants: the root exists and has no predecessors, it is
    /// the only parentless link, every predecessor resolves, and every link
    /// is reachable from the root.
    fn check_structure(&self) -> Result<(), GraphError> {
        let root = self.links.get(&self.root).ok_or(GraphError::MissingRoot)?;
        if !root.is_root() {
            return Err(GraphError::OrphanLink(self.root));
        }

        for link in self.links.values() {
            if link.hash() != &self.root && link.body.predecessors.is_empty() {
                return Err(GraphError::OrphanLink(*link.hash()));
            }
            for pred in &link.body.predecessors {
                if !self.links.contains_key(pred) {
                    return Err(GraphError::MissingPredecessor {
                        link: *link.hash(),
                        missing: *pred,
                    });
                }
            }
        }

        // A topological sort visits every link exactly once iff the graph is
        // a connected DAG over the root.
        if topological_sort(self).len() != self.links.len() {
            return Err(GraphError::Disconnected);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum TestAction {
        Init,
        Set(String),
    }

    struct Actor {
        keypair: SigningKeypair,
        author: Author,
    }

    fn actor(name: &str, seed_byte: u8) -> Actor {
        let keypair = SigningKeypair::from_seed(&[seed_byte; 32]);
        let author = Author::new(name, format!("{name}-device"), keypair.public_key());
        Actor { keypair, author }
    }

    fn root_graph(founder: &Actor) -> Graph<TestAction> {
        Graph::create_root(
            TestAction::Init,
            founder.author.clone(),
            &founder.keypair,
            1000,
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_append() {
        let alice = actor("alice", 0x01);
        let mut graph = root_graph(&alice);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.heads(), vec![*graph.root_hash()]);

        let h1 = graph
            .append(
                TestAction::Set("a".into()),
                alice.author.clone(),
                &alice.keypair,
                1001,
            )
            .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.heads(), vec![h1]);
        assert_eq!(graph.get(&h1).unwrap().body.predecessors, vec![*graph.root_hash()]);
    }

    #[test]
    fn test_merge_divergent_branches() {
        let alice = actor("alice", 0x01);
        let bob = actor("bob", 0x02);

        let base = root_graph(&alice);

        let mut branch_a = base.clone();
        branch_a
            .append(TestAction::Set("a".into()), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();

        let mut branch_b = base.clone();
        branch_b
            .append(TestAction::Set("b".into()), bob.author.clone(), &bob.keypair, 1002)
            .unwrap();

        let merged_ab = branch_a.merge(&branch_b).unwrap();
        let merged_ba = branch_b.merge(&branch_a).unwrap();

        // Commutative: identical link sets.
        assert_eq!(merged_ab, merged_ba);
        assert_eq!(merged_ab.len(), 3);
        assert_eq!(merged_ab.heads().len(), 2);
    }

    #[test]
    fn test_merge_idempotent() {
        let alice = actor("alice", 0x01);
        let mut graph = root_graph(&alice);
        graph
            .append(TestAction::Set("a".into()), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();

        let merged = graph.merge(&graph).unwrap();
        assert_eq!(merged, graph);

        let twice = merged.merge(&graph).unwrap();
        assert_eq!(twice, graph);
    }

    #[test]
    fn test_merge_rejects_tampered_link() {
        let alice = actor("alice", 0x01);
        let base = root_graph(&alice);

        let mut other = base.clone();
        let h = other
            .append(TestAction::Set("honest".into()), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();

        // Tamper with the action after signing.
        let link = other.links.get_mut(&h).unwrap();
        link.body.action = TestAction::Set("evil".into());

        let result = base.merge(&other);
        assert!(matches!(result, Err(GraphError::HashMismatch { .. })));
    }

    #[test]
    fn test_merge_rejects_missing_predecessor() {
        let alice = actor("alice", 0x01);
        let base = root_graph(&alice);

        let mut other = base.clone();
        let h1 = other
            .append(TestAction::Set("one".into()), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();
        other
            .append(TestAction::Set("two".into()), alice.author.clone(), &alice.keypair, 1002)
            .unwrap();

        // Drop the middle link so its successor dangles.
        other.links.remove(&h1);

        let result = base.merge(&other);
        assert!(matches!(
            result,
            Err(GraphError::MissingPredecessor { .. }) | Err(GraphError::Disconnected)
        ));
    }

    #[test]
    fn test_merge_rejects_different_root() {
        let alice = actor("alice", 0x01);
        let graph_a = root_graph(&alice);
        let graph_b = Graph::create_root(
            TestAction::Init,
            alice.author.clone(),
            &alice.keypair,
            2000, // different timestamp, different root hash
        )
        .unwrap();

        assert!(matches!(
            graph_a.merge(&graph_b),
            Err(GraphError::RootMismatch { .. })
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let alice = actor("alice", 0x01);
        let bob = actor("bob", 0x02);

        let mut graph = root_graph(&alice);
        graph
            .append(TestAction::Set("a".into()), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();
        graph
            .append(TestAction::Set("b".into()), bob.author.clone(), &bob.keypair, 1002)
            .unwrap();

        let bytes = graph.save();
        let loaded: Graph<TestAction> = Graph::load(&bytes).unwrap();
        assert_eq!(graph, loaded);

        // Round-trips exactly.
        assert_eq!(bytes, loaded.save());
    }

    #[test]
    fn test_load_rejects_tampered_pack() {
        let alice = actor("alice", 0x01);
        let mut graph = root_graph(&alice);
        graph
            .append(TestAction::Set("data".into()), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();

        let bytes = graph.save();

        // Flip a byte somewhere in the middle of the pack.
        let mut tampered = bytes.clone();
        let mid = tampered.len() / 2;
        tampered[mid] ^= 0x01;

        assert!(Graph::<TestAction>::load(&tampered).is_err());
    }

    #[test]
    fn test_ancestors() {
        let alice = actor("alice", 0x01);
        let mut graph = root_graph(&alice);
        let root = *graph.root_hash();

        let h1 = graph
            .append(TestAction::Set("one".into()), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();
        let h2 = graph
            .append(TestAction::Set("two".into()), alice.author.clone(), &alice.keypair, 1002)
            .unwrap();

        let ancestors = graph.ancestors(&h2).unwrap();
        assert!(ancestors.contains(&h1));
        assert!(ancestors.contains(&root));
        assert!(!ancestors.contains(&h2));

        assert!(graph.is_ancestor(&root, &h2).unwrap());
        assert!(!graph.is_ancestor(&h2, &root).unwrap());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// One step of concurrent authorship: which branch appends next.
        #[derive(Debug, Clone, Copy)]
        enum Step {
            BranchA,
            BranchB,
            SyncAtoB,
        }

        fn step_strategy() -> impl Strategy<Value = Step> {
            prop_oneof![
                Just(Step::BranchA),
                Just(Step::BranchB),
                Just(Step::SyncAtoB),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn merge_commutes_over_random_histories(
                steps in prop::collection::vec(step_strategy(), 0..12),
            ) {
                let alice = actor("alice", 0x01);
                let bob = actor("bob", 0x02);

                let base = root_graph(&alice);
                let mut branch_a = base.clone();
                let mut branch_b = base.clone();

                for (i, step) in steps.iter().enumerate() {
                    match step {
                        Step::BranchA => {
                            branch_a
                                .append(
                                    TestAction::Set(format!("a{i}")),
                                    alice.author.clone(),
                                    &alice.keypair,
                                    1000 + i as i64,
                                )
                                .unwrap();
                        }
                        Step::BranchB => {
                            branch_b
                                .append(
                                    TestAction::Set(format!("b{i}")),
                                    bob.author.clone(),
                                    &bob.keypair,
                                    1000 + i as i64,
                                )
                                .unwrap();
                        }
                        Step::SyncAtoB => {
                            branch_b = branch_b.merge(&branch_a).unwrap();
                        }
                    }
                }

                let merged_ab = branch_a.merge(&branch_b).unwrap();
                let merged_ba = branch_b.merge(&branch_a).unwrap();

                prop_assert_eq!(&merged_ab, &merged_ba);
                prop_assert_eq!(
                    crate::sort::topological_sort(&merged_ab),
                    crate::sort::topological_sort(&merged_ba)
                );

                // Idempotent: merging again changes nothing.
                let again = merged_ab.merge(&branch_b).unwrap();
                prop_assert_eq!(&again, &merged_ab);

                // Save/load round-trips the merged graph exactly.
                let bytes = merged_ab.save();
                let loaded: Graph<TestAction> = Graph::load(&bytes).unwrap();
                prop_assert_eq!(&loaded, &merged_ab);
            }
        }
    }

    #[test]
    fn test_concurrent_links_are_not_ancestors() {
        let alice = actor("alice", 0x01);
        let bob = actor("bob", 0x02);

        let base = root_graph(&alice);

        let mut branch_a = base.clone();
        let ha = branch_a
            .append(TestAction::Set("a".into()), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();

        let mut branch_b = base.clone();
        let hb = branch_b
            .append(TestAction::Set("b".into()), bob.author.clone(), &bob.keypair, 1002)
            .unwrap();

        let merged = branch_a.merge(&branch_b).unwrap();
        assert!(!merged.is_ancestor(&ha, &hb).unwrap());
        assert!(!merged.is_ancestor(&hb, &ha).unwrap());
    }
}
