//! Deterministic topological ordering.
//!
//! The reducer must apply actions in a single reproducible sequence despite
//! concurrent branches, so ties between links whose predecessors are all
//! sequenced are broken by a stable comparator over (author device id, link
//! hash). Any peer sorting the same link set gets the same order.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::graph::Graph;
use crate::link::LinkHash;

/// Sort key for concurrently-ready links.
type ReadyKey = (String, LinkHash);

/// Produce a deterministic topological order over the graph, root first.
///
/// If the graph is not a connected DAG the result is shorter than the link
/// count; [`Graph`] construction rejects such graphs.
pub fn topological_sort<A: Serialize + DeserializeOwned + Clone>(
    graph: &Graph<A>,
) -> Vec<LinkHash> {
    let mut pending: BTreeMap<LinkHash, usize> = BTreeMap::new();
    for link in graph.links() {
        pending.insert(*link.hash(), link.body.predecessors.len());
    }

    let successors = graph.successor_map();

    // Min-heap of ready links, keyed by (device_id, hash).
    let mut ready: BinaryHeap<Reverse<ReadyKey>> = BinaryHeap::new();
    ready.push(Reverse(ready_key(graph, graph.root_hash())));

    let mut order = Vec::with_capacity(graph.len());
    while let Some(Reverse((_, hash))) = ready.pop() {
        order.push(hash);

        if let Some(next) = successors.get(&hash) {
            for succ in next {
                let remaining = pending
                    .get_mut(succ)
                    .expect("successor must be a known link");
                *remaining -= 1;
                if *remaining == 0 {
                    ready.push(Reverse(ready_key(graph, succ)));
                }
            }
        }
    }

    order
}

fn ready_key<A: Serialize + DeserializeOwned + Clone>(
    graph: &Graph<A>,
    hash: &LinkHash,
) -> ReadyKey {
    let link = graph.get(hash).expect("hash must be a known link");
    (link.author().device_id.clone(), *hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Author;
    use roster_crypto::SigningKeypair;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum TestAction {
        Init,
        Tag(u32),
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

    #[test]
    fn test_linear_chain_in_append_order() {
        let alice = actor("alice", 0x01);
        let mut graph =
            Graph::create_root(TestAction::Init, alice.author.clone(), &alice.keypair, 1000)
                .unwrap();
        let root = *graph.root_hash();

        let h1 = graph
            .append(TestAction::Tag(1), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();
        let h2 = graph
            .append(TestAction::Tag(2), alice.author.clone(), &alice.keypair, 1002)
            .unwrap();

        assert_eq!(topological_sort(&graph), vec![root, h1, h2]);
    }

    #[test]
    fn test_concurrent_branches_same_order_for_all_peers() {
        let alice = actor("alice", 0x01);
        let bob = actor("bob", 0x02);

        let base =
            Graph::create_root(TestAction::Init, alice.author.clone(), &alice.keypair, 1000)
                .unwrap();

        let mut branch_a = base.clone();
        branch_a
            .append(TestAction::Tag(1), alice.author.clone(), &alice.keypair, 1001)
            .unwrap();

        let mut branch_b = base.clone();
        branch_b
            .append(TestAction::Tag(2), bob.author.clone(), &bob.keypair, 1002)
            .unwrap();

        let merged_ab = branch_a.merge(&branch_b).unwrap();
        let merged_ba = branch_b.merge(&branch_a).unwrap();

        // Merge order must not affect the replay order.
        assert_eq!(topological_sort(&merged_ab), topological_sort(&merged_ba));
    }

    #[test]
    fn test_predecessors_always_precede() {
        let alice = actor("alice", 0x01);
        let bob = actor("bob", 0x02);
        let carol = actor("carol", 0x03);

        let base =
            Graph::create_root(TestAction::Init, alice.author.clone(), &alice.keypair, 1000)
                .unwrap();

        // Three divergent branches with a few links each.
        let mut branches = Vec::new();
        for (i, who) in [&alice, &bob, &carol].iter().enumerate() {
            let mut branch = base.clone();
            for j in 0..3 {
                branch
                    .append(
                        TestAction::Tag((i * 10 + j) as u32),
                        who.author.clone(),
                        &who.keypair,
                        1000 + j as i64,
                    )
                    .unwrap();
            }
            branches.push(branch);
        }

        let merged = branches[0]
            .merge(&branches[1])
            .unwrap()
            .merge(&branches[2])
            .unwrap();

        let order = topological_sort(&merged);
        assert_eq!(order.len(), merged.len());

        let position: BTreeMap<_, _> = order.iter().enumerate().map(|(i, h)| (*h, i)).collect();
        for link in merged.links() {
            for pred in &link.body.predecessors {
                assert!(position[pred] < position[link.hash()]);
            }
        }
    }
}
