//! Convergence properties: peers that merge the same links in any order
//! derive identical team state, whatever was authored concurrently.

use proptest::prelude::*;

use roster_team::{Role, Team, ADMIN};
use roster_testkit::{founder_team, join_as_member, TestUser};

/// A concurrent operation a branch may perform. Parameters are drawn from
/// small pools so branches collide on names and ids often.
#[derive(Debug, Clone)]
enum Op {
    AddRole(u8),
    RemoveRole(u8),
    SetTeamName(u8),
    PostMessage(u8),
    Invite(u8),
    RemoveMemberRole(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4).prop_map(Op::AddRole),
        (0u8..4).prop_map(Op::RemoveRole),
        (0u8..4).prop_map(Op::SetTeamName),
        (0u8..8).prop_map(Op::PostMessage),
        (0u8..4).prop_map(Op::Invite),
        (0u8..4).prop_map(Op::RemoveMemberRole),
    ]
}

fn apply(team: &mut Team, op: &Op) {
    let result = match op {
        Op::AddRole(n) => team.add_role(Role::new(format!("role-{n}"))),
        Op::RemoveRole(n) => team.remove_role(&format!("role-{n}")),
        Op::SetTeamName(n) => team.set_team_name(&format!("name-{n}")),
        Op::PostMessage(n) => {
            team.post_message(ciborium::value::Value::Text(format!("message {n}")))
        }
        Op::Invite(n) => team
            .invite_member(Some(format!("seed-{n}")), 0, 1)
            .map(|_| ()),
        Op::RemoveMemberRole(n) => team.remove_member_role("bob", &format!("role-{n}")),
    };
    // Facade-level failures are fine (duplicate ids and the like get caught
    // by validators on replay anyway); the property under test is
    // convergence, not success of every op.
    let _ = result;
}

/// Two admins on divergent branches, then a merge in both directions.
fn two_branch_setup() -> (Team, Team) {
    let alice = TestUser::named("alice");
    let bob = TestUser::named("bob");

    let mut alice_team = founder_team("T", &alice);
    alice_team
        .invite_member(Some("join-seed".to_string()), 0, 1)
        .unwrap();
    let mut bob_team = join_as_member(&mut alice_team, &bob, "join-seed").unwrap();
    alice_team.add_member_role("bob", ADMIN).unwrap();
    bob_team.merge(&alice_team.save()).unwrap();

    (alice_team, bob_team)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn merge_order_does_not_matter(
        ops_a in prop::collection::vec(op_strategy(), 0..6),
        ops_b in prop::collection::vec(op_strategy(), 0..6),
    ) {
        let (mut team_a, mut team_b) = two_branch_setup();

        for op in &ops_a {
            apply(&mut team_a, op);
        }
        for op in &ops_b {
            apply(&mut team_b, op);
        }

        let graph_a = team_a.graph().clone();
        let graph_b = team_b.graph().clone();

        team_a.merge_graph(&graph_b).unwrap();
        team_b.merge_graph(&graph_a).unwrap();

        // Identical link sets...
        prop_assert_eq!(team_a.graph(), team_b.graph());
        // ...and identical derived state, byte for byte.
        prop_assert_eq!(team_a.state(), team_b.state());
        prop_assert_eq!(team_a.state().digest(), team_b.state().digest());
        // The audit trails agree too.
        prop_assert_eq!(team_a.invalid_links(), team_b.invalid_links());
    }

    #[test]
    fn merge_is_idempotent(
        ops in prop::collection::vec(op_strategy(), 0..6),
    ) {
        let (mut team_a, team_b) = two_branch_setup();

        for op in &ops {
            apply(&mut team_a, op);
        }

        let before = team_a.state().clone();
        let own_graph = team_a.graph().clone();
        team_a.merge_graph(&own_graph).unwrap();
        prop_assert_eq!(team_a.state(), &before);

        // Re-merging an already-absorbed peer graph changes nothing.
        team_a.merge_graph(team_b.graph()).unwrap();
        let after_first = team_a.state().clone();
        team_a.merge_graph(team_b.graph()).unwrap();
        prop_assert_eq!(team_a.state(), &after_first);
    }
}

#[test]
fn three_way_merge_is_associative() {
    let alice = TestUser::named("alice");
    let bob = TestUser::named("bob");
    let carol = TestUser::named("carol");

    let mut alice_team = founder_team("T", &alice);
    alice_team
        .invite_member(Some("bob-seed".to_string()), 0, 1)
        .unwrap();
    alice_team
        .invite_member(Some("carol-seed".to_string()), 0, 1)
        .unwrap();
    let mut bob_team = join_as_member(&mut alice_team, &bob, "bob-seed").unwrap();
    let mut carol_team = join_as_member(&mut alice_team, &carol, "carol-seed").unwrap();
    bob_team.merge(&alice_team.save()).unwrap();
    carol_team.merge(&alice_team.save()).unwrap();

    // Divergent edits on all three branches.
    alice_team.set_team_name("alice's name").unwrap();
    bob_team
        .post_message(ciborium::value::Value::Text("from bob".into()))
        .unwrap();
    carol_team
        .post_message(ciborium::value::Value::Text("from carol".into()))
        .unwrap();

    let a = alice_team.graph().clone();
    let b = bob_team.graph().clone();
    let c = carol_team.graph().clone();

    // (a ∪ b) ∪ c == a ∪ (b ∪ c)
    let ab_c = a.merge(&b).unwrap().merge(&c).unwrap();
    let bc = b.merge(&c).unwrap();
    let a_bc = a.merge(&bc).unwrap();
    assert_eq!(ab_c, a_bc);

    let state_1 = roster_team::reduce(&ab_c).unwrap().state;
    let state_2 = roster_team::reduce(&a_bc).unwrap().state;
    assert_eq!(state_1, state_2);
}
