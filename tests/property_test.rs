//! Property-based checks of counting, id uniqueness and the undo/redo laws

use dualgraph::{AttributeId, AttributeSpec, ElementType, Graph, ReadHandle, ValueKind, VertexId};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
enum Op {
    AddVertex,
    /// Remove the live vertex at this position, modulo the count
    RemoveVertex(usize),
    /// Connect two live vertices chosen by position
    Connect(usize, usize, bool),
    /// Set the score of a live vertex
    SetScore(usize, i64),
    /// Point a live transaction at another live vertex
    Redirect(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::AddVertex),
        1 => any::<usize>().prop_map(Op::RemoveVertex),
        2 => (any::<usize>(), any::<usize>(), any::<bool>()).prop_map(|(a, b, d)| Op::Connect(a, b, d)),
        2 => (any::<usize>(), -1000i64..1000).prop_map(|(v, s)| Op::SetScore(v, s)),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(t, v)| Op::Redirect(t, v)),
    ]
}

#[derive(Debug, PartialEq)]
struct State {
    vertices: Vec<(VertexId, i64)>,
    transactions: Vec<(u32, VertexId, VertexId, bool)>,
    edges: usize,
    links: usize,
}

fn capture(rg: &ReadHandle, score: AttributeId) -> State {
    let mut vertices: Vec<_> = rg
        .vertices()
        .map(|v| (v, rg.get_long_value(score, v.as_u32()).unwrap()))
        .collect();
    vertices.sort();
    let mut transactions: Vec<_> = rg
        .transactions()
        .map(|t| {
            (
                t.as_u32(),
                rg.transaction_source(t).unwrap(),
                rg.transaction_destination(t).unwrap(),
                rg.transaction_directed(t).unwrap(),
            )
        })
        .collect();
    transactions.sort();
    State {
        vertices,
        transactions,
        edges: rg.edge_count(),
        links: rg.link_count(),
    }
}

fn setup() -> (Graph, AttributeId) {
    let graph = Graph::new();
    let mut wg = graph.write("Schema").unwrap();
    let score = wg
        .add_attribute(AttributeSpec::new(ElementType::Vertex, "score", ValueKind::Long))
        .unwrap();
    wg.commit("Schema").unwrap();
    (graph, score)
}

fn apply(graph: &Graph, score: AttributeId, ops: &[Op]) -> i64 {
    let mut wg = graph.write("Operations").unwrap();
    let mut expected = wg.vertex_count() as i64;
    for op in ops {
        let live: Vec<VertexId> = wg.vertices().collect();
        match *op {
            Op::AddVertex => {
                wg.add_vertex().unwrap();
                expected += 1;
            }
            Op::RemoveVertex(i) if !live.is_empty() => {
                wg.remove_vertex(live[i % live.len()]).unwrap();
                expected -= 1;
            }
            Op::Connect(a, b, directed) if !live.is_empty() => {
                wg.add_transaction(live[a % live.len()], live[b % live.len()], directed)
                    .unwrap();
            }
            Op::SetScore(i, value) if !live.is_empty() => {
                wg.set_long_value(score, live[i % live.len()].as_u32(), value).unwrap();
            }
            Op::Redirect(t, v) if !live.is_empty() => {
                let transactions: Vec<_> = wg.transactions().collect();
                if !transactions.is_empty() {
                    let transaction = transactions[t % transactions.len()];
                    wg.set_transaction_destination(transaction, live[v % live.len()]).unwrap();
                }
            }
            _ => {}
        }
    }
    wg.commit("Operations").unwrap();
    expected
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_vertex_count_matches_adds_minus_removes(ops in prop::collection::vec(op(), 0..60)) {
        let (graph, score) = setup();
        let expected = apply(&graph, score, &ops);
        let rg = graph.read().unwrap();
        prop_assert_eq!(rg.vertex_count() as i64, expected);
        let ids: BTreeSet<VertexId> = rg.vertices().collect();
        prop_assert_eq!(ids.len(), rg.vertex_count());
    }

    #[test]
    fn prop_undo_restores_and_redo_reapplies(
        before in prop::collection::vec(op(), 0..30),
        ops in prop::collection::vec(op(), 1..40),
    ) {
        let (graph, score) = setup();
        apply(&graph, score, &before);
        let original = capture(&graph.read().unwrap(), score);

        apply(&graph, score, &ops);
        let changed = capture(&graph.read().unwrap(), score);

        if graph.undo_name().as_deref() == Some("Operations") && original != changed {
            graph.undo().unwrap();
            prop_assert_eq!(&capture(&graph.read().unwrap(), score), &original);
            graph.redo().unwrap();
            prop_assert_eq!(&capture(&graph.read().unwrap(), score), &changed);
        }
    }
}
