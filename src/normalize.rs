//! Normalization: reduce the eight input gate kinds to positive AND/OR.
//!
//! Rules, in order: extract the top-event sign from negative or unary top
//! gates; lift NOR/NAND gates by flipping their occurrences in parent child
//! sets; expand XOR and ATLEAST into AND/OR compounds; finally push the
//! accumulated sign back into the top gate. NOT and NULL gates survive as
//! sign carriers until the complement pass splices them out.

use hashbrown::HashMap;
use log::debug;

use crate::formula::GateKind;
use crate::graph::{Gate, Graph};
use crate::literal::Literal;

pub fn normalize(graph: &mut Graph) {
    extract_top_sign(graph);
    lift_negative_gates(graph);
    for index in graph.gate_indices() {
        normalize_gate(graph, index);
    }
    apply_top_sign(graph);
}

/// Rule 1: a NOR/NAND top flips to OR/AND and records a negative sign; a
/// NOT/NULL top is followed into its single child, multiplying signs, until
/// the top is a proper connective. A chain ending in a primary event leaves
/// a single-literal OR behind.
fn extract_top_sign(graph: &mut Graph) {
    loop {
        let top_index = graph.top_index();
        let kind = graph.gate(top_index).kind();
        match kind {
            GateKind::Nor => {
                graph.flip_top_sign();
                graph.gate_mut(top_index).set_kind(GateKind::Or);
                return;
            }
            GateKind::Nand => {
                graph.flip_top_sign();
                graph.gate_mut(top_index).set_kind(GateKind::And);
                return;
            }
            GateKind::Not | GateKind::Null => {
                let child = *graph
                    .gate(top_index)
                    .children()
                    .iter()
                    .next()
                    .expect("unary gate without a child");
                if kind == GateKind::Not {
                    graph.flip_top_sign();
                }
                if child.is_negated() {
                    graph.flip_top_sign();
                }
                if graph.is_gate_index(child.index()) {
                    debug!("top {} gate replaced by gate {}", kind, child.index());
                    graph.set_top_index(child.index());
                    // The old top stays in the arena, detached.
                } else {
                    let gate = graph.gate_mut(top_index);
                    gate.set_kind(GateKind::Or);
                    gate.clear_children();
                    gate.add_child(Literal::positive(child.index()));
                    return;
                }
            }
            _ => return,
        }
    }
}

/// Rule 2: for every non-top NOR/NAND gate, negate its occurrence in each
/// parent's child set. The gate itself is reclassified in the per-gate
/// sweep. Parents are computed on demand from the child sets.
fn lift_negative_gates(graph: &mut Graph) {
    let mut parents: HashMap<i32, Vec<i32>> = HashMap::new();
    for index in graph.gate_indices() {
        for &lit in graph.gate(index).children() {
            if graph.is_gate_index(lit.index()) {
                parents.entry(lit.index()).or_default().push(index);
            }
        }
    }
    for index in graph.gate_indices() {
        if index == graph.top_index() {
            continue;
        }
        let kind = graph.gate(index).kind();
        if kind != GateKind::Nor && kind != GateKind::Nand {
            continue;
        }
        debug!("lifting negative gate {}", index);
        if let Some(list) = parents.get(&index) {
            for &parent in list {
                graph.gate_mut(parent).invert_child(Literal::positive(index));
            }
        }
    }
}

fn normalize_gate(graph: &mut Graph, index: i32) {
    match graph.gate(index).kind() {
        GateKind::And | GateKind::Or => {}
        GateKind::Nor => graph.gate_mut(index).set_kind(GateKind::Or),
        GateKind::Nand => graph.gate_mut(index).set_kind(GateKind::And),
        GateKind::Xor => expand_xor(graph, index),
        GateKind::AtLeast => expand_atleast(graph, index),
        GateKind::Not | GateKind::Null => {}
    }
}

/// `a XOR b` becomes `(a AND ~b) OR (~a AND b)`.
fn expand_xor(graph: &mut Graph, index: i32) {
    let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
    debug_assert_eq!(children.len(), 2, "XOR must be binary");
    let (a, b) = (children[0], children[1]);

    let left_index = graph.alloc_index();
    let mut left = Gate::new(left_index, GateKind::And);
    left.add_child(a);
    left.add_child(-b);
    graph.insert_gate(left);

    let right_index = graph.alloc_index();
    let mut right = Gate::new(right_index, GateKind::And);
    right.add_child(-a);
    right.add_child(b);
    graph.insert_gate(right);

    let gate = graph.gate_mut(index);
    gate.set_kind(GateKind::Or);
    gate.clear_children();
    gate.add_child(Literal::positive(left_index));
    gate.add_child(Literal::positive(right_index));
    debug!("expanded XOR gate {} into {} and {}", index, left_index, right_index);
}

/// `ATLEAST_k(x1..xn)` becomes an OR over all `C(n,k)` size-k AND
/// combinations, enumerated lexicographically over the child ordering.
fn expand_atleast(graph: &mut Graph, index: i32) {
    let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
    let vote = graph.gate(index).vote_number().expect("ATLEAST gate without a vote number");
    debug_assert!(vote >= 2 && vote < children.len());

    let mut and_gates = Vec::new();
    for combo in combinations(&children, vote) {
        let and_index = graph.alloc_index();
        let mut and = Gate::new(and_index, GateKind::And);
        for lit in combo {
            and.add_child(lit);
        }
        graph.insert_gate(and);
        and_gates.push(and_index);
    }
    debug!("expanded ATLEAST gate {} into {} AND gates", index, and_gates.len());

    let gate = graph.gate_mut(index);
    gate.set_kind(GateKind::Or);
    gate.clear_children();
    for and_index in and_gates {
        gate.add_child(Literal::positive(and_index));
    }
}

/// Size-k combinations of `items` in lexicographic index order.
fn combinations(items: &[Literal], k: usize) -> Vec<Vec<Literal>> {
    let n = items.len();
    debug_assert!(k >= 1 && k <= n);
    let mut result = Vec::new();
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        result.push(indices.iter().map(|&i| items[i]).collect());
        let mut at = k as isize - 1;
        while at >= 0 && indices[at as usize] == at as usize + n - k {
            at -= 1;
        }
        if at < 0 {
            return result;
        }
        let at = at as usize;
        indices[at] += 1;
        for j in at + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

/// The residual sign becomes a De Morgan flip of the top gate.
fn apply_top_sign(graph: &mut Graph) {
    if graph.top_sign() >= 0 {
        return;
    }
    let top_index = graph.top_index();
    let kind = graph.gate(top_index).kind();
    debug_assert!(kind.is_reduced(), "top gate still unreduced at sign application");
    let gate = graph.gate_mut(top_index);
    gate.set_kind(kind.dual());
    gate.invert_children();
    graph.set_top_sign(1);
    debug!("top sign pushed into gate {}", top_index);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use test_log::test;

    use super::*;
    use crate::formula::Formula;
    use crate::graph::testing::evaluate;
    use crate::model::Model;

    fn assignments(num_events: usize) -> Vec<BTreeSet<i32>> {
        (0..1u32 << num_events)
            .map(|bits| {
                (0..num_events)
                    .filter(|&i| bits & (1 << i) != 0)
                    .map(|i| i as i32 + 1)
                    .collect()
            })
            .collect()
    }

    fn check_preserved(model: &Model, num_events: usize) {
        let reference = Graph::build(model, false).unwrap();
        let mut graph = Graph::build(model, false).unwrap();
        normalize(&mut graph);
        assert_eq!(graph.top_sign(), 1);
        for truth in assignments(num_events) {
            assert_eq!(
                evaluate(&graph, &truth),
                evaluate(&reference, &truth),
                "diverged on {:?}",
                truth
            );
        }
    }

    #[test]
    fn test_xor_expansion_shape() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.2)
            .top_gate("top", Formula::xor("a", "b"))
            .finish()
            .unwrap();
        let mut graph = Graph::build(&model, false).unwrap();
        normalize(&mut graph);

        let top = graph.top();
        assert_eq!(top.kind(), GateKind::Or);
        assert_eq!(top.children().len(), 2);
        for &lit in top.children() {
            assert!(!lit.is_negated());
            let and = graph.gate(lit.index());
            assert_eq!(and.kind(), GateKind::And);
            assert_eq!(and.children().len(), 2);
        }
        check_preserved(&model, 2);
    }

    #[test]
    fn test_atleast_expansion_shape() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.1)
            .basic_event("c", 0.1)
            .top_gate("top", Formula::atleast(2, ["a", "b", "c"]))
            .finish()
            .unwrap();
        let mut graph = Graph::build(&model, false).unwrap();
        normalize(&mut graph);

        let top = graph.top();
        assert_eq!(top.kind(), GateKind::Or);
        assert_eq!(top.children().len(), 3); // C(3, 2)
        for &lit in top.children() {
            let and = graph.gate(lit.index());
            assert_eq!(and.kind(), GateKind::And);
            assert_eq!(and.children().len(), 2);
        }
        check_preserved(&model, 3);
    }

    #[test]
    fn test_nor_top_sign() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.2)
            .top_gate("top", Formula::nor(["a", "b"]))
            .finish()
            .unwrap();
        let mut graph = Graph::build(&model, false).unwrap();
        normalize(&mut graph);
        // NOR became OR with a recorded sign, then the sign flipped it to
        // AND over complemented literals.
        let top = graph.top();
        assert_eq!(graph.top_sign(), 1);
        assert_eq!(top.kind(), GateKind::And);
        assert!(top.has_child(Literal::negative(1)));
        assert!(top.has_child(Literal::negative(2)));
        check_preserved(&model, 2);
    }

    #[test]
    fn test_nand_lifting() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.2)
            .basic_event("c", 0.3)
            .gate("blocked", Formula::nand(["a", "b"]))
            .top_gate("top", Formula::and(["c", "blocked"]))
            .finish()
            .unwrap();
        let mut graph = Graph::build(&model, false).unwrap();
        normalize(&mut graph);

        let blocked = model.index_of("blocked").unwrap();
        assert_eq!(graph.gate(blocked).kind(), GateKind::And);
        assert!(graph.top().has_child(Literal::negative(blocked)));
        check_preserved(&model, 3);
    }

    #[test]
    fn test_top_not_chain() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.2)
            .gate("inner", Formula::or(["a", "b"]))
            .top_gate("top", Formula::new(GateKind::Not).with_formula(Formula::not("inner")))
            .finish()
            .unwrap();
        let mut graph = Graph::build(&model, false).unwrap();
        normalize(&mut graph);
        // NOT(NOT(inner)) collapses onto `inner` with a positive sign.
        assert_eq!(graph.top_sign(), 1);
        check_preserved(&model, 2);
    }

    #[test]
    fn test_top_not_of_event() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .top_gate("top", Formula::not("a"))
            .finish()
            .unwrap();
        let mut graph = Graph::build(&model, false).unwrap();
        normalize(&mut graph);
        let top = graph.top();
        assert_eq!(graph.top_sign(), 1);
        assert!(top.kind().is_reduced());
        assert!(top.has_child(Literal::negative(1)));
        check_preserved(&model, 1);
    }

    #[test]
    fn test_combinations_lexicographic() {
        let items: Vec<Literal> = [1, 2, 3, 4].into_iter().map(Literal::positive).collect();
        let combos = combinations(&items, 2);
        let raw: Vec<Vec<i32>> = combos
            .iter()
            .map(|combo| combo.iter().map(|lit| lit.get()).collect())
            .collect();
        assert_eq!(raw, vec![
            vec![1, 2],
            vec![1, 3],
            vec![1, 4],
            vec![2, 3],
            vec![2, 4],
            vec![3, 4],
        ]);
    }

    #[test]
    fn test_idempotent() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.1)
            .basic_event("c", 0.1)
            .gate("vote", Formula::atleast(2, ["a", "b", "c"]))
            .top_gate("top", Formula::nand(["a", "vote"]))
            .finish()
            .unwrap();
        let mut graph = Graph::build(&model, false).unwrap();
        normalize(&mut graph);
        let before: Vec<(i32, Vec<i32>)> = graph
            .gate_indices()
            .into_iter()
            .map(|i| (i, graph.gate(i).children().iter().map(|l| l.get()).collect()))
            .collect();
        normalize(&mut graph);
        let after: Vec<(i32, Vec<i32>)> = graph
            .gate_indices()
            .into_iter()
            .map(|i| (i, graph.gate(i).children().iter().map(|l| l.get()).collect()))
            .collect();
        assert_eq!(before, after);
    }
}
