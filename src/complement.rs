//! Complement propagation: push negations off gates onto event literals.
//!
//! NOT/NULL gates are spliced into their parents as plain signs. A negated
//! reference to an AND/OR gate is replaced by a reference to its De Morgan
//! dual clone; the clone is memoized per original gate so every occurrence
//! of `-g` across the whole pass shares one clone.

use hashbrown::{HashMap, HashSet};
use log::debug;

use crate::formula::GateKind;
use crate::graph::{ChildStatus, Gate, Graph};
use crate::literal::Literal;

pub fn propagate_complements(graph: &mut Graph) {
    let mut complements: HashMap<i32, i32> = HashMap::new();
    let mut processed: HashSet<i32> = HashSet::new();
    processed.insert(graph.top_index());
    propagate_gate(graph, graph.top_index(), &mut complements, &mut processed);
}

fn propagate_gate(
    graph: &mut Graph,
    index: i32,
    complements: &mut HashMap<i32, i32>,
    processed: &mut HashSet<i32>,
) {
    // Swaps are collected per scan and applied in a batch; splicing a
    // NOT/NULL child can surface another negated gate, so rescan until the
    // child set is stable.
    loop {
        let mut swaps: Vec<(Literal, Literal)> = Vec::new();
        let mut descend: Vec<i32> = Vec::new();
        let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
        for lit in children {
            if !graph.is_gate_index(lit.index()) {
                continue;
            }
            let child_index = lit.index();
            let child_kind = graph.gate(child_index).kind();
            if child_kind == GateKind::Not || child_kind == GateKind::Null {
                let inner = *graph
                    .gate(child_index)
                    .children()
                    .iter()
                    .next()
                    .expect("unary gate without a child");
                let mut spliced = inner;
                if child_kind == GateKind::Not {
                    spliced = -spliced;
                }
                if lit.is_negated() {
                    spliced = -spliced;
                }
                swaps.push((lit, spliced));
            } else if lit.is_negated() {
                let clone_index = match complements.get(&child_index) {
                    Some(&clone_index) => clone_index,
                    None => {
                        let clone_index = clone_complement(graph, child_index);
                        complements.insert(child_index, clone_index);
                        descend.push(clone_index);
                        clone_index
                    }
                };
                swaps.push((lit, Literal::positive(clone_index)));
            } else {
                descend.push(child_index);
            }
        }

        if swaps.is_empty() {
            for child_index in descend {
                if processed.insert(child_index) {
                    propagate_gate(graph, child_index, complements, processed);
                }
            }
            return;
        }
        for (old, new) in swaps {
            let gate = graph.gate_mut(index);
            gate.erase_child(old);
            if gate.add_child(new) == ChildStatus::Opposite {
                return; // The gate collapsed to a constant.
            }
        }
    }
}

/// Builds the De Morgan dual of `index`: the dual kind over negated
/// children.
fn clone_complement(graph: &mut Graph, index: i32) -> i32 {
    let kind = graph.gate(index).kind();
    debug_assert!(kind.is_reduced(), "complementing an unreduced gate");
    let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
    let clone_index = graph.alloc_index();
    let mut clone = Gate::new(clone_index, kind.dual());
    for lit in children {
        clone.add_child(-lit);
    }
    graph.insert_gate(clone);
    debug!("complement clone {} for gate {}", clone_index, index);
    clone_index
}
