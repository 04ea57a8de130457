//! Coalescing: merge same-kind gate chains into a strictly alternating
//! AND/OR DAG.
//!
//! A child gate of the parent's kind is absorbed: its children move up and
//! the edge is dropped (the child record stays in the arena, possibly
//! dead). Single-child gates are lifted through. The pass alternates with
//! constant re-folding until neither changes anything.

use hashbrown::HashSet;
use log::debug;

use crate::constant::process_const_gates;
use crate::graph::{ChildStatus, Graph};
use crate::literal::Literal;

pub fn coalesce(graph: &mut Graph) {
    let top = graph.top_index();
    let mut processed = HashSet::new();
    process_const_gates(graph, top, &mut processed);
    loop {
        processed.clear();
        if !join_gates(graph, top, &mut processed) {
            break;
        }
        processed.clear();
        if !process_const_gates(graph, top, &mut processed) {
            break;
        }
    }
    debug!("coalescing reached a fixed point");
}

/// One joining sweep from `index` downward. Returns true when the graph
/// changed.
fn join_gates(graph: &mut Graph, index: i32, processed: &mut HashSet<i32>) -> bool {
    if !processed.insert(index) {
        return false;
    }
    let parent_kind = graph.gate(index).kind();
    debug_assert!(parent_kind.is_reduced());

    let mut changed = false;
    // Absorbing a child adds grandchildren that may themselves be joinable,
    // so sweep until this gate is stable before descending.
    loop {
        let mut swept = false;
        let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
        for lit in children {
            if !graph.is_gate_index(lit.index()) {
                continue;
            }
            debug_assert!(!lit.is_negated());
            if !graph.gate(index).has_child(lit) {
                continue; // Dropped by an earlier merge in this sweep.
            }
            let child_index = lit.index();
            let child_kind = graph.gate(child_index).kind();
            debug_assert!(child_kind.is_reduced());
            if child_kind == parent_kind {
                changed = true;
                swept = true;
                debug!("absorbing gate {} into {}", child_index, index);
                let grandchildren: Vec<Literal> =
                    graph.gate(child_index).children().iter().copied().collect();
                let gate = graph.gate_mut(index);
                gate.erase_child(lit);
                for grandchild in grandchildren {
                    if gate.add_child(grandchild) == ChildStatus::Opposite {
                        return true; // Collapsed to a constant.
                    }
                }
            } else if graph.gate(child_index).children().len() == 1 {
                // A leftover of constant folding; lift the grandchild through.
                changed = true;
                swept = true;
                let only = *graph.gate(child_index).children().iter().next().expect("single child");
                let gate = graph.gate_mut(index);
                gate.erase_child(lit);
                if gate.add_child(only) == ChildStatus::Opposite {
                    return true;
                }
            }
        }
        if !swept {
            break;
        }
    }

    let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
    for lit in children {
        if graph.is_gate_index(lit.index()) && join_gates(graph, lit.index(), processed) {
            changed = true;
        }
    }
    changed
}
