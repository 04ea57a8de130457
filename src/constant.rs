//! Constant propagation: folding house events and constant sub-gates.
//!
//! A false child drops out of an OR and nullifies an AND; a true child
//! drops out of an AND and makes an OR unity. A complemented child flips
//! its value first. A gate stripped of every child becomes the neutral
//! constant of its kind: empty AND is unity, empty OR is null.

use hashbrown::HashSet;
use log::debug;
use std::collections::BTreeSet;

use crate::formula::GateKind;
use crate::graph::{GateState, Graph};
use crate::literal::Literal;

/// Folds the fixed house events through the graph.
pub fn propagate_constants(
    graph: &mut Graph,
    true_house_events: &BTreeSet<i32>,
    false_house_events: &BTreeSet<i32>,
) {
    if true_house_events.is_empty() && false_house_events.is_empty() {
        return;
    }
    debug!("propagating house-event constants");
    let mut processed = HashSet::new();
    propagate_gate(graph, graph.top_index(), true_house_events, false_house_events, &mut processed);
}

fn propagate_gate(
    graph: &mut Graph,
    index: i32,
    true_house_events: &BTreeSet<i32>,
    false_house_events: &BTreeSet<i32>,
    processed: &mut HashSet<i32>,
) {
    if !processed.insert(index) {
        return;
    }
    let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
    let mut to_erase = Vec::new();
    for lit in children {
        let value = if graph.is_gate_index(lit.index()) {
            propagate_gate(graph, lit.index(), true_house_events, false_house_events, processed);
            match graph.gate(lit.index()).state() {
                GateState::Normal => continue,
                GateState::Null => false,
                GateState::Unity => true,
            }
        } else if false_house_events.contains(&lit.index()) {
            false
        } else if true_house_events.contains(&lit.index()) {
            true
        } else {
            continue; // A basic event.
        };
        let value = if lit.is_negated() { !value } else { value };
        if process_constant_child(graph, index, lit, value, &mut to_erase) {
            return; // The gate itself collapsed to a constant.
        }
    }
    remove_children(graph, index, &to_erase);
}

/// Applies the folding table for one constant child. Returns true when the
/// parent gate became a constant; otherwise the child is queued for erasure.
pub(crate) fn process_constant_child(
    graph: &mut Graph,
    gate_index: i32,
    child: Literal,
    value: bool,
    to_erase: &mut Vec<Literal>,
) -> bool {
    let kind = graph.gate(gate_index).kind();
    match (kind, value) {
        (GateKind::Or, false) | (GateKind::And, true) => {
            to_erase.push(child);
            false
        }
        (GateKind::Or, true) => {
            graph.gate_mut(gate_index).make_unity();
            true
        }
        (GateKind::And, false) => {
            graph.gate_mut(gate_index).nullify();
            true
        }
        // Unary sign carriers become the constant outright.
        (GateKind::Null, true) | (GateKind::Not, false) => {
            graph.gate_mut(gate_index).make_unity();
            true
        }
        (GateKind::Null, false) | (GateKind::Not, true) => {
            graph.gate_mut(gate_index).nullify();
            true
        }
        (kind, _) => unreachable!("constant child under unnormalized {kind} gate"),
    }
}

/// Erases queued children; a gate left childless becomes the neutral
/// constant of its kind.
pub(crate) fn remove_children(graph: &mut Graph, gate_index: i32, to_erase: &[Literal]) {
    if to_erase.is_empty() {
        return;
    }
    for &lit in to_erase {
        graph.gate_mut(gate_index).erase_child(lit);
    }
    let gate = graph.gate_mut(gate_index);
    if gate.children().is_empty() {
        debug_assert!(gate.kind().is_reduced());
        match gate.kind() {
            GateKind::Or => gate.nullify(),
            _ => gate.make_unity(),
        }
        debug!("gate {} emptied into a constant", gate_index);
    }
}

/// Re-folds gates that collapsed to constants during later passes. Returns
/// true when anything changed. By this point the graph holds only positive
/// AND/OR gates.
pub(crate) fn process_const_gates(graph: &mut Graph, index: i32, processed: &mut HashSet<i32>) -> bool {
    if !processed.insert(index) {
        return false;
    }
    if graph.gate(index).is_constant() {
        return false;
    }
    debug_assert!(graph.gate(index).kind().is_reduced());

    let mut changed = false;
    let mut to_erase = Vec::new();
    let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
    for lit in children {
        if !graph.is_gate_index(lit.index()) {
            continue;
        }
        debug_assert!(!lit.is_negated());
        if process_const_gates(graph, lit.index(), processed) {
            changed = true;
        }
        let value = match graph.gate(lit.index()).state() {
            GateState::Normal => continue,
            GateState::Null => false,
            GateState::Unity => true,
        };
        if process_constant_child(graph, index, lit, value, &mut to_erase) {
            return true;
        }
    }
    if !to_erase.is_empty() {
        changed = true;
    }
    remove_children(graph, index, &to_erase);
    changed
}
