//! Module detection by DFS timing.
//!
//! One traversal stamps every gate with enter/exit times and every basic
//! event with its first/last visit. A gate is a module iff the visit
//! window of everything below it sits inside its own enter/exit window —
//! then its basic events appear nowhere else in the tree. Non-shared
//! children of non-module gates are grouped into fresh module gates.

use hashbrown::HashMap;
use log::debug;

use crate::graph::{ChildStatus, Gate, Graph};
use crate::literal::Literal;

pub fn detect_modules(graph: &mut Graph) {
    debug!("detecting modules");
    graph.clear_visit_times();
    let mut visit_basics = vec![(0u32, 0u32); graph.first_gate_index() as usize];
    let mut time = 0;
    assign_timing(graph, graph.top_index(), &mut time, &mut visit_basics);

    let mut visited: HashMap<i32, (u32, u32)> = HashMap::new();
    find_modules(graph, graph.top_index(), &visit_basics, &mut visited);
    debug!("detected {} modules", graph.modules().len());
}

fn assign_timing(graph: &mut Graph, index: i32, time: &mut u32, visit_basics: &mut [(u32, u32)]) {
    *time += 1;
    if graph.gate_mut(index).visit(*time) {
        return; // Revisit through a shared parent.
    }
    let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
    for lit in children {
        let child_index = lit.index();
        if graph.is_gate_index(child_index) {
            assign_timing(graph, child_index, time, visit_basics);
        } else {
            *time += 1;
            let slot = &mut visit_basics[child_index as usize];
            if slot.0 == 0 {
                *slot = (*time, *time);
            } else {
                slot.1 = *time;
            }
        }
    }
    *time += 1;
    let revisited = graph.gate_mut(index).visit(*time);
    debug_assert!(!revisited, "cyclic visit during timing");
}

fn find_modules(
    graph: &mut Graph,
    index: i32,
    visit_basics: &[(u32, u32)],
    visited: &mut HashMap<i32, (u32, u32)>,
) {
    if visited.contains_key(&index) {
        return;
    }
    let enter_time = graph.gate(index).enter_time();
    let exit_time = graph.gate(index).exit_time();
    let mut min_time = enter_time;
    let mut max_time = exit_time;

    let mut non_shared_children = Vec::new();
    let mut modular_children = Vec::new();
    let mut non_modular_children = Vec::new();
    let children: Vec<Literal> = graph.gate(index).children().iter().copied().collect();
    for lit in children {
        let child_index = lit.index();
        let (low, high) = if graph.is_gate_index(child_index) {
            find_modules(graph, child_index, visit_basics, visited);
            let window = visited[&child_index];
            if graph.is_module(child_index) && !graph.gate(child_index).revisited() {
                non_shared_children.push(lit);
                continue;
            }
            window
        } else {
            let (first, last) = visit_basics[child_index as usize];
            if first == last {
                debug_assert!(first > enter_time && last < exit_time);
                non_shared_children.push(lit);
                continue;
            }
            (first, last)
        };
        debug_assert!(low != 0 && high != 0);
        if low > enter_time && high < exit_time {
            modular_children.push(lit);
        } else {
            non_modular_children.push(lit);
        }
        min_time = min_time.min(low);
        max_time = max_time.max(high);
    }

    if min_time == enter_time && max_time == exit_time {
        debug!("gate {} is a module", index);
        graph.mark_module(index);
    }
    if non_shared_children.len() > 1 {
        create_module(graph, index, &non_shared_children);
    }
    filter_modular_children(graph, visit_basics, visited, &mut modular_children, &mut non_modular_children);
    if !modular_children.is_empty() {
        debug_assert!(modular_children.len() != 1, "one modular child is non-shared");
        create_module(graph, index, &modular_children);
    }

    let max_time = max_time.max(graph.gate(index).last_visit());
    visited.insert(index, (min_time, max_time));
}

/// Groups `children` of `parent` into a fresh gate of the same kind marked
/// as a module; grouping everything just marks the parent itself.
fn create_module(graph: &mut Graph, parent: i32, children: &[Literal]) {
    debug_assert!(children.len() > 1);
    debug_assert!(children.len() <= graph.gate(parent).children().len());
    if children.len() == graph.gate(parent).children().len() {
        graph.mark_module(parent);
        return;
    }
    let kind = graph.gate(parent).kind();
    debug_assert!(kind.is_reduced());
    let module_index = graph.alloc_index();
    let mut module = Gate::new(module_index, kind);
    for &lit in children {
        let status = module.add_child(lit);
        debug_assert_eq!(status, ChildStatus::Added);
        graph.gate_mut(parent).erase_child(lit);
    }
    graph.insert_gate(module);
    graph.mark_module(module_index);
    debug_assert!(!graph.gate(parent).children().is_empty());
    graph.gate_mut(parent).add_child(Literal::positive(module_index));
    debug!("grouped {} children of gate {} into module {}", children.len(), parent, module_index);
}

/// Drops "modular" children whose visit window overlaps a non-modular
/// sibling: a shared basic event chains them to the outside world. The
/// filter reruns until the modular set is stable.
fn filter_modular_children(
    graph: &Graph,
    visit_basics: &[(u32, u32)],
    visited: &HashMap<i32, (u32, u32)>,
    modular_children: &mut Vec<Literal>,
    non_modular_children: &mut Vec<Literal>,
) {
    if modular_children.is_empty() || non_modular_children.is_empty() {
        return;
    }
    let window = |lit: Literal| -> (u32, u32) {
        let child_index = lit.index();
        if graph.is_gate_index(child_index) {
            visited[&child_index]
        } else {
            visit_basics[child_index as usize]
        }
    };
    let mut still_modular = Vec::new();
    let mut new_non_modular = Vec::new();
    for &lit in modular_children.iter() {
        let (low, high) = window(lit);
        let overlaps = non_modular_children.iter().any(|&other| {
            let (other_low, other_high) = window(other);
            low.max(other_low) <= high.min(other_high)
        });
        if overlaps {
            new_non_modular.push(lit);
        } else {
            still_modular.push(lit);
        }
    }
    filter_modular_children(graph, visit_basics, visited, &mut still_modular, &mut new_non_modular);
    *modular_children = still_modular;
    non_modular_children.extend(new_non_modular);
}
