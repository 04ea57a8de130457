//! Minimal cut set extraction from the alternating AND/OR graph.
//!
//! Top-down expansion into a sum of products: OR unions its children's
//! products, AND crosses them. Expansion memoizes per gate index, so shared
//! subgraphs and detected modules are solved once. Products above
//! `limit_order` are dropped and flagged; subsumption minimization removes
//! supersets at the end.

use std::collections::BTreeSet;

use hashbrown::HashMap;
use log::debug;

use crate::error::{Error, Result};
use crate::formula::GateKind;
use crate::graph::{GateState, Graph};
use crate::literal::Literal;

/// A sum of products over signed basic-event literals.
#[derive(Debug, Clone)]
pub struct CutSets {
    pub products: Vec<BTreeSet<Literal>>,
    /// Whether `limit_order` dropped any product.
    pub truncated: bool,
}

pub fn minimal_cut_sets(graph: &Graph, limit_order: usize, product_limit: usize) -> Result<CutSets> {
    let top = graph.top_index();
    match graph.gate(top).state() {
        GateState::Null => {
            return Ok(CutSets {
                products: Vec::new(),
                truncated: false,
            })
        }
        GateState::Unity => {
            return Ok(CutSets {
                products: vec![BTreeSet::new()],
                truncated: false,
            })
        }
        GateState::Normal => {}
    }

    let mut memo: HashMap<i32, Vec<BTreeSet<Literal>>> = HashMap::new();
    let mut truncated = false;
    let products = expand_gate(graph, top, limit_order, product_limit, &mut memo, &mut truncated)?;
    let products = minimize(products);
    debug!("extracted {} minimal cut sets", products.len());
    Ok(CutSets { products, truncated })
}

fn expand_gate(
    graph: &Graph,
    index: i32,
    limit_order: usize,
    product_limit: usize,
    memo: &mut HashMap<i32, Vec<BTreeSet<Literal>>>,
    truncated: &mut bool,
) -> Result<Vec<BTreeSet<Literal>>> {
    if let Some(cached) = memo.get(&index) {
        return Ok(cached.clone());
    }
    let gate = graph.gate(index);
    let mut products: Vec<BTreeSet<Literal>> = match gate.state() {
        GateState::Null => Vec::new(),
        GateState::Unity => vec![BTreeSet::new()],
        GateState::Normal => match gate.kind() {
            GateKind::Or => {
                let mut acc = Vec::new();
                for &lit in gate.children() {
                    if graph.is_gate_index(lit.index()) {
                        acc.extend(expand_gate(graph, lit.index(), limit_order, product_limit, memo, truncated)?);
                    } else if limit_order >= 1 {
                        acc.push(BTreeSet::from([lit]));
                    } else {
                        *truncated = true;
                    }
                    if acc.len() > product_limit {
                        return Err(Error::ProductLimit { limit: product_limit });
                    }
                }
                acc
            }
            GateKind::And => {
                let mut acc = vec![BTreeSet::new()];
                for &lit in gate.children() {
                    let child_products = if graph.is_gate_index(lit.index()) {
                        expand_gate(graph, lit.index(), limit_order, product_limit, memo, truncated)?
                    } else {
                        vec![BTreeSet::from([lit])]
                    };
                    let mut next = Vec::with_capacity(acc.len());
                    for left in &acc {
                        for right in &child_products {
                            match union_product(left, right) {
                                // An opposite pair makes the product false.
                                None => {}
                                Some(product) if product.len() > limit_order => *truncated = true,
                                Some(product) => next.push(product),
                            }
                        }
                        if next.len() > product_limit {
                            return Err(Error::ProductLimit { limit: product_limit });
                        }
                    }
                    acc = next;
                }
                acc
            }
            kind => {
                return Err(Error::Logic(format!(
                    "cut-set expansion reached an unreduced {kind} gate"
                )))
            }
        },
    };
    products.sort();
    products.dedup();
    memo.insert(index, products.clone());
    Ok(products)
}

/// Set union, unless the operands hold opposite literals.
fn union_product(left: &BTreeSet<Literal>, right: &BTreeSet<Literal>) -> Option<BTreeSet<Literal>> {
    for &lit in right {
        if left.contains(&-lit) {
            return None;
        }
    }
    Some(left.union(right).copied().collect())
}

/// Drops every product that is a superset of another (subsumption).
fn minimize(mut products: Vec<BTreeSet<Literal>>) -> Vec<BTreeSet<Literal>> {
    products.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    products.dedup();
    let mut minimal: Vec<BTreeSet<Literal>> = Vec::new();
    for product in products {
        if !minimal.iter().any(|kept| kept.is_subset(&product)) {
            minimal.push(product);
        }
    }
    minimal
}
