//! The reduced ordered BDD manager with complement edges.
//!
//! Nodes are hash-consed through bucket chains over a growable arena, so
//! structurally equal functions share one node. Canonicity: the high edge
//! is never complemented (negation is folded into the reference), and
//! `low == high` collapses to the child. Variable order is the ascending
//! basic-event index; smaller variables sit closer to the root.

use hashbrown::HashMap;
use log::debug;

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::formula::GateKind;
use crate::graph::{GateState, Graph};
use crate::node::{Node, Ref};
use crate::utils::pairing3;

pub struct Bdd {
    /// Node arena; slot 0 is a sentry, slot 1 the terminal.
    nodes: Vec<Node>,
    buckets: Vec<usize>,
    bitmask: u64,
    ite_cache: Cache<(Ref, Ref, Ref), Ref>,
    one: Ref,
    zero: Ref,
    current_mark: bool,
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new()
    }
}

impl Bdd {
    pub fn new() -> Self {
        let one = Ref::positive(1);
        let terminal = Node::new(0, one, one);
        let buckets_bits = 12;
        Self {
            nodes: vec![terminal, terminal],
            buckets: vec![0; 1 << buckets_bits],
            bitmask: (1u64 << buckets_bits) - 1,
            ite_cache: Cache::new(16),
            one,
            zero: -one,
            current_mark: false,
        }
    }

    pub fn one(&self) -> Ref {
        self.one
    }
    pub fn zero(&self) -> Ref {
        self.zero
    }

    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.index() == 1
    }

    /// Number of allocated nodes, terminal included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn variable(&self, index: usize) -> u32 {
        self.nodes[index].variable
    }
    pub fn low(&self, index: usize) -> Ref {
        self.nodes[index].low
    }
    pub fn high(&self, index: usize) -> Ref {
        self.nodes[index].high
    }

    pub(crate) fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }
    pub(crate) fn node_mut(&mut self, index: usize) -> &mut Node {
        &mut self.nodes[index]
    }
    pub(crate) fn flip_mark(&mut self) -> bool {
        self.current_mark = !self.current_mark;
        self.current_mark
    }

    pub fn mk_node(&mut self, variable: u32, low: Ref, high: Ref) -> Ref {
        debug_assert_ne!(variable, 0, "Variable index must not be zero");

        // Canonicity: fold the high edge's complement into the reference.
        if high.is_negated() {
            return -self.mk_node(variable, -low, -high);
        }
        // Redundant test drops out.
        if low == high {
            return low;
        }

        if self.nodes.len() * 2 > self.buckets.len() {
            self.grow();
        }
        let bucket = (pairing3(variable as u64, low.unsigned(), high.unsigned()) & self.bitmask) as usize;
        let mut index = self.buckets[bucket];
        while index != 0 {
            let node = &self.nodes[index];
            if node.variable == variable && node.low == low && node.high == high {
                return Ref::positive(index);
            }
            index = node.next;
        }
        let index = self.nodes.len();
        let mut node = Node::new(variable, low, high);
        node.next = self.buckets[bucket];
        self.nodes.push(node);
        self.buckets[bucket] = index;
        Ref::positive(index)
    }

    /// Doubles the bucket table and re-chains every node.
    fn grow(&mut self) {
        let new_size = self.buckets.len() * 2;
        debug!("growing BDD bucket table to {}", new_size);
        self.buckets = vec![0; new_size];
        self.bitmask = (new_size - 1) as u64;
        for index in 2..self.nodes.len() {
            let node = self.nodes[index];
            let bucket = (pairing3(node.variable as u64, node.low.unsigned(), node.high.unsigned())
                & self.bitmask) as usize;
            self.nodes[index].next = self.buckets[bucket];
            self.buckets[bucket] = index;
        }
    }

    pub fn mk_var(&mut self, variable: u32) -> Ref {
        let (zero, one) = (self.zero, self.one);
        self.mk_node(variable, zero, one)
    }

    /// Cofactors of `node` on `v`, which must not be below the node's top
    /// variable.
    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        debug_assert_ne!(v, 0);
        let index = node.index();
        if self.is_terminal(node) || v < self.variable(index) {
            return (node, node);
        }
        debug_assert_eq!(v, self.variable(index));
        if node.is_negated() {
            (-self.low(index), -self.high(index))
        } else {
            (self.low(index), self.high(index))
        }
    }

    /// The ITE operation:
    ///
    /// ```text
    /// ite(f, g, h) = (f ∧ g) ∨ (¬f ∧ h)
    /// ```
    pub fn apply_ite(&mut self, f: Ref, g: Ref, h: Ref) -> Ref {
        // Terminal cases.
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }
        // Repeated arguments reduce to constants.
        let (one, zero) = (self.one, self.zero);
        if f == g {
            return self.apply_ite(f, one, h);
        }
        if f == -g {
            return self.apply_ite(f, zero, h);
        }
        if f == h {
            return self.apply_ite(f, g, zero);
        }
        if f == -h {
            return self.apply_ite(f, g, one);
        }

        // Canonical form: a regular first argument, then a regular second.
        let (mut f, mut g, mut h) = (f, g, h);
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }
        let negate = g.is_negated();
        if negate {
            g = -g;
            h = -h;
        }

        if let Some(&cached) = self.ite_cache.get(&(f, g, h)) {
            return if negate { -cached } else { cached };
        }

        // Split on the topmost variable among the arguments.
        let i = self.variable(f.index());
        let j = self.variable(g.index());
        let k = self.variable(h.index());
        debug_assert_ne!(i, 0);
        let mut m = i;
        if j != 0 {
            m = m.min(j);
        }
        if k != 0 {
            m = m.min(k);
        }

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let low = self.apply_ite(f0, g0, h0);
        let high = self.apply_ite(f1, g1, h1);
        let result = self.mk_node(m, low, high);

        self.ite_cache.insert((f, g, h), result);
        if negate {
            -result
        } else {
            result
        }
    }

    pub fn apply_and(&mut self, f: Ref, g: Ref) -> Ref {
        let zero = self.zero;
        self.apply_ite(f, g, zero)
    }

    pub fn apply_or(&mut self, f: Ref, g: Ref) -> Ref {
        let one = self.one;
        self.apply_ite(f, one, g)
    }

    /// Builds the function of the normalized graph bottom-up, memoized per
    /// gate. Fails with a limit error when the node count passes
    /// `node_limit`.
    pub fn from_graph(&mut self, graph: &Graph, node_limit: usize) -> Result<Ref> {
        let mut memo = HashMap::new();
        self.convert_gate(graph, graph.top_index(), node_limit, &mut memo)
    }

    fn convert_gate(
        &mut self,
        graph: &Graph,
        index: i32,
        node_limit: usize,
        memo: &mut HashMap<i32, Ref>,
    ) -> Result<Ref> {
        if let Some(&cached) = memo.get(&index) {
            return Ok(cached);
        }
        let gate = graph.gate(index);
        let result = match gate.state() {
            GateState::Null => self.zero,
            GateState::Unity => self.one,
            GateState::Normal => {
                let kind = gate.kind();
                if !kind.is_reduced() {
                    return Err(Error::Logic(format!("BDD conversion reached an unreduced {kind} gate")));
                }
                let mut acc = match kind {
                    GateKind::And => self.one,
                    _ => self.zero,
                };
                for &lit in gate.children() {
                    let child = if graph.is_gate_index(lit.index()) {
                        self.convert_gate(graph, lit.index(), node_limit, memo)?
                    } else {
                        self.mk_var(lit.index() as u32)
                    };
                    let child = if lit.is_negated() { -child } else { child };
                    acc = match kind {
                        GateKind::And => self.apply_and(acc, child),
                        _ => self.apply_or(acc, child),
                    };
                    if self.node_count() > node_limit {
                        return Err(Error::BddNodeLimit { limit: node_limit });
                    }
                }
                acc
            }
        };
        memo.insert(index, result);
        Ok(result)
    }
}
