//! The indexed Boolean graph and its construction from user formulas.
//!
//! Every node is addressed by a dense positive integer; a [`Literal`] adds
//! the sign. Magnitudes partition into basic events, house events, and
//! gates, in that order, with indices above the last user-defined gate
//! reserved for gates synthesized during rewriting. Gates live in an arena
//! keyed by index; "deleting" a gate means detaching it from its parents,
//! the record itself stays for the lifetime of the analysis.

use std::collections::BTreeSet;

use hashbrown::HashMap;
use log::debug;

use crate::error::{Error, Result};
use crate::formula::{Formula, GateKind};
use crate::literal::Literal;
use crate::model::Model;

/// Constant state a gate can collapse into during rewriting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GateState {
    Normal,
    /// Constant false.
    Null,
    /// Constant true.
    Unity,
}

/// Outcome of adding a child literal to a gate.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChildStatus {
    Added,
    /// The exact literal is already a child.
    Duplicate,
    /// The opposite literal is a child; an AND gate collapses to constant
    /// false, an OR gate to constant true.
    Opposite,
}

/// One gate of the indexed graph.
#[derive(Debug, Clone)]
pub struct Gate {
    index: i32,
    kind: GateKind,
    vote_number: Option<usize>,
    children: BTreeSet<Literal>,
    state: GateState,
    /// Enter, exit, and last-revisit times of the module-detection DFS.
    visits: [u32; 3],
}

impl Gate {
    pub fn new(index: i32, kind: GateKind) -> Self {
        Self {
            index,
            kind,
            vote_number: None,
            children: BTreeSet::new(),
            state: GateState::Normal,
            visits: [0; 3],
        }
    }

    pub fn index(&self) -> i32 {
        self.index
    }
    pub fn kind(&self) -> GateKind {
        self.kind
    }
    pub fn set_kind(&mut self, kind: GateKind) {
        self.kind = kind;
    }
    pub fn vote_number(&self) -> Option<usize> {
        self.vote_number
    }
    pub fn set_vote_number(&mut self, vote: usize) {
        self.vote_number = Some(vote);
    }
    pub fn state(&self) -> GateState {
        self.state
    }
    pub fn is_constant(&self) -> bool {
        self.state != GateState::Normal
    }

    /// Children in ascending signed order.
    pub fn children(&self) -> &BTreeSet<Literal> {
        &self.children
    }
    pub fn has_child(&self, literal: Literal) -> bool {
        self.children.contains(&literal)
    }

    pub fn add_child(&mut self, literal: Literal) -> ChildStatus {
        if self.children.contains(&-literal) {
            match self.kind {
                GateKind::And => self.nullify(),
                GateKind::Or => self.make_unity(),
                _ => {}
            }
            return ChildStatus::Opposite;
        }
        if !self.children.insert(literal) {
            return ChildStatus::Duplicate;
        }
        ChildStatus::Added
    }

    pub fn erase_child(&mut self, literal: Literal) -> bool {
        self.children.remove(&literal)
    }

    /// Replace `old` with `-old`.
    pub fn invert_child(&mut self, old: Literal) {
        let removed = self.children.remove(&old);
        debug_assert!(removed, "Inverting a missing child");
        self.children.insert(-old);
    }

    /// Negate every child literal.
    pub fn invert_children(&mut self) {
        self.children = self.children.iter().map(|&lit| -lit).collect();
    }

    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    /// Collapse to constant false; a constant gate has no children.
    pub fn nullify(&mut self) {
        self.state = GateState::Null;
        self.children.clear();
    }

    /// Collapse to constant true.
    pub fn make_unity(&mut self) {
        self.state = GateState::Unity;
        self.children.clear();
    }

    /// Record a DFS visit; returns true once the gate already has both its
    /// enter and exit time, i.e. this is a revisit through a shared parent.
    pub fn visit(&mut self, time: u32) -> bool {
        if self.visits[0] == 0 {
            self.visits[0] = time;
            false
        } else if self.visits[1] == 0 {
            self.visits[1] = time;
            false
        } else {
            self.visits[2] = time;
            true
        }
    }

    pub fn enter_time(&self) -> u32 {
        self.visits[0]
    }
    pub fn exit_time(&self) -> u32 {
        self.visits[1]
    }
    /// The latest time this gate was seen.
    pub fn last_visit(&self) -> u32 {
        if self.visits[2] != 0 {
            self.visits[2]
        } else {
            self.visits[1]
        }
    }
    pub fn revisited(&self) -> bool {
        self.visits[2] != 0
    }
    pub fn clear_visits(&mut self) {
        self.visits = [0; 3];
    }
}

/// The indexed fault-tree graph: a gate arena plus the index partition.
#[derive(Debug)]
pub struct Graph {
    gates: HashMap<i32, Gate>,
    top_index: i32,
    /// First index that denotes a gate; smaller magnitudes are events.
    first_gate_index: i32,
    num_basic: usize,
    /// Last index handed out; fresh gates continue from here.
    next_index: i32,
    /// Sign accumulated from negative top gates; +1 after normalization.
    top_sign: i32,
    modules: BTreeSet<i32>,
}

impl Graph {
    /// Materializes the indexed graph from the model's formulas.
    ///
    /// Named arguments resolve through the CCF substitution map first (when
    /// enabled), then the general dictionary. Nested anonymous formulas get
    /// fresh indices above the user range.
    pub fn build(model: &Model, apply_ccf: bool) -> Result<Graph> {
        let mut graph = Graph {
            gates: HashMap::new(),
            top_index: model.top_index(),
            first_gate_index: model.first_gate_index(),
            num_basic: model.num_basic(),
            next_index: model.last_index(),
            top_sign: 1,
            modules: BTreeSet::new(),
        };
        for (index, formula) in model.gate_formulas() {
            build_gate(&mut graph, index, formula, model, apply_ccf)?;
        }
        graph.ensure_acyclic()?;
        debug!(
            "built indexed graph: {} gates, top {}",
            graph.gates.len(),
            graph.top_index
        );
        Ok(graph)
    }

    pub fn gate(&self, index: i32) -> &Gate {
        self.gates.get(&index).expect("gate index out of arena")
    }

    pub fn gate_mut(&mut self, index: i32) -> &mut Gate {
        self.gates.get_mut(&index).expect("gate index out of arena")
    }

    pub fn contains_gate(&self, index: i32) -> bool {
        self.gates.contains_key(&index)
    }

    pub fn insert_gate(&mut self, gate: Gate) {
        debug_assert!(!self.gates.contains_key(&gate.index()));
        self.gates.insert(gate.index(), gate);
    }

    /// Allocates a fresh gate index above every existing one.
    pub fn alloc_index(&mut self) -> i32 {
        self.next_index += 1;
        self.next_index
    }

    /// All gate indices in ascending order, for deterministic sweeps.
    pub fn gate_indices(&self) -> Vec<i32> {
        let mut indices: Vec<i32> = self.gates.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub fn top_index(&self) -> i32 {
        self.top_index
    }
    pub fn set_top_index(&mut self, index: i32) {
        self.top_index = index;
    }
    pub fn top(&self) -> &Gate {
        self.gate(self.top_index)
    }

    pub fn top_sign(&self) -> i32 {
        self.top_sign
    }
    pub fn set_top_sign(&mut self, sign: i32) {
        debug_assert!(sign == 1 || sign == -1);
        self.top_sign = sign;
    }
    pub fn flip_top_sign(&mut self) {
        self.top_sign = -self.top_sign;
    }

    pub fn num_basic(&self) -> usize {
        self.num_basic
    }
    pub fn first_gate_index(&self) -> i32 {
        self.first_gate_index
    }

    pub fn is_gate_index(&self, index: i32) -> bool {
        debug_assert!(index > 0);
        index >= self.first_gate_index
    }
    pub fn is_basic_index(&self, index: i32) -> bool {
        index >= 1 && index <= self.num_basic as i32
    }

    pub fn modules(&self) -> &BTreeSet<i32> {
        &self.modules
    }
    pub fn mark_module(&mut self, index: i32) {
        self.modules.insert(index);
    }
    pub fn is_module(&self, index: i32) -> bool {
        self.modules.contains(&index)
    }

    pub fn clear_visit_times(&mut self) {
        for gate in self.gates.values_mut() {
            gate.clear_visits();
        }
    }

    /// Emits the top event back as a user-level formula. Shared gates
    /// unfold into separate anonymous sub-formulas; complemented children
    /// render as NOT wrappers.
    pub fn export_formula(&self, model: &Model) -> Formula {
        self.export_gate(self.top_index, model)
    }

    fn export_gate(&self, index: i32, model: &Model) -> Formula {
        let gate = self.gate(index);
        let mut formula = Formula::new(gate.kind());
        formula.vote_number = gate.vote_number();
        for &lit in gate.children() {
            if self.is_gate_index(lit.index()) {
                let sub = self.export_gate(lit.index(), model);
                if lit.is_negated() {
                    formula.formula_args.push(Formula::new(GateKind::Not).with_formula(sub));
                } else {
                    formula.formula_args.push(sub);
                }
            } else {
                let name = model.name_of(lit.index()).expect("event index without a name");
                if lit.is_negated() {
                    formula.formula_args.push(Formula::not(name));
                } else {
                    formula.event_args.push(name.to_string());
                }
            }
        }
        formula
    }

    pub(crate) fn ensure_acyclic(&self) -> Result<()> {
        // Three-color DFS over every gate, shared state across roots.
        let mut state: HashMap<i32, u8> = HashMap::new();
        for index in self.gate_indices() {
            self.cycle_dfs(index, &mut state)?;
        }
        Ok(())
    }

    fn cycle_dfs(&self, index: i32, state: &mut HashMap<i32, u8>) -> Result<()> {
        match state.get(&index) {
            Some(1) => return Err(Error::CyclicFormula { gate: index }),
            Some(2) => return Ok(()),
            _ => {}
        }
        state.insert(index, 1);
        for &lit in self.gate(index).children() {
            if self.is_gate_index(lit.index()) {
                self.cycle_dfs(lit.index(), state)?;
            }
        }
        state.insert(index, 2);
        Ok(())
    }
}

fn build_gate(
    graph: &mut Graph,
    index: i32,
    formula: &Formula,
    model: &Model,
    apply_ccf: bool,
) -> Result<()> {
    let arity = formula.arity();
    match formula.kind {
        GateKind::Xor if arity != 2 => {
            return Err(Error::Arity {
                gate: index,
                kind: formula.kind,
                expected: 2,
                actual: arity,
            });
        }
        GateKind::Not | GateKind::Null if arity != 1 => {
            return Err(Error::Arity {
                gate: index,
                kind: formula.kind,
                expected: 1,
                actual: arity,
            });
        }
        _ => {}
    }

    let mut gate = Gate::new(index, formula.kind);
    if formula.kind == GateKind::AtLeast {
        let vote = formula.vote_number.unwrap_or(0);
        if vote < 2 || vote + 1 > arity {
            return Err(Error::InvalidVoteNumber {
                gate: index,
                vote,
                children: arity,
            });
        }
        gate.set_vote_number(vote);
    }

    for name in &formula.event_args {
        let substitute = if apply_ccf { model.ccf_substitute(name) } else { None };
        let child_index = match substitute.or_else(|| model.index_of(name)) {
            Some(child_index) => child_index,
            None => return Err(Error::UnknownEvent { name: name.clone() }),
        };
        let literal = Literal::positive(child_index);
        if gate.add_child(literal) != ChildStatus::Added {
            return Err(Error::DuplicateChild { gate: index, literal });
        }
    }
    for sub in &formula.formula_args {
        let child_index = graph.alloc_index();
        build_gate(graph, child_index, sub, model, apply_ccf)?;
        let status = gate.add_child(Literal::positive(child_index));
        debug_assert_eq!(status, ChildStatus::Added);
    }
    graph.insert_gate(gate);
    Ok(())
}
