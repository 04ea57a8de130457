//! The event dictionary: names to dense indices.
//!
//! Indices partition the positive integers: `[1, B]` basic events,
//! `[B+1, B+H]` house events, `[B+H+1, G]` user gates with the top gate
//! holding the largest index `G`. Everything above `G` is reserved for
//! gates synthesized during rewriting.

use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::formula::Formula;

/// An atomic failure event with an independent probability.
#[derive(Debug, Clone)]
pub struct BasicEvent {
    pub name: String,
    pub probability: f64,
}

/// A Boolean constant event, fixed for the analysis run.
#[derive(Debug, Clone)]
pub struct HouseEvent {
    pub name: String,
    pub state: bool,
}

/// A validated, index-assigned model ready for graph construction.
#[derive(Debug)]
pub struct Model {
    basics: Vec<BasicEvent>,
    houses: Vec<HouseEvent>,
    /// User gates in index order; the top gate is last.
    gates: Vec<(String, Formula)>,
    index_of: HashMap<String, i32>,
    ccf_substitutes: HashMap<String, i32>,
    mission_time: f64,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn num_basic(&self) -> usize {
        self.basics.len()
    }
    pub fn num_house(&self) -> usize {
        self.houses.len()
    }
    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    /// First index denoting a gate.
    pub fn first_gate_index(&self) -> i32 {
        (self.basics.len() + self.houses.len() + 1) as i32
    }

    /// Largest index handed out, which is the top gate's.
    pub fn last_index(&self) -> i32 {
        (self.basics.len() + self.houses.len() + self.gates.len()) as i32
    }

    pub fn top_index(&self) -> i32 {
        self.last_index()
    }

    pub fn index_of(&self, name: &str) -> Option<i32> {
        self.index_of.get(name).copied()
    }

    pub fn ccf_substitute(&self, name: &str) -> Option<i32> {
        self.ccf_substitutes.get(name).copied()
    }

    /// Reverse lookup through the index partition.
    pub fn name_of(&self, index: i32) -> Option<&str> {
        if index < 1 {
            return None;
        }
        let index = index as usize;
        let b = self.basics.len();
        let h = self.houses.len();
        if index <= b {
            Some(&self.basics[index - 1].name)
        } else if index <= b + h {
            Some(&self.houses[index - b - 1].name)
        } else if index <= b + h + self.gates.len() {
            Some(&self.gates[index - b - h - 1].0)
        } else {
            None
        }
    }

    pub fn gate_formulas(&self) -> impl Iterator<Item = (i32, &Formula)> {
        let first = self.first_gate_index();
        self.gates
            .iter()
            .enumerate()
            .map(move |(offset, (_, formula))| (first + offset as i32, formula))
    }

    pub fn basic_events(&self) -> &[BasicEvent] {
        &self.basics
    }

    /// Basic-event probabilities indexed by event index; slot 0 is unused.
    pub fn probabilities(&self) -> Vec<f64> {
        let mut probs = Vec::with_capacity(self.basics.len() + 1);
        probs.push(0.0);
        probs.extend(self.basics.iter().map(|event| event.probability));
        probs
    }

    pub fn true_house_events(&self) -> BTreeSet<i32> {
        self.house_indices(true)
    }

    pub fn false_house_events(&self) -> BTreeSet<i32> {
        self.house_indices(false)
    }

    fn house_indices(&self, state: bool) -> BTreeSet<i32> {
        let base = self.basics.len() as i32;
        self.houses
            .iter()
            .enumerate()
            .filter(|(_, event)| event.state == state)
            .map(|(offset, _)| base + 1 + offset as i32)
            .collect()
    }

    pub fn mission_time(&self) -> f64 {
        self.mission_time
    }
}

/// Collects model declarations and assigns the index partition on `finish`.
#[derive(Default)]
pub struct ModelBuilder {
    basics: Vec<BasicEvent>,
    houses: Vec<HouseEvent>,
    gates: Vec<(String, Formula)>,
    top: Option<(String, Formula)>,
    ccf_substitutes: Vec<(String, String)>,
    mission_time: Option<f64>,
}

impl ModelBuilder {
    pub fn basic_event(mut self, name: &str, probability: f64) -> Self {
        self.basics.push(BasicEvent {
            name: name.to_string(),
            probability,
        });
        self
    }

    pub fn house_event(mut self, name: &str, state: bool) -> Self {
        self.houses.push(HouseEvent {
            name: name.to_string(),
            state,
        });
        self
    }

    pub fn gate(mut self, name: &str, formula: Formula) -> Self {
        self.gates.push((name.to_string(), formula));
        self
    }

    pub fn top_gate(mut self, name: &str, formula: Formula) -> Self {
        self.top = Some((name.to_string(), formula));
        self
    }

    /// Redirect `alias` to the gate named `target`, e.g. a CCF-expanded
    /// stand-in for a basic event. Applied with precedence over the plain
    /// dictionary when CCF analysis is on.
    pub fn ccf_substitute(mut self, alias: &str, target: &str) -> Self {
        self.ccf_substitutes.push((alias.to_string(), target.to_string()));
        self
    }

    pub fn mission_time(mut self, time: f64) -> Self {
        self.mission_time = Some(time);
        self
    }

    pub fn finish(self) -> Result<Model> {
        let mission_time = self.mission_time.unwrap_or(8760.0);
        if mission_time < 0.0 {
            return Err(Error::NegativeMissionTime { value: mission_time });
        }
        for event in &self.basics {
            if !(0.0..=1.0).contains(&event.probability) {
                return Err(Error::InvalidProbability {
                    name: event.name.clone(),
                    value: event.probability,
                });
            }
        }

        let (top_name, top_formula) = self.top.ok_or(Error::MissingTopGate)?;
        let mut gates = self.gates;
        gates.push((top_name, top_formula));

        let mut index_of: HashMap<String, i32> = HashMap::new();
        let mut next = 0;
        for name in self
            .basics
            .iter()
            .map(|event| &event.name)
            .chain(self.houses.iter().map(|event| &event.name))
            .chain(gates.iter().map(|(name, _)| name))
        {
            next += 1;
            if index_of.insert(name.clone(), next).is_some() {
                return Err(Error::DuplicateDefinition { name: name.clone() });
            }
        }

        let mut ccf_substitutes = HashMap::new();
        for (alias, target) in self.ccf_substitutes {
            let index = match index_of.get(&target) {
                Some(&index) => index,
                None => return Err(Error::UnknownEvent { name: target }),
            };
            ccf_substitutes.insert(alias, index);
        }

        Ok(Model {
            basics: self.basics,
            houses: self.houses,
            gates,
            index_of,
            ccf_substitutes,
            mission_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_partition() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.2)
            .house_event("h", true)
            .gate("sub", Formula::or(["a", "b"]))
            .top_gate("top", Formula::and(["h", "sub"]))
            .finish()
            .unwrap();

        assert_eq!(model.index_of("a"), Some(1));
        assert_eq!(model.index_of("b"), Some(2));
        assert_eq!(model.index_of("h"), Some(3));
        assert_eq!(model.index_of("sub"), Some(4));
        assert_eq!(model.index_of("top"), Some(5));
        assert_eq!(model.first_gate_index(), 4);
        assert_eq!(model.top_index(), 5);
        assert_eq!(model.name_of(3), Some("h"));
        assert_eq!(model.name_of(5), Some("top"));
        assert_eq!(model.name_of(6), None);
        assert_eq!(model.probabilities(), vec![0.0, 0.1, 0.2]);
        assert_eq!(model.true_house_events(), BTreeSet::from([3]));
        assert!(model.false_house_events().is_empty());
    }

    #[test]
    fn test_duplicate_definition() {
        let err = Model::builder()
            .basic_event("a", 0.1)
            .house_event("a", false)
            .top_gate("top", Formula::or(["a"]))
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition { name } if name == "a"));
    }

    #[test]
    fn test_probability_domain() {
        let err = Model::builder()
            .basic_event("a", 1.5)
            .top_gate("top", Formula::or(["a"]))
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProbability { value, .. } if value == 1.5));
    }

    #[test]
    fn test_negative_mission_time() {
        let err = Model::builder()
            .basic_event("a", 0.1)
            .top_gate("top", Formula::or(["a"]))
            .mission_time(-1.0)
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::NegativeMissionTime { .. }));
    }

    #[test]
    fn test_missing_top() {
        let err = Model::builder().basic_event("a", 0.1).finish().unwrap_err();
        assert!(matches!(err, Error::MissingTopGate));
    }
}
