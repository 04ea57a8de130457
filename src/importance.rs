//! Importance factors: how much each basic event drives the top event.
//!
//! All five factors derive from two conditional evaluations per event,
//! with the event's probability pinned to 1 and to 0.

use std::collections::BTreeMap;

use log::debug;

use crate::bdd::Bdd;
use crate::node::Ref;

/// Collection of importance factors for one basic event.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ImportanceFactors {
    /// Fussel-Vesely diagnosis importance factor.
    pub dif: f64,
    /// Birnbaum marginal importance factor.
    pub mif: f64,
    /// Critical importance factor.
    pub cif: f64,
    /// Risk reduction worth.
    pub rrw: f64,
    /// Risk achievement worth.
    pub raw: f64,
}

/// Computes the factors for every event in `events` against the function
/// rooted at `root`. `p_total` is the unconditional top probability.
pub fn importance(
    bdd: &mut Bdd,
    root: Ref,
    probs: &[f64],
    p_total: f64,
    events: impl IntoIterator<Item = i32>,
) -> BTreeMap<i32, ImportanceFactors> {
    let mut factors = BTreeMap::new();
    let mut conditional = probs.to_vec();
    for event in events {
        let slot = event as usize;
        conditional[slot] = 1.0;
        let p_up = bdd.probability(root, &conditional);
        conditional[slot] = 0.0;
        let p_down = bdd.probability(root, &conditional);
        conditional[slot] = probs[slot];

        let mif = p_up - p_down;
        debug!("event {}: P(top|e=1) = {}, P(top|e=0) = {}", event, p_up, p_down);
        factors.insert(
            event,
            ImportanceFactors {
                dif: 1.0 - p_down / p_total,
                mif,
                cif: mif * probs[slot] / p_total,
                rrw: p_total / p_down,
                raw: p_up / p_total,
            },
        );
    }
    factors
}
