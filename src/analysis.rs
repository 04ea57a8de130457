//! The analysis driver: one synchronous pass over the whole pipeline.
//!
//! Build the indexed graph, normalize, fold constants, push complements,
//! coalesce, detect modules, extract minimal cut sets, then quantify:
//! total probability (exact over the BDD or an approximation), per-cut-set
//! probabilities, and importance factors. An optional abort flag is checked
//! at pass boundaries; partial results never escape.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use crate::bdd::Bdd;
use crate::coalesce::coalesce;
use crate::complement::propagate_complements;
use crate::constant::propagate_constants;
use crate::error::{Error, Result};
use crate::graph::{GateState, Graph};
use crate::importance::{importance, ImportanceFactors};
use crate::literal::Literal;
use crate::mcs::minimal_cut_sets;
use crate::model::Model;
use crate::module::detect_modules;
use crate::normalize::normalize;
use crate::probability::{mcub, product_probability, rare_event};
use crate::settings::{Approximation, Settings};

/// Wall-clock spent in each phase.
#[derive(Debug, Copy, Clone, Default)]
pub struct Timings {
    pub graph: Duration,
    pub cut_sets: Duration,
    pub probability: Duration,
    pub importance: Duration,
}

/// One minimal cut set with its quantification.
#[derive(Debug, Clone)]
pub struct CutSet {
    /// Signed basic-event indices; negative means the complement.
    pub literals: BTreeSet<Literal>,
    pub probability: f64,
    /// Fraction of the total probability.
    pub contribution: f64,
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub cut_sets: Vec<CutSet>,
    /// Probability by the chosen method.
    pub p_total: f64,
    /// Exact BDD probability, when one was computed.
    pub p_exact: Option<f64>,
    pub p_rare: f64,
    pub p_mcub: f64,
    pub importance: BTreeMap<i32, ImportanceFactors>,
    /// Gate indices marked as independent modules.
    pub modules: Vec<i32>,
    /// False when any cut set holds a complemented event.
    pub coherent: bool,
    /// Whether `limit_order` dropped any cut set.
    pub truncated: bool,
    pub warnings: Vec<String>,
    pub timings: Timings,
}

impl AnalysisResult {
    /// Cut sets with event names restored; complements render as `not <name>`.
    pub fn cut_set_names(&self, model: &Model) -> Vec<BTreeSet<String>> {
        self.cut_sets
            .iter()
            .map(|cut_set| {
                cut_set
                    .literals
                    .iter()
                    .map(|lit| {
                        let name = model.name_of(lit.index()).unwrap_or("?");
                        if lit.is_negated() {
                            format!("not {name}")
                        } else {
                            name.to_string()
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// The analysis entry point. One value runs one model at a time; nothing is
/// shared between runs.
pub struct Analysis {
    settings: Settings,
    abort: Option<Arc<AtomicBool>>,
}

impl Analysis {
    pub fn new(settings: Settings) -> Self {
        Self { settings, abort: None }
    }

    /// Installs a cancellation flag checked at pass boundaries.
    pub fn with_abort(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    fn check_abort(&self) -> Result<()> {
        match &self.abort {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Aborted),
            _ => Ok(()),
        }
    }

    pub fn run(&self, model: &Model) -> Result<AnalysisResult> {
        let mut warnings = Vec::new();
        let graph_start = Instant::now();

        let mut graph = Graph::build(model, self.settings.ccf_analysis)?;
        self.check_abort()?;
        if let Some(orphans) = orphan_basic_events(&graph, model) {
            warnings.push(format!("orphan primary events: {orphans}"));
        }
        normalize(&mut graph);
        propagate_constants(&mut graph, &model.true_house_events(), &model.false_house_events());
        self.check_abort()?;
        propagate_complements(&mut graph);
        coalesce(&mut graph);
        self.check_abort()?;

        match graph.top().state() {
            GateState::Unity => {
                warnings.push("top event is always true".to_string());
                return Ok(self.constant_result(true, warnings, graph_start.elapsed()));
            }
            GateState::Null => {
                warnings.push("top event is always false".to_string());
                return Ok(self.constant_result(false, warnings, graph_start.elapsed()));
            }
            GateState::Normal => {}
        }

        detect_modules(&mut graph);
        let graph_time = graph_start.elapsed();
        debug!("graph preparation done in {:?}", graph_time);

        let mcs_start = Instant::now();
        let extracted = minimal_cut_sets(&graph, self.settings.limit_order, self.settings.product_limit)?;
        if extracted.truncated {
            warnings.push(format!(
                "minimal cut sets truncated at order {}",
                self.settings.limit_order
            ));
        }
        let mcs_time = mcs_start.elapsed();
        self.check_abort()?;

        let prob_start = Instant::now();
        let probs = model.probabilities();
        let p_rare = rare_event(&extracted.products, &probs);
        let p_mcub = mcub(&extracted.products, &probs);
        let coherent = extracted
            .products
            .iter()
            .all(|product| product.iter().all(|lit| !lit.is_negated()));

        let need_bdd =
            self.settings.approximation == Approximation::None || self.settings.importance_analysis;
        let mut engine = if need_bdd {
            let mut bdd = Bdd::new();
            let root = bdd.from_graph(&graph, self.settings.bdd_node_limit)?;
            Some((bdd, root))
        } else {
            None
        };
        let p_exact = engine.as_mut().map(|(bdd, root)| bdd.probability(*root, &probs));

        let p_total = match self.settings.approximation {
            Approximation::None => p_exact.expect("exact analysis built a BDD"),
            Approximation::RareEvent => p_rare,
            Approximation::Mcub => p_mcub,
        };
        if p_total > 1.0 {
            warnings.push("rare-event approximation exceeds 1".to_string());
        }

        let cut_sets: Vec<CutSet> = extracted
            .products
            .iter()
            .map(|product| {
                let probability = product_probability(product, &probs);
                CutSet {
                    literals: product.clone(),
                    probability,
                    contribution: if p_total > 0.0 { probability / p_total } else { 0.0 },
                }
            })
            .collect();
        let prob_time = prob_start.elapsed();
        self.check_abort()?;

        let importance_start = Instant::now();
        let mut factors = BTreeMap::new();
        if self.settings.importance_analysis && !cut_sets.is_empty() {
            if p_total > 0.0 {
                let events: BTreeSet<i32> = extracted
                    .products
                    .iter()
                    .flat_map(|product| product.iter().map(|lit| lit.index()))
                    .collect();
                let (bdd, root) = engine.as_mut().expect("importance analysis built a BDD");
                factors = importance(bdd, *root, &probs, p_total, events);
            } else {
                warnings.push("importance analysis skipped: total probability is zero".to_string());
            }
        }
        let importance_time = importance_start.elapsed();

        Ok(AnalysisResult {
            cut_sets,
            p_total,
            p_exact,
            p_rare,
            p_mcub,
            importance: factors,
            modules: graph.modules().iter().copied().collect(),
            coherent,
            truncated: extracted.truncated,
            warnings,
            timings: Timings {
                graph: graph_time,
                cut_sets: mcs_time,
                probability: prob_time,
                importance: importance_time,
            },
        })
    }

    /// A whole-tree constant is a legitimate result, not an error.
    fn constant_result(&self, unity: bool, warnings: Vec<String>, graph_time: Duration) -> AnalysisResult {
        let p = if unity { 1.0 } else { 0.0 };
        let cut_sets = if unity {
            vec![CutSet {
                literals: BTreeSet::new(),
                probability: 1.0,
                contribution: 1.0,
            }]
        } else {
            Vec::new()
        };
        AnalysisResult {
            cut_sets,
            p_total: p,
            p_exact: Some(p),
            p_rare: p,
            p_mcub: p,
            importance: BTreeMap::new(),
            modules: Vec::new(),
            coherent: true,
            truncated: false,
            warnings,
            timings: Timings {
                graph: graph_time,
                ..Timings::default()
            },
        }
    }
}

/// Basic events declared but referenced by no formula.
fn orphan_basic_events(graph: &Graph, model: &Model) -> Option<String> {
    let mut referenced: BTreeSet<i32> = BTreeSet::new();
    for index in graph.gate_indices() {
        for &lit in graph.gate(index).children() {
            if !graph.is_gate_index(lit.index()) {
                referenced.insert(lit.index());
            }
        }
    }
    let orphans: Vec<&str> = model
        .basic_events()
        .iter()
        .enumerate()
        .filter(|(offset, _)| !referenced.contains(&(*offset as i32 + 1)))
        .map(|(_, event)| event.name.as_str())
        .collect();
    if orphans.is_empty() {
        None
    } else {
        Some(orphans.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::formula::Formula;
    use crate::graph::testing::evaluate;

    fn named_sets(result: &AnalysisResult, model: &Model) -> BTreeSet<BTreeSet<String>> {
        result.cut_set_names(model).into_iter().collect()
    }

    fn set_of(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn theatre() -> Model {
        Model::builder()
            .basic_event("gen_fail", 2e-2)
            .basic_event("relay_fail", 5e-2)
            .basic_event("mains_fail", 3e-2)
            .gate("backup", Formula::or(["gen_fail", "relay_fail"]))
            .top_gate("no_power", Formula::and(["mains_fail", "backup"]))
            .finish()
            .unwrap()
    }

    #[test]
    fn test_scenario_theatre() {
        let model = theatre();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();

        let expected: BTreeSet<BTreeSet<String>> = [
            set_of(&["gen_fail", "mains_fail"]),
            set_of(&["mains_fail", "relay_fail"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(named_sets(&result, &model), expected);

        // Exact: 0.03 * (1 - 0.98 * 0.95) = 0.00207.
        assert!((result.p_total - 0.00207).abs() < 1e-12);
        assert!((result.p_rare - 0.0021).abs() < 1e-12);
        assert!(result.p_rare >= result.p_mcub);
        assert!(result.p_mcub >= result.p_total - 1e-12);
        assert!(result.coherent);
        assert!(!result.truncated);
        assert!(result.warnings.is_empty());

        // Importance identity: DIF(e) + P(top|e=0)/P(top) == 1.
        for factors in result.importance.values() {
            assert!(factors.raw >= 1.0);
            assert!(factors.mif >= 0.0);
        }
        let mains = model.index_of("mains_fail").unwrap();
        assert!((result.importance[&mains].dif - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_two_train() {
        let model = Model::builder()
            .basic_event("valveone", 0.5)
            .basic_event("valvetwo", 0.5)
            .basic_event("pumpone", 0.7)
            .basic_event("pumptwo", 0.7)
            .gate("trainone", Formula::or(["valveone", "pumpone"]))
            .gate("traintwo", Formula::or(["valvetwo", "pumptwo"]))
            .top_gate("system", Formula::and(["trainone", "traintwo"]))
            .finish()
            .unwrap();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();

        let expected: BTreeSet<BTreeSet<String>> = [
            set_of(&["valveone", "valvetwo"]),
            set_of(&["pumpone", "pumptwo"]),
            set_of(&["pumpone", "valvetwo"]),
            set_of(&["valveone", "pumptwo"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(named_sets(&result, &model), expected);
        assert!((result.p_total - 0.7225).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_xor() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.2)
            .top_gate("top", Formula::xor("a", "b"))
            .finish()
            .unwrap();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();

        let expected: BTreeSet<BTreeSet<String>> = [
            set_of(&["a", "not b"]),
            set_of(&["not a", "b"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(named_sets(&result, &model), expected);
        assert!(!result.coherent);
        // 0.1 * 0.8 + 0.9 * 0.2 = 0.26.
        assert!((result.p_total - 0.26).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_constant_folding() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.2)
            .basic_event("c", 0.3)
            .house_event("h", true)
            .top_gate(
                "top",
                Formula::or(["c"])
                    .with_formula(Formula::and(["a", "h"]))
                    .with_formula(Formula::and(["b"]).with_formula(Formula::not("h"))),
            )
            .finish()
            .unwrap();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();

        let expected: BTreeSet<BTreeSet<String>> =
            [set_of(&["a"]), set_of(&["c"])].into_iter().collect();
        assert_eq!(named_sets(&result, &model), expected);
        // P(a OR c) = 1 - 0.9 * 0.7.
        assert!((result.p_total - 0.37).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_atleast() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.1)
            .basic_event("c", 0.1)
            .top_gate("top", Formula::atleast(2, ["a", "b", "c"]))
            .finish()
            .unwrap();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();

        let expected: BTreeSet<BTreeSet<String>> = [
            set_of(&["a", "b"]),
            set_of(&["a", "c"]),
            set_of(&["b", "c"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(named_sets(&result, &model), expected);
        // 1 - (0.9^3 + 3 * 0.1 * 0.9^2) = 0.028.
        assert!((result.p_total - 0.028).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_modules() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.1)
            .basic_event("c", 0.1)
            .basic_event("d", 0.1)
            .gate("t1", Formula::or(["a", "b"]))
            .gate("t2", Formula::or(["c", "d"]))
            .top_gate("top", Formula::and(["t1", "t2"]))
            .finish()
            .unwrap();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();
        let t1 = model.index_of("t1").unwrap();
        let t2 = model.index_of("t2").unwrap();
        let top = model.index_of("top").unwrap();
        assert!(result.modules.contains(&t1));
        assert!(result.modules.contains(&t2));
        assert!(result.modules.contains(&top));
    }

    #[test]
    fn test_degenerate_tops() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .house_event("h", true)
            .top_gate("top", Formula::or(["a", "h"]))
            .finish()
            .unwrap();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();
        assert_eq!(result.p_total, 1.0);
        assert_eq!(result.cut_sets.len(), 1);
        assert!(result.cut_sets[0].literals.is_empty());
        assert!(result.warnings.iter().any(|w| w == "top event is always true"));

        let model = Model::builder()
            .basic_event("a", 0.1)
            .house_event("h", false)
            .top_gate("top", Formula::and(["a", "h"]))
            .finish()
            .unwrap();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();
        assert_eq!(result.p_total, 0.0);
        assert!(result.cut_sets.is_empty());
        assert!(result.warnings.iter().any(|w| w == "top event is always false"));
    }

    #[test]
    fn test_truncation_warning() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.1)
            .basic_event("c", 0.1)
            .gate("deep", Formula::and(["a", "b", "c"]))
            .top_gate("top", Formula::or(["a", "deep"]))
            .finish()
            .unwrap();
        let settings = Settings::default().limit_order(2);
        let result = Analysis::new(settings).run(&model).unwrap();
        assert!(result.truncated);
        assert!(result
            .warnings
            .iter()
            .any(|w| w == "minimal cut sets truncated at order 2"));
    }

    #[test]
    fn test_orphan_warning() {
        let model = Model::builder()
            .basic_event("a", 0.1)
            .basic_event("b", 0.2)
            .basic_event("spare", 0.3)
            .top_gate("top", Formula::and(["a", "b"]))
            .finish()
            .unwrap();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| w == "orphan primary events: spare"));
    }

    #[test]
    fn test_abort() {
        let flag = Arc::new(AtomicBool::new(true));
        let analysis = Analysis::new(Settings::default()).with_abort(flag);
        let err = analysis.run(&theatre()).unwrap_err();
        assert!(matches!(err, Error::Aborted));
    }

    #[test]
    fn test_approximations_only() {
        let model = theatre();
        let settings = Settings::default()
            .approximation(Approximation::RareEvent)
            .importance_analysis(false);
        let result = Analysis::new(settings).run(&model).unwrap();
        assert!(result.p_exact.is_none());
        assert!((result.p_total - 0.0021).abs() < 1e-12);
        assert!(result.importance.is_empty());

        let settings = Settings::default().approximation(Approximation::Mcub);
        let result = Analysis::new(settings).run(&model).unwrap();
        assert!((result.p_total - result.p_mcub).abs() < 1e-15);
        // Importance still runs, off the exact conditionals.
        assert_eq!(result.importance.len(), 3);
    }

    #[test]
    fn test_contributions_sum() {
        let model = theatre();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();
        let total: f64 = result.cut_sets.iter().map(|cs| cs.contribution).sum();
        assert!((total - result.p_rare / result.p_total).abs() < 1e-9);
    }

    #[test]
    fn test_exact_matches_enumeration() {
        // Brute-force the truth table against the BDD probability.
        let model = Model::builder()
            .basic_event("a", 0.12)
            .basic_event("b", 0.2)
            .basic_event("c", 0.35)
            .basic_event("d", 0.4)
            .basic_event("e", 0.07)
            .gate("vote", Formula::atleast(2, ["a", "b", "c"]))
            .gate("guard", Formula::nand(["d", "e"]))
            .top_gate("top", Formula::or(["vote"]).with_formula(Formula::and(["guard", "d"])))
            .finish()
            .unwrap();
        let result = Analysis::new(Settings::default()).run(&model).unwrap();

        let reference = Graph::build(&model, false).unwrap();
        let probs = model.probabilities();
        let mut expected = 0.0;
        for bits in 0..32u32 {
            let truth: BTreeSet<i32> =
                (0..5).filter(|&i| bits & (1 << i) != 0).map(|i| i + 1).collect();
            if evaluate(&reference, &truth) {
                let mut weight = 1.0;
                for event in 1..=5 {
                    weight *= if truth.contains(&event) {
                        probs[event as usize]
                    } else {
                        1.0 - probs[event as usize]
                    };
                }
                expected += weight;
            }
        }
        assert!((result.p_total - expected).abs() < 1e-12);
    }

    #[test]
    fn test_timings_populated() {
        let result = Analysis::new(Settings::default()).run(&theatre()).unwrap();
        assert!(result.timings.graph > Duration::ZERO);
    }
}
