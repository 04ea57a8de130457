//! # fta-rs: Fault-Tree Analysis in Rust
//!
//! **`fta-rs`** analyzes fault trees: Boolean formulas over named failure
//! events that describe how component failures combine into a top-level
//! system failure. It enumerates the **minimal cut sets** — the minimal
//! combinations of basic-event failures that trigger the top event — and
//! quantifies the top event's probability and per-event importance factors.
//!
//! ## How it works
//!
//! The engine is an indexed Boolean graph: every event and gate gets a
//! dense integer, a sign encodes complement, and a sequence of in-place
//! rewriting passes turns an arbitrary formula (AND, OR, XOR, NOT, NULL,
//! NAND, NOR, ATLEAST) into a strictly alternating AND/OR DAG:
//!
//! 1. normalization (sign extraction, XOR/ATLEAST expansion),
//! 2. constant propagation (house events are fixed constants),
//! 3. complement propagation (negations pushed onto event literals),
//! 4. coalescing (same-kind gates merged),
//! 5. module detection (independently solvable subtrees).
//!
//! Minimal cut sets come from top-down expansion with subsumption; the
//! exact probability comes from a reduced ordered **BDD** with complement
//! edges, with rare-event and MCUB closed forms available as cheap upper
//! bounds.
//!
//! ## Basic Usage
//!
//! ```rust
//! use fta_rs::analysis::Analysis;
//! use fta_rs::formula::Formula;
//! use fta_rs::model::Model;
//! use fta_rs::settings::Settings;
//!
//! // Power fails when the mains fail and the backup path fails too.
//! let model = Model::builder()
//!     .basic_event("gen_fail", 2e-2)
//!     .basic_event("relay_fail", 5e-2)
//!     .basic_event("mains_fail", 3e-2)
//!     .gate("backup", Formula::or(["gen_fail", "relay_fail"]))
//!     .top_gate("no_power", Formula::and(["mains_fail", "backup"]))
//!     .finish()
//!     .unwrap();
//!
//! let result = Analysis::new(Settings::default()).run(&model).unwrap();
//!
//! assert_eq!(result.cut_sets.len(), 2);
//! assert!((result.p_total - 0.00207).abs() < 1e-12);
//! ```
//!
//! ## Core Components
//!
//! - **[`model`]**: the event dictionary — names, probabilities, house
//!   events, and the dense index partition.
//! - **[`graph`]**: the indexed graph and its construction from formulas.
//! - **[`normalize`], [`constant`], [`complement`], [`coalesce`],
//!   [`module`]**: the rewriting passes, in pipeline order.
//! - **[`mcs`]**: minimal cut set extraction.
//! - **[`bdd`], [`probability`], [`importance`]**: quantification.
//! - **[`analysis`]**: the driver tying the pipeline together.

pub mod analysis;
pub mod bdd;
pub mod cache;
pub mod coalesce;
pub mod complement;
pub mod constant;
pub mod error;
pub mod formula;
pub mod graph;
pub mod importance;
pub mod literal;
pub mod mcs;
pub mod model;
pub mod module;
pub mod node;
pub mod normalize;
pub mod probability;
pub mod settings;
pub mod utils;
