//! Error taxonomy of the engine.
//!
//! Structural errors abort graph construction; domain errors reject invalid
//! model inputs; limit errors stop an analysis that outgrew its configured
//! caps; logic errors are internal invariant violations and indicate a bug.

use thiserror::Error;

use crate::formula::GateKind;
use crate::literal::Literal;

#[derive(Debug, Error)]
pub enum Error {
    #[error("formula cycle through gate {gate}")]
    CyclicFormula { gate: i32 },

    #[error("unknown event `{name}`")]
    UnknownEvent { name: String },

    #[error("duplicate child {literal} in gate {gate}")]
    DuplicateChild { gate: i32, literal: Literal },

    #[error("vote number {vote} of gate {gate} is invalid for {children} arguments")]
    InvalidVoteNumber { gate: i32, vote: usize, children: usize },

    #[error("gate {gate}: {kind} takes {expected} arguments, got {actual}")]
    Arity {
        gate: i32,
        kind: GateKind,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate definition of `{name}`")]
    DuplicateDefinition { name: String },

    #[error("model has no top gate")]
    MissingTopGate,

    #[error("probability {value} of `{name}` is outside [0, 1]")]
    InvalidProbability { name: String, value: f64 },

    #[error("mission time {value} is negative")]
    NegativeMissionTime { value: f64 },

    #[error("BDD node count exceeded the limit of {limit}")]
    BddNodeLimit { limit: usize },

    #[error("cut-set products exceeded the limit of {limit}")]
    ProductLimit { limit: usize },

    #[error("internal invariant violation: {0}")]
    Logic(String),

    #[error("analysis aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, Error>;
