//! Identification of minimal deterministic finite automata from labelled samples.
//!
//! The augmented prefix tree acceptor of a sample is optionally shrunk by evidence driven
//! state merging ([`edsm`]), then the question whether an automaton with `n` states exists
//! is encoded as a CNF formula ([`encoding`]) for increasing `n` and decided by a SAT
//! solver ([`solver`]). The [`inference::Inductor`] drives the whole process.
#![allow(missing_docs)]

/// Settings of an identification run.
pub mod config;

/// Provisional and final merging of APTA nodes.
pub mod merge;

pub mod edsm;

/// Pairs of APTA nodes that can never share a state, and cliques of such nodes.
pub mod consistency;

pub mod encoding;

pub mod decoding;

pub mod solver;

pub mod inference;

pub mod prelude {
    pub use super::{
        config::{
            AtMostOne, ConfigError, EncodingConfig, FanoutBounds, GroupCount, InductionConfig,
            MergeHeuristic, ReductionConfig, SinkMode, Solutions, SymmetryBreaking,
        },
        consistency::{Clique, ConsistencyGraph},
        decoding::{AutomatonBuilder, DecodeError},
        edsm::{EdsmWorker, ReductionSummary},
        encoding::{DimacsFileGenerator, EncodingError},
        inference::{Induction, InductionError, Inductor},
        merge::{MergeStrategy, StateMerger},
        solver::{EmbeddedSolver, ExternalSolver, Model, SatSolver, SolveOutcome, SolverError},
    };
}
