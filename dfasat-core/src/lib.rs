//! Data model for identifying deterministic finite automata from labelled samples.
//!
//! The crate provides the [`Alphabet`](alphabet::Alphabet) of a learning task, the
//! [`FiniteSample`](sample::FiniteSample) of classified words together with its file
//! format, the augmented prefix tree acceptor [`Apta`](apta::Apta) which the learning
//! algorithms operate on, and the [`Automaton`](automaton::Automaton) that is produced
//! as a result.
#![allow(missing_docs)]

pub mod math;

pub mod alphabet;

pub mod sample;

pub mod apta;

pub mod automaton;

pub mod dot;

pub mod prelude {
    pub use super::{
        alphabet::{Alphabet, Symbol},
        apta::{Apta, AptaError, NodeId, PrefixNode, Status},
        automaton::{Automaton, AutomatonState},
        dot::Dottable,
        math,
        sample::{FiniteSample, SampleError, SampleParseError},
    };
}
