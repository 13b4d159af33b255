use std::{path::Path, time::Duration};

use thiserror::Error;

mod embedded;
mod external;

pub use embedded::EmbeddedSolver;
pub use external::ExternalSolver;

/// A satisfying assignment, `literals[v - 1]` is `v` if variable `v` is true and `-v` if it
/// is false.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Model {
    literals: Vec<i32>,
}

impl Model {
    /// Collects literals given in any order, variables that do not occur are false.
    pub fn from_literals<I: IntoIterator<Item = i32>>(literals: I) -> Self {
        let mut model = vec![];
        for literal in literals {
            let index = literal.unsigned_abs() as usize;
            if index == 0 {
                continue;
            }
            if model.len() < index {
                model.extend((model.len() + 1..=index).map(|v| -(v as i32)));
            }
            model[index - 1] = literal;
        }
        Self { literals: model }
    }

    pub fn is_true(&self, variable: i32) -> bool {
        variable > 0
            && self
                .literals
                .get(variable as usize - 1)
                .map_or(false, |literal| *literal > 0)
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn literals(&self) -> &[i32] {
        &self.literals
    }
}

/// What a SAT solver found out about a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Satisfiable(Model),
    Unsatisfiable,
    TimedOut,
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("could not start solver `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("communication with the solver failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("solver failed: {0}")]
    Backend(String),
    #[error("could not understand solver output: {0}")]
    MalformedOutput(String),
}

/// Decides the satisfiability of a formula stored in a DIMACS file.
pub trait SatSolver {
    /// Solves the formula at `cnf`. If `timeout` is given and elapses before the solver is
    /// done, the solver is stopped and [`SolveOutcome::TimedOut`] is returned.
    fn solve(&self, cnf: &Path, timeout: Option<Duration>) -> Result<SolveOutcome, SolverError>;

    fn name(&self) -> String;
}

impl<S: SatSolver + ?Sized> SatSolver for Box<S> {
    fn solve(&self, cnf: &Path, timeout: Option<Duration>) -> Result<SolveOutcome, SolverError> {
        self.as_ref().solve(cnf, timeout)
    }

    fn name(&self) -> String {
        self.as_ref().name()
    }
}
