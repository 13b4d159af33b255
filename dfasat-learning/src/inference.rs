use std::time::{Duration, Instant};

use dfasat_core::{
    apta::{Apta, AptaError},
    automaton::Automaton,
    sample::FiniteSample,
};
use owo_colors::OwoColorize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::{ConfigError, InductionConfig},
    consistency::ConsistencyGraph,
    decoding::{AutomatonBuilder, DecodeError},
    edsm::{EdsmWorker, ReductionSummary},
    encoding::{DimacsFileGenerator, EncodingError, Sinks},
    solver::{SatSolver, SolveOutcome, SolverError},
};

#[derive(Debug, Error)]
pub enum InductionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Apta(#[from] AptaError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("the solver ran out of time while looking for an automaton with {colors} states")]
    SolverTimeout { colors: usize },
    #[error("no consistent automaton with at most {max_size} states exists")]
    NoAutomaton { max_size: usize },
}

/// The result of a successful identification.
#[derive(Debug, Clone)]
pub struct Induction {
    automata: Vec<Automaton>,
    colors: usize,
    lower_bound: usize,
    apta_size: usize,
    reduction: Option<ReductionSummary>,
}

impl Induction {
    /// The automata with the smallest number of states that were found, at least one.
    pub fn automata(&self) -> &[Automaton] {
        &self.automata
    }

    pub fn into_automata(self) -> Vec<Automaton> {
        self.automata
    }

    /// Number of states of the automata, not counting sink states.
    pub fn colors(&self) -> usize {
        self.colors
    }

    /// The size from which the search started.
    pub fn lower_bound(&self) -> usize {
        self.lower_bound
    }

    /// Number of APTA vertices that were encoded.
    pub fn apta_size(&self) -> usize {
        self.apta_size
    }

    pub fn reduction(&self) -> Option<&ReductionSummary> {
        self.reduction.as_ref()
    }
}

/// Finds the smallest automata consistent with a sample by encoding the question "is there
/// one with `n` states" for increasing `n` and handing it to a [`SatSolver`].
pub struct Inductor<S: SatSolver> {
    config: InductionConfig,
    solver: S,
}

impl<S: SatSolver> Inductor<S> {
    pub fn new(config: InductionConfig, solver: S) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &InductionConfig {
        &self.config
    }

    /// What is left of the time budget, fails once it is used up.
    fn remaining(&self, start: Instant, colors: usize) -> Result<Option<Duration>, InductionError> {
        match self.config.timeout {
            None => Ok(None),
            Some(timeout) => match timeout.checked_sub(start.elapsed()) {
                Some(left) if !left.is_zero() => Ok(Some(left)),
                _ => Err(InductionError::SolverTimeout { colors }),
            },
        }
    }

    pub fn infer(&self, sample: &FiniteSample) -> Result<Induction, InductionError> {
        self.config.validate()?;
        let start = Instant::now();
        let noisy = self.config.encoding.is_noisy();

        let mut apta = Apta::from_sample(sample)?;
        let reduction = self
            .config
            .reduction
            .clone()
            .map(|config| EdsmWorker::new(config).run(&mut apta));

        let graph = if noisy {
            ConsistencyGraph::empty(apta.size())
        } else {
            let mut graph = ConsistencyGraph::build(&mut apta);
            let sunk = Sinks::detect(&apta, self.config.encoding.sinks).sunk();
            graph.find_clique_excluding(&apta, &sunk);
            graph
        };

        let lower_bound = self
            .config
            .min_size
            .max(graph.clique_size())
            .max(1);
        for colors in lower_bound..=self.config.max_size {
            info!("looking for an automaton with {} states", colors.bold());
            let mut generator = DimacsFileGenerator::new(
                &apta,
                &graph,
                colors,
                &self.config.encoding,
                &self.config.dimacs_path,
            );
            match generator.generate() {
                Ok(()) => {}
                Err(EncodingError::Contradiction { .. }) => {
                    info!("there is no automaton with {colors} states");
                    continue;
                }
                Err(error) => return Err(error.into()),
            }

            let automata = self.enumerate(&mut generator, &apta, start)?;
            if automata.is_empty() {
                info!("there is no automaton with {colors} states");
                continue;
            }
            info!(
                "found {} automata with {} states in {:?}",
                automata.len(),
                colors.green(),
                start.elapsed()
            );
            return Ok(Induction {
                automata,
                colors,
                lower_bound,
                apta_size: apta.size(),
                reduction,
            });
        }
        Err(InductionError::NoAutomaton {
            max_size: self.config.max_size,
        })
    }

    /// Solves the formula of `generator` repeatedly, banning each model found, until the
    /// requested number of automata is reached or no further model exists.
    fn enumerate(
        &self,
        generator: &mut DimacsFileGenerator<'_>,
        apta: &Apta,
        start: Instant,
    ) -> Result<Vec<Automaton>, InductionError> {
        let colors = generator.colors();
        let limit = self.config.solutions.limit();
        let mut automata = vec![];
        loop {
            let timeout = match self.remaining(start, colors) {
                Ok(timeout) => timeout,
                Err(_) if !automata.is_empty() => {
                    warn!("time is up, keeping {} automata", automata.len());
                    break;
                }
                Err(error) => return Err(error),
            };
            match self.solver.solve(generator.path(), timeout)? {
                SolveOutcome::Satisfiable(model) => {
                    let automaton = AutomatonBuilder::build(&model, generator, apta)?;
                    debug!("solution {} has {} states", automata.len() + 1, automaton.size());
                    automata.push(automaton);
                    if limit.map_or(false, |limit| automata.len() >= limit) {
                        break;
                    }
                    generator.ban_solution(&model)?;
                }
                SolveOutcome::Unsatisfiable => break,
                SolveOutcome::TimedOut if automata.is_empty() => {
                    return Err(InductionError::SolverTimeout { colors })
                }
                SolveOutcome::TimedOut => {
                    warn!(
                        "{} timed out, keeping {} automata",
                        self.solver.name(),
                        automata.len()
                    );
                    break;
                }
            }
        }
        Ok(automata)
    }
}
