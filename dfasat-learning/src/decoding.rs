use dfasat_core::{
    alphabet::Symbol,
    apta::{Apta, NodeId, Status},
    automaton::Automaton,
};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{encoding::DimacsFileGenerator, solver::Model};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("the model assigns no color to vertex {node}")]
    MissingColor { node: NodeId },
    #[error("the model has no transition from state {state} on symbol {symbol}")]
    MissingTransition { state: usize, symbol: Symbol },
}

/// Reads the automaton described by a model of a formula written by a [`DimacsFileGenerator`].
///
/// Colors are renumbered such that the color of the root becomes state `0`. Sink states are
/// appended after the colors, but only those that some transition leads to.
pub struct AutomatonBuilder<'a> {
    model: &'a Model,
    generator: &'a DimacsFileGenerator<'a>,
    apta: &'a Apta,
    root_color: usize,
    automaton: Automaton,
    sink_states: Vec<Option<usize>>,
}

impl<'a> AutomatonBuilder<'a> {
    pub fn build(
        model: &'a Model,
        generator: &'a DimacsFileGenerator<'a>,
        apta: &'a Apta,
    ) -> Result<Automaton, DecodeError> {
        let layout = generator.layout();
        let mut colors = vec![None; apta.size()];
        for node in layout.colored() {
            let color = (0..layout.colors())
                .find(|color| model.is_true(layout.color(node, *color)))
                .ok_or(DecodeError::MissingColor { node })?;
            colors[node] = Some(color);
        }
        let root_color = colors[apta.root()].ok_or(DecodeError::MissingColor { node: apta.root() })?;
        trace!("root has color {root_color}");

        let mut builder = Self {
            model,
            generator,
            apta,
            root_color,
            automaton: Automaton::new(apta.alphabet().clone(), layout.colors()),
            sink_states: vec![None; generator.sinks().count()],
        };
        builder.statuses(&colors);
        builder.transitions(&colors)?;
        debug!(
            "decoded automaton with {} states, {} of them sinks",
            builder.automaton.size(),
            builder.automaton.sinks().len()
        );
        Ok(builder.automaton)
    }

    /// The state that represents `color`, colors `0` and that of the root trade places.
    fn state(&self, color: usize) -> usize {
        if color == self.root_color {
            0
        } else if color == 0 {
            self.root_color
        } else {
            color
        }
    }

    fn sink_state(&mut self, sink: usize) -> usize {
        match self.sink_states[sink] {
            Some(state) => state,
            None => {
                let state = self
                    .automaton
                    .add_sink(self.generator.sinks().status(sink));
                self.sink_states[sink] = Some(state);
                state
            }
        }
    }

    /// Labelled vertices decide the status of their color unless their label is marked as
    /// wrong, colors without such a vertex are accepting iff their `z` variable is true.
    fn statuses(&mut self, colors: &[Option<usize>]) {
        let layout = self.generator.layout();
        for (node, color) in colors.iter().enumerate() {
            let Some(color) = color else { continue };
            let status = self.apta.status(node);
            if status.is_common() {
                continue;
            }
            if let Some(error) = layout.error(node) {
                if self.model.is_true(error) {
                    trace!("label of vertex {node} is treated as wrong");
                    continue;
                }
            }
            self.automaton.set_status(self.state(*color), status);
        }
        for color in 0..layout.colors() {
            let state = self.state(color);
            if self.automaton.status(state).is_common() && self.model.is_true(layout.accepting(color))
            {
                self.automaton.set_status(state, Status::Accepting);
            }
        }
    }

    /// Edges of the APTA determine most transitions, the remaining ones are read from the
    /// transition variables.
    fn transitions(&mut self, colors: &[Option<usize>]) -> Result<(), DecodeError> {
        for (parent, symbol, child) in self.apta.edges() {
            let Some(source) = colors[parent] else { continue };
            let source = self.state(source);
            let target = match (colors[child], self.generator.sinks().sink_of(child)) {
                (Some(target), _) => self.state(target),
                (None, Some(sink)) => self.sink_state(sink),
                (None, None) => return Err(DecodeError::MissingColor { node: child }),
            };
            self.automaton.set_transition(source, symbol, target);
        }

        let layout = self.generator.layout();
        for color in 0..layout.colors() {
            let source = self.state(color);
            for symbol in self.apta.alphabet().universe() {
                if self.automaton.successor(source, symbol).is_some() {
                    continue;
                }
                let target = match (0..layout.colors())
                    .find(|target| self.model.is_true(layout.transition(color, *target, symbol)))
                {
                    Some(target) => self.state(target),
                    None => {
                        let sink = (0..layout.sinks())
                            .find(|sink| {
                                self.model
                                    .is_true(layout.sink_transition(color, *sink, symbol))
                            })
                            .ok_or(DecodeError::MissingTransition {
                                state: source,
                                symbol,
                            })?;
                        self.sink_state(sink)
                    }
                };
                self.automaton.set_transition(source, symbol, target);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use dfasat_core::{apta::Apta, sample::FiniteSample};

    use super::{AutomatonBuilder, DecodeError};
    use crate::{
        config::EncodingConfig,
        consistency::ConsistencyGraph,
        encoding::DimacsFileGenerator,
        solver::{EmbeddedSolver, Model, SatSolver, SolveOutcome},
    };

    #[test_log::test]
    fn decoded_automaton_is_consistent() {
        let sample = FiniteSample::try_from_str("3 2\n0 2 0 1\n1 1 0\n0 1 1\n").unwrap();
        let mut apta = Apta::from_sample(&sample).unwrap();
        let graph = ConsistencyGraph::build(&mut apta);
        let dir = tempfile::tempdir().unwrap();
        let config = EncodingConfig {
            loop_fix: true,
            ..Default::default()
        };
        let mut generator =
            DimacsFileGenerator::new(&apta, &graph, 2, &config, dir.path().join("formula.cnf"));
        generator.generate().unwrap();
        let SolveOutcome::Satisfiable(model) = EmbeddedSolver.solve(generator.path(), None).unwrap()
        else {
            panic!("two states suffice for the sample")
        };
        let automaton = AutomatonBuilder::build(&model, &generator, &apta).unwrap();
        assert_eq!(automaton.size(), 2);
        assert!(automaton.is_complete());
        assert!(automaton.is_consistent_with(&sample));
    }

    #[test]
    fn unassigned_vertices_are_reported() {
        let sample = FiniteSample::try_from_str("1 1\n1 1 0\n").unwrap();
        let apta = Apta::from_sample(&sample).unwrap();
        let graph = ConsistencyGraph::empty(apta.size());
        let generator =
            DimacsFileGenerator::new(&apta, &graph, 1, &EncodingConfig::default(), "unused.cnf");
        assert_eq!(
            AutomatonBuilder::build(&Model::default(), &generator, &apta),
            Err(DecodeError::MissingColor { node: 0 })
        );
    }
}
