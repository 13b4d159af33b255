use std::{
    fs::File,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use dfasat_core::apta::{Apta, NodeId, Status};
use itertools::Itertools;
use owo_colors::OwoColorize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::{EncodingConfig, SymmetryBreaking},
    consistency::ConsistencyGraph,
    solver::Model,
};

mod amo;
mod noise;
mod sinks;
mod symmetry;
mod variables;
mod writer;

pub use amo::{at_least_one, at_most_one, exactly_one};
pub use noise::tolerated_errors;
pub use sinks::Sinks;
pub use variables::VariableLayout;
pub use writer::{ClauseSink, Literal};

use symmetry::Traversal;
use writer::ClauseWriter;

#[derive(Debug, Error)]
pub enum EncodingError {
    /// The formula is trivially unsatisfiable, so no automaton with this many states exists.
    #[error("no automaton with {colors} states exists")]
    Contradiction { colors: usize },
    #[error("could not write CNF file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CNF file {} is malformed: {reason}", .path.display())]
    MalformedDimacs { path: PathBuf, reason: String },
}

/// Writes a CNF formula in DIMACS format whose models are exactly the automata with a fixed
/// number of states that are consistent with an [`Apta`].
///
/// The states are called colors, every vertex of the APTA is assigned a color and edges of
/// the APTA become transitions between colors. The [`VariableLayout`] describes how a model
/// is translated back, see [`AutomatonBuilder`](crate::decoding::AutomatonBuilder).
pub struct DimacsFileGenerator<'a> {
    apta: &'a Apta,
    graph: &'a ConsistencyGraph,
    colors: usize,
    config: EncodingConfig,
    path: PathBuf,
    sinks: Sinks,
    layout: VariableLayout,
    ends: Vec<NodeId>,
    variables: Literal,
    clauses: usize,
}

impl<'a> DimacsFileGenerator<'a> {
    pub fn new<P: Into<PathBuf>>(
        apta: &'a Apta,
        graph: &'a ConsistencyGraph,
        colors: usize,
        config: &EncodingConfig,
        path: P,
    ) -> Self {
        let sinks = if config.is_noisy() {
            Sinks::none(apta.size())
        } else {
            Sinks::detect(apta, config.sinks)
        };
        let colored = apta
            .node_indices()
            .map(|node| !sinks.is_sunk(node))
            .collect_vec();
        let ends = if config.is_noisy() {
            apta.accepting()
                .union(apta.rejecting())
                .copied()
                .filter(|node| colored[*node])
                .collect_vec()
        } else {
            vec![]
        };
        let layout = VariableLayout::new(
            &colored,
            colors,
            apta.alphabet().size(),
            sinks.count(),
            &ends,
        );
        Self {
            apta,
            graph,
            colors,
            config: config.clone(),
            path: path.into(),
            sinks,
            layout,
            ends,
            variables: 0,
            clauses: 0,
        }
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    pub fn sinks(&self) -> &Sinks {
        &self.sinks
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn colors(&self) -> usize {
        self.colors
    }

    /// Number of variables of the last formula written.
    pub fn variables(&self) -> Literal {
        self.variables
    }

    /// Number of clauses currently in the file.
    pub fn clauses(&self) -> usize {
        self.clauses
    }

    fn io_error(&self, source: std::io::Error) -> EncodingError {
        EncodingError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// The vertices whose color is fixed upfront, vertex `pinned[c]` gets color `c`.
    fn pinned_vertices(&self) -> Vec<NodeId> {
        match self.config.symmetry_breaking {
            SymmetryBreaking::Clique => self
                .graph
                .clique()
                .members()
                .filter(|node| self.layout.is_colored(*node))
                .collect(),
            SymmetryBreaking::Dfs => self.apta.red_dfs_order(),
            SymmetryBreaking::None | SymmetryBreaking::Bfs => self.apta.red_bfs_order(),
        }
    }

    /// Writes the formula to the file at [`DimacsFileGenerator::path`]. If the formula is
    /// trivially unsatisfiable, [`EncodingError::Contradiction`] is returned.
    pub fn generate(&mut self) -> Result<(), EncodingError> {
        let pinned = self.pinned_vertices();
        if pinned.len() > self.colors {
            debug!(
                "{} vertices must have distinct colors, but there are only {}",
                pinned.len(),
                self.colors
            );
            return Err(EncodingError::Contradiction {
                colors: self.colors,
            });
        }
        let mut pin = vec![None; self.apta.size()];
        for (color, node) in pinned.iter().enumerate() {
            pin[*node] = Some(color);
        }

        let body = tempfile::tempfile().map_err(|e| self.io_error(e))?;
        let mut writer = ClauseWriter::new(BufWriter::new(body), self.layout.allocated());
        let mut counted = 0;
        let mut family = |name: &str, writer: &ClauseWriter<_>| {
            debug!("{name}: {} clauses", writer.clauses() - counted);
            counted = writer.clauses();
        };

        self.pin_colors(&mut writer, &pinned);
        family("pinned colors", &writer);
        self.coloring(&mut writer);
        family("coloring", &writer);
        self.transitions(&mut writer, &pin);
        family("transitions", &writer);
        self.separation(&mut writer, &pin);
        family("status separation", &writer);
        self.conflicts(&mut writer, &pin);
        family("conflicts", &writer);
        if self.config.loop_fix {
            self.loop_fix(&mut writer);
            family("loop fix", &writer);
        }
        match self.config.symmetry_breaking {
            SymmetryBreaking::Bfs => {
                symmetry::break_symmetries(
                    &mut writer,
                    &self.layout,
                    pinned.len(),
                    Traversal::BreadthFirst,
                );
                family("breadth-first symmetry breaking", &writer);
            }
            SymmetryBreaking::Dfs => {
                symmetry::break_symmetries(
                    &mut writer,
                    &self.layout,
                    pinned.len(),
                    Traversal::DepthFirst,
                );
                family("depth-first symmetry breaking", &writer);
            }
            SymmetryBreaking::None | SymmetryBreaking::Clique => {}
        }
        if self.config.is_noisy() {
            let errors = noise::tolerated_errors(self.ends.len(), self.config.noise_percent);
            debug!("tolerating {errors} of {} labels", self.ends.len());
            noise::limit_errors(&mut writer, &self.layout, &self.ends, errors);
            family("noise", &writer);
        }

        let written = writer.finish().map_err(|e| self.io_error(e))?;
        let mut body = written
            .out
            .into_inner()
            .map_err(|e| self.io_error(e.into_error()))?;
        self.write_file(&mut body, written.variables, written.clauses)
            .map_err(|e| self.io_error(e))?;
        self.variables = written.variables;
        self.clauses = written.clauses;
        info!(
            "encoded {} colors with {} variables and {} clauses",
            self.colors.bold(),
            self.variables,
            self.clauses
        );

        if written.empty_clause {
            return Err(EncodingError::Contradiction {
                colors: self.colors,
            });
        }
        Ok(())
    }

    fn write_file(&self, body: &mut File, variables: Literal, clauses: usize) -> std::io::Result<()> {
        body.seek(SeekFrom::Start(0))?;
        let mut out = BufWriter::new(File::create(&self.path)?);
        writeln!(out, "p cnf {variables} {clauses}")?;
        std::io::copy(body, &mut out)?;
        out.flush()
    }

    /// Colors a vertex may have in a model.
    fn candidates(&self, pin: &[Option<usize>], node: NodeId) -> std::ops::Range<usize> {
        match pin[node] {
            Some(color) => color..color + 1,
            None => 0..self.colors,
        }
    }

    fn pin_colors<S: ClauseSink>(&self, sink: &mut S, pinned: &[NodeId]) {
        for (color, node) in pinned.iter().enumerate() {
            for other in 0..self.colors {
                let literal = self.layout.color(*node, other);
                sink.unit(if other == color { literal } else { -literal });
            }
            if self.config.is_noisy() {
                continue;
            }
            match self.apta.status(*node) {
                Status::Accepting => sink.unit(self.layout.accepting(color)),
                Status::Rejecting => sink.unit(-self.layout.accepting(color)),
                Status::Common => {}
            }
        }
    }

    fn coloring<S: ClauseSink>(&self, sink: &mut S) {
        for node in self.layout.colored() {
            exactly_one(sink, self.config.at_most_one, &self.layout.colors_of(node));
        }
    }

    /// Links the colors of the endpoints of every edge to the transition variables, and
    /// requires exactly one target per color and symbol.
    fn transitions<S: ClauseSink>(&self, sink: &mut S, pin: &[Option<usize>]) {
        for (parent, symbol, child) in self.apta.edges() {
            if !self.layout.is_colored(parent) {
                continue;
            }
            if let Some(target) = self.sinks.sink_of(child) {
                for source in self.candidates(pin, parent) {
                    sink.clause(&[
                        -self.layout.color(parent, source),
                        self.layout.sink_transition(source, target, symbol),
                    ]);
                }
                continue;
            }
            for source in self.candidates(pin, parent) {
                let parent_color = self.layout.color(parent, source);
                for target in self.candidates(pin, child) {
                    let transition = self.layout.transition(source, target, symbol);
                    let child_color = self.layout.color(child, target);
                    sink.clause(&[transition, -parent_color, -child_color]);
                    sink.clause(&[-transition, -parent_color, child_color]);
                }
            }
        }

        for source in 0..self.colors {
            for symbol in self.apta.alphabet().universe() {
                exactly_one(
                    sink,
                    self.config.at_most_one,
                    &self.layout.targets(source, symbol),
                );
            }
        }
    }

    /// Accepting and rejecting vertices may not share a color, unless the label of one of
    /// them is marked as wrong.
    fn separation<S: ClauseSink>(&self, sink: &mut S, pin: &[Option<usize>]) {
        for node in self.layout.colored() {
            let sign = match self.apta.status(node) {
                Status::Accepting => 1,
                Status::Rejecting => -1,
                Status::Common => continue,
            };
            let error = self.layout.error(node);
            for color in self.candidates(pin, node) {
                let clause = error
                    .into_iter()
                    .chain([
                        -self.layout.color(node, color),
                        sign * self.layout.accepting(color),
                    ])
                    .collect_vec();
                sink.clause(&clause);
            }
        }
    }

    /// Vertices that are adjacent in the consistency graph get different colors.
    fn conflicts<S: ClauseSink>(&self, sink: &mut S, pin: &[Option<usize>]) {
        if self.config.is_noisy() {
            return;
        }
        for (first, second) in self.graph.edges() {
            if !self.layout.is_colored(first) || !self.layout.is_colored(second) {
                continue;
            }
            if self
                .apta
                .status(first)
                .conflicts_with(self.apta.status(second))
            {
                continue;
            }
            match (pin[first], pin[second]) {
                (Some(_), Some(_)) => {}
                (Some(color), None) => sink.unit(-self.layout.color(second, color)),
                (None, Some(color)) => sink.unit(-self.layout.color(first, color)),
                (None, None) => {
                    for color in 0..self.colors {
                        sink.clause(&[
                            -self.layout.color(first, color),
                            -self.layout.color(second, color),
                        ]);
                    }
                }
            }
        }
    }

    /// A color without any vertex that has an outgoing edge on a symbol loops on that symbol.
    fn loop_fix<S: ClauseSink>(&self, sink: &mut S) {
        for symbol in self.apta.alphabet().universe() {
            let owners = self
                .apta
                .with_child(symbol)
                .iter()
                .copied()
                .filter(|node| self.layout.is_colored(*node))
                .collect_vec();
            for color in 0..self.colors {
                let used = sink.fresh();
                let colors = owners
                    .iter()
                    .map(|node| self.layout.color(*node, color))
                    .collect_vec();
                sink.clause(&std::iter::once(-used).chain(colors.iter().copied()).collect_vec());
                for literal in colors {
                    sink.clause(&[used, -literal]);
                }
                sink.clause(&[used, self.layout.transition(color, color, symbol)]);
            }
        }
    }

    /// Appends a clause to the file that excludes the transitions of `model`, so that the next
    /// model describes a different automaton.
    pub fn ban_solution(&mut self, model: &Model) -> Result<(), EncodingError> {
        let malformed = |reason: &str| EncodingError::MalformedDimacs {
            path: self.path.clone(),
            reason: reason.to_string(),
        };
        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let (header, body) = contents.split_once('\n').unwrap_or((contents.as_str(), ""));
        let (variables, clauses) = match header.split_whitespace().collect_vec()[..] {
            ["p", "cnf", variables, clauses] => (
                variables
                    .parse::<Literal>()
                    .map_err(|_| malformed("variable count is not a number"))?,
                clauses
                    .parse::<usize>()
                    .map_err(|_| malformed("clause count is not a number"))?,
            ),
            _ => return Err(malformed("missing `p cnf` header")),
        };

        let ban = self
            .layout
            .transitions()
            .filter(|variable| model.is_true(*variable))
            .map(|variable| -variable)
            .chain(std::iter::once(0))
            .join(" ");

        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(directory).map_err(|e| self.io_error(e))?;
        let write = |out: &mut File| -> std::io::Result<()> {
            let mut out = BufWriter::new(out);
            writeln!(out, "p cnf {variables} {}", clauses + 1)?;
            out.write_all(body.as_bytes())?;
            if !body.is_empty() && !body.ends_with('\n') {
                writeln!(out)?;
            }
            writeln!(out, "{ban}")?;
            out.flush()
        };
        write(file.as_file_mut()).map_err(|e| self.io_error(e))?;
        file.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;

        self.clauses = clauses + 1;
        debug!("banned solution, the formula has {} clauses", self.clauses);
        Ok(())
    }
}
