use std::io::Write;

use itertools::Itertools;

/// A DIMACS literal, the variable index with a sign.
pub type Literal = i32;

/// Receives clauses and hands out fresh variables.
pub trait ClauseSink {
    /// Allocates a variable that has not been used before.
    fn fresh(&mut self) -> Literal;

    /// Adds the disjunction of `literals`.
    fn clause(&mut self, literals: &[Literal]);

    fn unit(&mut self, literal: Literal) {
        self.clause(&[literal])
    }
}

/// Streams clauses in DIMACS syntax to `out` while counting them. Writing does not fail
/// immediately, the first error is kept and reported by [`ClauseWriter::finish`].
pub(crate) struct ClauseWriter<W: Write> {
    out: W,
    variables: Literal,
    clauses: usize,
    empty_clause: bool,
    error: Option<std::io::Error>,
}

/// What [`ClauseWriter::finish`] reports.
pub(crate) struct Written<W> {
    pub out: W,
    pub variables: Literal,
    pub clauses: usize,
    pub empty_clause: bool,
}

impl<W: Write> ClauseWriter<W> {
    /// Creates a writer whose first fresh variable is `variables + 1`.
    pub fn new(out: W, variables: Literal) -> Self {
        Self {
            out,
            variables,
            clauses: 0,
            empty_clause: false,
            error: None,
        }
    }

    pub fn clauses(&self) -> usize {
        self.clauses
    }

    pub fn finish(self) -> Result<Written<W>, std::io::Error> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(Written {
                out: self.out,
                variables: self.variables,
                clauses: self.clauses,
                empty_clause: self.empty_clause,
            }),
        }
    }
}

impl<W: Write> ClauseSink for ClauseWriter<W> {
    fn fresh(&mut self) -> Literal {
        self.variables += 1;
        self.variables
    }

    fn clause(&mut self, literals: &[Literal]) {
        if self.error.is_some() {
            return;
        }
        debug_assert!(literals
            .iter()
            .all(|lit| *lit != 0 && lit.abs() <= self.variables));
        self.empty_clause |= literals.is_empty();
        self.clauses += 1;
        let line = literals.iter().chain(std::iter::once(&0)).join(" ");
        if let Err(error) = writeln!(self.out, "{line}") {
            self.error = Some(error);
        }
    }
}
