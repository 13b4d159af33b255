use std::fmt::Display;

use itertools::Itertools;

use crate::math::Bijection;

/// Symbols are dense indices into the [`Alphabet`] they belong to.
pub type Symbol = usize;

/// A finite alphabet whose symbols are named by the tokens that appear in a sample file.
///
/// Symbols are numbered `0..size` and the numbering follows the natural order of the names:
/// if every name is an integer, the names are ordered numerically, otherwise they are ordered
/// lexicographically. This order is the one in which transitions are enumerated everywhere,
/// in particular it determines which symbol counts as the "smallest" one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    names: Bijection<Symbol, String>,
}

impl Alphabet {
    /// Builds an alphabet from the given symbol names, duplicates are ignored.
    pub fn from_names<S: Into<String>, I: IntoIterator<Item = S>>(names: I) -> Self {
        let mut names = names.into_iter().map(Into::into).unique().collect_vec();
        if names.iter().all(|name| name.parse::<i64>().is_ok()) {
            names.sort_by_key(|name| name.parse::<i64>().expect("checked above"));
        } else {
            names.sort();
        }
        Self {
            names: names.into_iter().enumerate().collect(),
        }
    }

    /// Creates an alphabet with symbols named `0`, `1`, ..., `size - 1`.
    pub fn numeric(size: usize) -> Self {
        Self::from_names((0..size).map(|i| i.to_string()))
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Looks up the symbol with the given name.
    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.names.get_by_right(name).copied()
    }

    /// Gives the name of `symbol`, if it belongs to the alphabet.
    pub fn name(&self, symbol: Symbol) -> Option<&str> {
        self.names.get_by_left(&symbol).map(|name| name.as_str())
    }

    /// Iterates over all symbols in ascending order.
    pub fn universe(&self) -> impl Iterator<Item = Symbol> + '_ {
        0..self.size()
    }

    /// Iterates over all symbol names in the order of their symbols.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.right_values().map(|name| name.as_str())
    }

    /// Renders a word over this alphabet as its space-separated symbol names.
    pub fn show_word(&self, word: &[Symbol]) -> String {
        word.iter()
            .map(|sym| self.name(*sym).unwrap_or("?"))
            .join(" ")
    }
}

impl Display for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.names().join(", "))
    }
}
