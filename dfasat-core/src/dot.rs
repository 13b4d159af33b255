use std::{fmt::Display, io::Write, path::Path};

use itertools::Itertools;
use tracing::trace;

/// Types that can be displayed as a graph in the DOT language.
pub trait Dottable {
    /// Compute the graphviz representation, for more information on the DOT format,
    /// see the [graphviz documentation](https://graphviz.org/doc/info/lang.html).
    ///
    /// States without attributes are not listed explicitly, they appear through the
    /// transitions that touch them.
    fn dot_representation(&self) -> String {
        let header = std::iter::once(format!("digraph {} {{", self.dot_name()))
            .chain(self.dot_header_statements());

        let states = self
            .dot_states()
            .into_iter()
            .filter(|(_, attributes)| !attributes.is_empty())
            .map(|(state, attributes)| {
                format!(
                    "{} [{}];",
                    state,
                    attributes.into_iter().map(|attr| attr.to_string()).join(", ")
                )
            });

        let transitions =
            self.dot_transitions()
                .into_iter()
                .map(|(source, target, attributes)| {
                    format!(
                        "{} -> {} [{}];",
                        source,
                        target,
                        attributes.into_iter().map(|attr| attr.to_string()).join(", ")
                    )
                });

        header
            .chain(states)
            .chain(transitions)
            .chain(std::iter::once("}".to_string()))
            .join("\n")
    }

    fn dot_name(&self) -> String;

    fn dot_header_statements(&self) -> Vec<String> {
        vec![format!(
            "node [{}];",
            DotStateAttribute::Shape("circle".to_string())
        )]
    }

    /// Lists every state together with its attributes.
    fn dot_states(&self) -> Vec<(String, Vec<DotStateAttribute>)>;

    /// Lists every transition as `(source, target, attributes)`.
    fn dot_transitions(&self) -> Vec<(String, String, Vec<DotTransitionAttribute>)>;

    /// Writes the DOT representation to the file at `path`, replacing its contents.
    fn write_dot<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let dot = self.dot_representation();
        trace!("writing dot representation\n{}", dot);
        let mut file = std::fs::File::create(path)?;
        file.write_all(dot.as_bytes())?;
        file.write_all(b"\n")
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DotStateAttribute {
    /// The label of a node
    Label(String),
    /// The shape of a node
    Shape(String),
    /// The color of a node
    Color(String),
    /// The line style of a node
    Style(String),
    /// Number of outlines drawn around a node
    Peripheries(usize),
}

impl Display for DotStateAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DotStateAttribute::Label(s) => write!(f, "label=\"{s}\""),
            DotStateAttribute::Shape(s) => write!(f, "shape=\"{s}\""),
            DotStateAttribute::Color(c) => write!(f, "color=\"{c}\""),
            DotStateAttribute::Style(s) => write!(f, "style=\"{s}\""),
            DotStateAttribute::Peripheries(n) => write!(f, "peripheries={n}"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DotTransitionAttribute {
    Label(String),
}

impl Display for DotTransitionAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DotTransitionAttribute::Label(lbl) => write!(f, "label=\"{lbl}\""),
        }
    }
}
