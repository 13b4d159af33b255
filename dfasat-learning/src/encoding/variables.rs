use dfasat_core::apta::NodeId;

use super::writer::Literal;

/// Where the variables that describe an automaton live.
///
/// The layout is allocated once per encoding, before any clause is written:
/// * `x[v][i]`, vertex `v` has color `i`, for every vertex that is not collapsed into a sink
/// * `z[i]`, color `i` is accepting
/// * `y[i][j][a]`, color `i` moves to color `j` on symbol `a`
/// * `y_sink[i][s][a]`, color `i` moves to sink `s` on symbol `a`
/// * `f[v]`, the label of vertex `v` is wrong, only in noise tolerant encodings
///
/// Auxiliary variables are allocated afterwards by the clause families that need them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableLayout {
    colors: usize,
    symbols: usize,
    sinks: usize,
    color: Vec<Option<Literal>>,
    accepting: Literal,
    transition: Literal,
    sink_transition: Literal,
    error: Vec<Option<Literal>>,
    allocated: Literal,
}

impl VariableLayout {
    /// Allocates the variables for the vertices with `colored[v] == true` and error variables
    /// for the vertices in `noisy`.
    pub fn new(
        colored: &[bool],
        colors: usize,
        symbols: usize,
        sinks: usize,
        noisy: &[NodeId],
    ) -> Self {
        let mut next: Literal = 1;
        let mut block = |len: usize| {
            let start = next;
            next += len as Literal;
            start
        };

        let color = colored
            .iter()
            .map(|colored| colored.then(|| block(colors)))
            .collect();
        let accepting = block(colors);
        let transition = block(colors * colors * symbols);
        let sink_transition = block(colors * sinks * symbols);
        let mut error = vec![None; colored.len()];
        for node in noisy {
            error[*node] = Some(block(1));
        }

        Self {
            colors,
            symbols,
            sinks,
            color,
            accepting,
            transition,
            sink_transition,
            error,
            allocated: next - 1,
        }
    }

    pub fn colors(&self) -> usize {
        self.colors
    }

    pub fn symbols(&self) -> usize {
        self.symbols
    }

    pub fn sinks(&self) -> usize {
        self.sinks
    }

    /// Number of variables in the layout, auxiliary ones start after it.
    pub fn allocated(&self) -> Literal {
        self.allocated
    }

    pub fn is_colored(&self, node: NodeId) -> bool {
        self.color[node].is_some()
    }

    pub fn colored(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.color
            .iter()
            .enumerate()
            .filter_map(|(node, base)| base.map(|_| node))
    }

    /// The variable `x[node][color]`, panics if `node` has no color variables.
    pub fn color(&self, node: NodeId, color: usize) -> Literal {
        debug_assert!(color < self.colors);
        let base = self.color[node].expect("vertex is collapsed into a sink and has no color");
        base + color as Literal
    }

    /// All variables `x[node][_]`.
    pub fn colors_of(&self, node: NodeId) -> Vec<Literal> {
        (0..self.colors).map(|c| self.color(node, c)).collect()
    }

    pub fn accepting(&self, color: usize) -> Literal {
        debug_assert!(color < self.colors);
        self.accepting + color as Literal
    }

    pub fn transition(&self, source: usize, target: usize, symbol: usize) -> Literal {
        debug_assert!(source < self.colors && target < self.colors && symbol < self.symbols);
        self.transition + ((source * self.colors + target) * self.symbols + symbol) as Literal
    }

    pub fn sink_transition(&self, source: usize, sink: usize, symbol: usize) -> Literal {
        debug_assert!(source < self.colors && sink < self.sinks && symbol < self.symbols);
        self.sink_transition + ((source * self.sinks + sink) * self.symbols + symbol) as Literal
    }

    /// Every possible target of `source` on `symbol`, colors first and then sinks.
    pub fn targets(&self, source: usize, symbol: usize) -> Vec<Literal> {
        (0..self.colors)
            .map(|target| self.transition(source, target, symbol))
            .chain((0..self.sinks).map(|sink| self.sink_transition(source, sink, symbol)))
            .collect()
    }

    /// All transition variables, including those into sinks.
    pub fn transitions(&self) -> std::ops::Range<Literal> {
        self.transition
            ..self.sink_transition + (self.colors * self.sinks * self.symbols) as Literal
    }

    pub fn error(&self, node: NodeId) -> Option<Literal> {
        self.error[node]
    }
}

#[cfg(test)]
mod tests {
    use super::VariableLayout;

    #[test]
    fn blocks_are_disjoint() {
        let layout = VariableLayout::new(&[true, false, true], 2, 2, 1, &[2]);
        assert_eq!(layout.colored().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(layout.colors_of(0), vec![1, 2]);
        assert_eq!(layout.colors_of(2), vec![3, 4]);
        assert_eq!(layout.accepting(0), 5);
        assert_eq!(layout.transition(0, 0, 0), 7);
        assert_eq!(layout.transition(1, 1, 1), 14);
        assert_eq!(layout.sink_transition(0, 0, 0), 15);
        assert_eq!(layout.sink_transition(1, 0, 1), 18);
        assert_eq!(layout.transitions(), 7..19);
        assert_eq!(layout.targets(1, 0), vec![11, 13, 17]);
        assert_eq!(layout.error(2), Some(19));
        assert_eq!(layout.error(0), None);
        assert_eq!(layout.allocated(), 19);
        assert!(!layout.is_colored(1));
    }
}
