//! Clauses that number the colors in the order in which a graph traversal discovers them.
//!
//! The `r` pinned colors `0..r` are treated as one block that is visited first, the block is
//! referred to by the index `r - 1`. Every other color `t` has a parent, which is the block or
//! a color below `t` with a transition into `t`.
use itertools::Itertools;

use super::{
    variables::VariableLayout,
    writer::{ClauseSink, Literal},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// The parent of `t` is the smallest color with a transition into `t`.
    BreadthFirst,
    /// The parent of `t` is the largest color below `t` with a transition into `t`.
    DepthFirst,
}

struct Witnesses {
    block: usize,
    /// `edge[j][t]`, some transition leads from `j` to `t`
    edge: Vec<Vec<Literal>>,
    /// `minimal[j][t][a]`, `a` is the smallest symbol on which `j` moves to `t`
    minimal: Vec<Vec<Vec<Literal>>>,
    /// `parent[t][j]`, `j` is the parent of `t`
    parent: Vec<Vec<Literal>>,
}

impl Witnesses {
    fn edge(&self, from: usize, to: usize) -> Literal {
        debug_assert!(from >= self.block && from < to);
        self.edge[from - self.block][to]
    }

    fn minimal(&self, from: usize, to: usize, symbol: usize) -> Literal {
        debug_assert!(from >= self.block && from < to);
        self.minimal[from - self.block][to][symbol]
    }

    fn parent(&self, child: usize, parent: usize) -> Literal {
        debug_assert!(parent >= self.block && parent < child);
        self.parent[child - self.block - 1][parent - self.block]
    }
}

/// The transition variables that witness a move from `from` to `to` on `symbol`, where the
/// block stands for all of its colors.
fn incoming(layout: &VariableLayout, reds: usize, from: usize, to: usize, symbol: usize) -> Vec<Literal> {
    if from == reds - 1 {
        (0..reds)
            .map(|red| layout.transition(red, to, symbol))
            .collect()
    } else {
        vec![layout.transition(from, to, symbol)]
    }
}

/// Adds the clauses that force colors `reds..` to be numbered in the discovery order of
/// `traversal`, where the first `reds` colors are already fixed.
pub fn break_symmetries<S: ClauseSink>(
    sink: &mut S,
    layout: &VariableLayout,
    reds: usize,
    traversal: Traversal,
) {
    let colors = layout.colors();
    let symbols = layout.symbols();
    if reds == 0 || reds >= colors {
        return;
    }
    let block = reds - 1;
    let mut witnesses = Witnesses {
        block,
        edge: vec![],
        minimal: vec![],
        parent: vec![],
    };

    for from in block..colors {
        let mut edges = vec![0; colors];
        let mut minimals = vec![vec![]; colors];
        for to in from + 1..colors {
            let by_symbol = (0..symbols)
                .map(|symbol| incoming(layout, reds, from, to, symbol))
                .collect_vec();

            let edge = sink.fresh();
            let any = by_symbol.iter().flatten().copied().collect_vec();
            sink.clause(&std::iter::once(-edge).chain(any.iter().copied()).collect_vec());
            for transition in &any {
                sink.clause(&[edge, -transition]);
            }
            edges[to] = edge;

            for symbol in 0..symbols {
                let minimal = sink.fresh();
                let smaller = by_symbol[..symbol].iter().flatten().copied().collect_vec();
                sink.clause(
                    &std::iter::once(-minimal)
                        .chain(by_symbol[symbol].iter().copied())
                        .collect_vec(),
                );
                for transition in &smaller {
                    sink.clause(&[-minimal, -transition]);
                }
                for transition in &by_symbol[symbol] {
                    sink.clause(
                        &[minimal, -transition]
                            .into_iter()
                            .chain(smaller.iter().copied())
                            .collect_vec(),
                    );
                }
                minimals[to].push(minimal);
            }
        }
        witnesses.edge.push(edges);
        witnesses.minimal.push(minimals);
    }

    for child in reds..colors {
        let mut parents = vec![];
        for parent in block..child {
            let excluded = match traversal {
                Traversal::BreadthFirst => block..parent,
                Traversal::DepthFirst => parent + 1..child,
            };
            let variable = sink.fresh();
            let edge = witnesses.edge(parent, child);
            sink.clause(&[-variable, edge]);
            let mut defining = vec![variable, -edge];
            for other in excluded {
                let other = witnesses.edge(other, child);
                sink.clause(&[-variable, -other]);
                defining.push(other);
            }
            sink.clause(&defining);
            parents.push(variable);
        }
        sink.clause(&parents);
        witnesses.parent.push(parents);
    }

    match traversal {
        Traversal::BreadthFirst => breadth_first(sink, layout, &witnesses),
        Traversal::DepthFirst => depth_first(sink, &witnesses, colors, symbols),
    }
}

/// Forbids `t` and `s` with a common parent where `s` is reached on a smaller symbol.
fn sibling_order<S: ClauseSink>(
    sink: &mut S,
    witnesses: &Witnesses,
    parent: usize,
    first: usize,
    second: usize,
    symbols: usize,
) {
    for symbol in 0..symbols {
        for smaller in 0..symbol {
            sink.clause(&[
                -witnesses.parent(first, parent),
                -witnesses.parent(second, parent),
                -witnesses.minimal(parent, first, symbol),
                -witnesses.minimal(parent, second, smaller),
            ]);
        }
    }
}

fn breadth_first<S: ClauseSink>(sink: &mut S, layout: &VariableLayout, witnesses: &Witnesses) {
    let colors = layout.colors();
    let symbols = layout.symbols();
    let block = witnesses.block;
    for child in block + 1..colors - 1 {
        let next = child + 1;
        for parent in block..child {
            for earlier in block..parent {
                sink.clause(&[
                    -witnesses.parent(child, parent),
                    -witnesses.parent(next, earlier),
                ]);
            }
            sibling_order(sink, witnesses, parent, child, next, symbols);
            if symbols == 2 && parent > block {
                let both = [
                    -witnesses.parent(child, parent),
                    -witnesses.parent(next, parent),
                ];
                sink.clause(&[both[0], both[1], layout.transition(parent, child, 0)]);
                sink.clause(&[both[0], both[1], layout.transition(parent, next, 1)]);
            }
        }
    }
}

fn depth_first<S: ClauseSink>(sink: &mut S, witnesses: &Witnesses, colors: usize, symbols: usize) {
    let block = witnesses.block;
    for child in block + 1..colors {
        for parent in block..child {
            // colors between the parent and the child are finished
            for finished in parent + 1..child {
                for later in child + 1..colors {
                    sink.clause(&[
                        -witnesses.parent(child, parent),
                        -witnesses.edge(finished, later),
                    ]);
                }
            }
            for sibling in child + 1..colors {
                sibling_order(sink, witnesses, parent, child, sibling, symbols);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::{break_symmetries, Traversal};
    use crate::encoding::{variables::VariableLayout, writer::tests::Clauses};

    /// Assignment of the transition variables of the automaton given by `delta[color][symbol]`.
    fn transitions(layout: &VariableLayout, delta: &[[usize; 2]]) -> Vec<bool> {
        let mut assignment = vec![false; layout.allocated() as usize];
        for (source, targets) in delta.iter().enumerate() {
            for (symbol, target) in targets.iter().enumerate() {
                assignment[layout.transition(source, *target, symbol) as usize - 1] = true;
            }
        }
        assignment
    }

    fn encode(traversal: Traversal) -> (VariableLayout, Clauses) {
        let layout = VariableLayout::new(&[], 3, 2, 0, &[]);
        let mut clauses = Clauses::with_variables(layout.allocated());
        break_symmetries(&mut clauses, &layout, 1, traversal);
        (layout, clauses)
    }

    #[test]
    fn numbering_follows_breadth_first_search() {
        let (layout, clauses) = encode(Traversal::BreadthFirst);
        // 0 -a-> 1, 0 -b-> 2 is the discovery order
        assert!(clauses.satisfiable_with(&transitions(&layout, &[[1, 2], [1, 1], [2, 2]])));
        // 2 is discovered on a, so it must be called 1
        assert!(!clauses.satisfiable_with(&transitions(&layout, &[[2, 1], [1, 1], [2, 2]])));
        // 2 is unreachable
        assert!(!clauses.satisfiable_with(&transitions(&layout, &[[1, 0], [1, 1], [2, 2]])));
        // a chain 0 -> 1 -> 2
        assert!(clauses.satisfiable_with(&transitions(&layout, &[[1, 0], [2, 1], [2, 2]])));
    }

    #[test]
    fn numbering_follows_depth_first_search() {
        let (layout, clauses) = encode(Traversal::DepthFirst);
        assert!(clauses.satisfiable_with(&transitions(&layout, &[[1, 2], [1, 1], [2, 2]])));
        assert!(clauses.satisfiable_with(&transitions(&layout, &[[1, 0], [2, 1], [2, 2]])));
        assert!(!clauses.satisfiable_with(&transitions(&layout, &[[2, 1], [1, 1], [2, 2]])));
    }

    #[test]
    fn every_automaton_has_a_canonical_numbering() {
        // all automata with three states over two symbols, each must keep at least one
        // numbering with state 0 fixed when every state is reachable
        for traversal in [Traversal::BreadthFirst, Traversal::DepthFirst] {
            let (layout, clauses) = encode(traversal);
            for targets in (0..6).map(|_| 0..3usize).multi_cartesian_product() {
                let delta = targets
                    .chunks(2)
                    .map(|pair| [pair[0], pair[1]])
                    .collect_vec();
                let reachable = reachable(&delta);
                let renamings = [[0, 1, 2], [0, 2, 1]];
                let satisfiable = renamings.iter().any(|renaming| {
                    let mut renamed = [[0; 2]; 3];
                    for (state, targets) in delta.iter().enumerate() {
                        for (symbol, target) in targets.iter().enumerate() {
                            renamed[renaming[state]][symbol] = renaming[*target];
                        }
                    }
                    clauses.satisfiable_with(&transitions(&layout, &renamed))
                });
                assert_eq!(satisfiable, reachable == 3, "{traversal:?} {delta:?}");
            }
        }
    }

    fn reachable(delta: &[[usize; 2]]) -> usize {
        let mut seen = vec![0];
        let mut index = 0;
        while index < seen.len() {
            for target in delta[seen[index]] {
                if !seen.contains(&target) {
                    seen.push(target);
                }
            }
            index += 1;
        }
        seen.len()
    }
}
