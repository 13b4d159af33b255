use std::collections::VecDeque;

use owo_colors::OwoColorize;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::{
    alphabet::{Alphabet, Symbol},
    dot::{DotStateAttribute, DotTransitionAttribute, Dottable},
    math::OrderedSet,
    sample::FiniteSample,
};

mod node;
pub use node::{NodeId, PathStatistics, PrefixNode, Status};

/// Raised when a sample classifies the same word as accepted and as rejected.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum AptaError {
    #[error("sample is contradictory, `{word}` is classified as accepted and as rejected")]
    Contradiction { word: String },
}

/// The augmented prefix tree acceptor of a sample.
///
/// Nodes live in an arena and are addressed by dense indices `0..size`, the root always has
/// index `0`. The nodes are partitioned into *red* nodes, which are known to be distinct
/// states of any automaton consistent with the sample, *blue* nodes, which are the children
/// of red nodes that are not red themselves, and the remaining nodes.
///
/// Merging is performed in two stages. A provisional merge folds nodes into each other
/// through the primitives [`Apta::set_status`], [`Apta::absorb`], [`Apta::adopt`] and
/// [`Apta::represent`], each of which has an exact inverse. Folded nodes stay in the arena
/// and are resolved with [`Apta::find`]. Once a merge should become permanent,
/// [`Apta::commit_merges`] removes all folded nodes and renumbers the remaining ones so the
/// index space stays dense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apta {
    alphabet: Alphabet,
    nodes: Vec<PrefixNode>,
    red: OrderedSet<NodeId>,
    blue: OrderedSet<NodeId>,
    accepting: OrderedSet<NodeId>,
    rejecting: OrderedSet<NodeId>,
    with_child: Vec<OrderedSet<NodeId>>,
}

impl Apta {
    /// Index of the root node.
    pub const ROOT: NodeId = 0;

    fn empty(alphabet: Alphabet) -> Self {
        let size = alphabet.size();
        Self {
            nodes: vec![PrefixNode::new(size)],
            red: OrderedSet::from([Self::ROOT]),
            blue: OrderedSet::new(),
            accepting: OrderedSet::new(),
            rejecting: OrderedSet::new(),
            with_child: vec![OrderedSet::new(); size],
            alphabet,
        }
    }

    /// Builds the prefix tree of all words in `sample`. Only the root is red initially.
    pub fn from_sample(sample: &FiniteSample) -> Result<Self, AptaError> {
        let mut apta = Self::empty(sample.alphabet().clone());
        let size = apta.alphabet.size();

        for (word, accepted) in sample.words() {
            let mut current = Self::ROOT;
            for &symbol in word {
                let statistics = &mut apta.nodes[current].statistics;
                if accepted {
                    statistics.accepting_paths[symbol] += 1;
                } else {
                    statistics.rejecting_paths[symbol] += 1;
                }
                current = match apta.nodes[current].child(symbol) {
                    Some(child) => child,
                    None => {
                        let child = apta.nodes.len();
                        apta.nodes.push(PrefixNode::new(size));
                        apta.nodes[current].children[symbol] = Some(child);
                        apta.with_child[symbol].insert(current);
                        child
                    }
                };
            }

            let status = Status::from_classification(accepted);
            let node = &mut apta.nodes[current];
            if accepted {
                node.statistics.accepting_endings += 1;
            } else {
                node.statistics.rejecting_endings += 1;
            }
            match node.status {
                Status::Common => {
                    node.status = status;
                    if accepted {
                        apta.accepting.insert(current);
                    } else {
                        apta.rejecting.insert(current);
                    }
                }
                existing if existing == status => {}
                _ => {
                    return Err(AptaError::Contradiction {
                        word: sample.alphabet().show_word(word),
                    })
                }
            }
        }

        apta.refresh_blue();
        info!(
            "built APTA with {} nodes from {} words, {} accepting and {} rejecting",
            apta.size().bold(),
            sample.count_words(),
            apta.accepting.len(),
            apta.rejecting.len()
        );
        Ok(apta)
    }

    /// The number of nodes in the arena, including provisionally folded ones.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn node(&self, node: NodeId) -> &PrefixNode {
        &self.nodes[node]
    }

    pub fn status(&self, node: NodeId) -> Status {
        self.nodes[node].status
    }

    /// The stored child of `node` on `symbol`, not resolved through representatives.
    pub fn child(&self, node: NodeId, symbol: Symbol) -> Option<NodeId> {
        self.nodes[node].child(symbol)
    }

    /// Iterates over all node indices.
    pub fn node_indices(&self) -> std::ops::Range<NodeId> {
        0..self.nodes.len()
    }

    /// Iterates over all edges `(source, symbol, target)` where the target is resolved
    /// through representatives.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, Symbol, NodeId)> + '_ {
        self.node_indices().flat_map(move |source| {
            self.nodes[source]
                .children()
                .map(move |(symbol, target)| (source, symbol, self.find(target)))
        })
    }

    pub fn red(&self) -> &OrderedSet<NodeId> {
        &self.red
    }

    pub fn blue(&self) -> &OrderedSet<NodeId> {
        &self.blue
    }

    pub fn is_red(&self, node: NodeId) -> bool {
        self.red.contains(&node)
    }

    /// All nodes that are not red, in ascending order.
    pub fn not_red(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_indices().filter(|node| !self.red.contains(node))
    }

    /// Nodes whose status is accepting.
    pub fn accepting(&self) -> &OrderedSet<NodeId> {
        &self.accepting
    }

    /// Nodes whose status is rejecting.
    pub fn rejecting(&self) -> &OrderedSet<NodeId> {
        &self.rejecting
    }

    /// The nodes that have a child on `symbol`.
    pub fn with_child(&self, symbol: Symbol) -> &OrderedSet<NodeId> {
        &self.with_child[symbol]
    }

    /// Follows representative links until a node that has not been folded is reached.
    pub fn find(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(next) = self.nodes[current].representative {
            current = next;
        }
        current
    }

    /// Computes the children of red nodes that are not red themselves.
    pub fn frontier(&self) -> OrderedSet<NodeId> {
        self.red
            .iter()
            .flat_map(|red| self.nodes[*red].children())
            .map(|(_, child)| self.find(child))
            .filter(|child| !self.red.contains(child))
            .collect()
    }

    /// Recomputes the blue nodes from the red ones.
    pub fn refresh_blue(&mut self) {
        self.blue = self.frontier();
    }

    /// Turns a blue node red, which exposes its children as new blue nodes.
    pub fn promote(&mut self, node: NodeId) {
        debug_assert!(self.blue.contains(&node), "only blue nodes can be promoted");
        trace!("promoting node {node}");
        self.red.insert(node);
        self.refresh_blue();
    }

    /// Overwrites the status of `node` and returns the previous one.
    pub fn set_status(&mut self, node: NodeId, status: Status) -> Status {
        std::mem::replace(&mut self.nodes[node].status, status)
    }

    fn pair_mut(&mut self, first: NodeId, second: NodeId) -> (&mut PrefixNode, &mut PrefixNode) {
        assert_ne!(first, second, "cannot borrow the same node twice");
        if first < second {
            let (left, right) = self.nodes.split_at_mut(second);
            (&mut left[first], &mut right[0])
        } else {
            let (left, right) = self.nodes.split_at_mut(first);
            (&mut right[0], &mut left[second])
        }
    }

    /// Adds the path statistics of `blue` to those of `red`.
    pub fn absorb(&mut self, red: NodeId, blue: NodeId) {
        let (red, blue) = self.pair_mut(red, blue);
        red.statistics.add(&blue.statistics);
    }

    /// Inverse of [`Apta::absorb`], requires the statistics of `blue` to be unchanged since.
    pub fn retract(&mut self, red: NodeId, blue: NodeId) {
        let (red, blue) = self.pair_mut(red, blue);
        red.statistics.subtract(&blue.statistics);
    }

    /// Makes `child` the successor of `parent` on `symbol`, where `parent` has none yet.
    pub fn adopt(&mut self, parent: NodeId, symbol: Symbol, child: NodeId) {
        debug_assert!(self.nodes[parent].children[symbol].is_none());
        self.nodes[parent].children[symbol] = Some(child);
    }

    /// Inverse of [`Apta::adopt`].
    pub fn release(&mut self, parent: NodeId, symbol: Symbol) {
        self.nodes[parent].children[symbol] = None;
    }

    /// Sets or clears the representative of `node`.
    pub fn represent(&mut self, node: NodeId, representative: Option<NodeId>) {
        debug_assert_ne!(Some(node), representative);
        self.nodes[node].representative = representative;
    }

    /// Makes all provisional merges permanent. Folded nodes are dropped, every edge is
    /// redirected to the representative of its target, and the remaining nodes are renumbered
    /// in their previous order so that indices are dense again.
    pub fn commit_merges(&mut self) {
        let folded = self
            .nodes
            .iter()
            .filter(|node| node.representative.is_some())
            .count();
        if folded == 0 {
            return;
        }

        let mut index = vec![None; self.nodes.len()];
        let mut next = 0;
        for (old, node) in self.nodes.iter().enumerate() {
            if node.representative.is_none() {
                index[old] = Some(next);
                next += 1;
            }
        }

        let resolved: Vec<Vec<Option<NodeId>>> = self
            .nodes
            .iter()
            .map(|node| {
                node.children
                    .iter()
                    .map(|child| child.and_then(|child| index[self.find(child)]))
                    .collect()
            })
            .collect();

        let nodes = std::mem::take(&mut self.nodes);
        self.nodes = nodes
            .into_iter()
            .zip(resolved)
            .filter(|(node, _)| node.representative.is_none())
            .map(|(mut node, children)| {
                node.children = children;
                node
            })
            .collect();

        debug_assert!(
            self.red.iter().all(|red| index[*red].is_some()),
            "red nodes are never folded"
        );
        self.red = self.red.iter().filter_map(|red| index[*red]).collect();

        self.accepting.clear();
        self.rejecting.clear();
        for set in self.with_child.iter_mut() {
            set.clear();
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match node.status {
                Status::Accepting => {
                    self.accepting.insert(id);
                }
                Status::Rejecting => {
                    self.rejecting.insert(id);
                }
                Status::Common => {}
            }
            for (symbol, _) in node.children() {
                self.with_child[symbol].insert(id);
            }
        }
        self.refresh_blue();
        debug!(
            "committed merges, dropped {folded} nodes, {} remain",
            self.nodes.len()
        );
    }

    /// Iterates over the red nodes in breadth-first order from the root, following edges
    /// between red nodes in ascending symbol order.
    pub fn red_bfs_order(&self) -> Vec<NodeId> {
        let mut order = vec![Self::ROOT];
        let mut seen = OrderedSet::from([Self::ROOT]);
        let mut queue = VecDeque::from([Self::ROOT]);
        while let Some(node) = queue.pop_front() {
            for (_, child) in self.nodes[node].children() {
                let child = self.find(child);
                if self.red.contains(&child) && seen.insert(child) {
                    order.push(child);
                    queue.push_back(child);
                }
            }
        }
        order
    }

    /// Iterates over the red nodes in depth-first pre-order from the root, following edges
    /// between red nodes in ascending symbol order.
    pub fn red_dfs_order(&self) -> Vec<NodeId> {
        let mut order = vec![];
        let mut seen = OrderedSet::new();
        let mut stack = vec![Self::ROOT];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            order.push(node);
            let children: Vec<_> = self.nodes[node]
                .children()
                .map(|(_, child)| self.find(child))
                .filter(|child| self.red.contains(child) && !seen.contains(child))
                .collect();
            stack.extend(children.into_iter().rev());
        }
        order
    }
}

impl Dottable for Apta {
    fn dot_name(&self) -> String {
        "Apta".to_string()
    }

    fn dot_states(&self) -> Vec<(String, Vec<DotStateAttribute>)> {
        self.node_indices()
            .filter(|node| self.nodes[*node].representative.is_none())
            .map(|node| {
                let mut attributes = vec![];
                if self.status(node).is_accepting() {
                    attributes.push(DotStateAttribute::Peripheries(2));
                }
                if self.status(node).is_rejecting() {
                    attributes.push(DotStateAttribute::Style("dashed".to_string()));
                }
                if self.red.contains(&node) {
                    attributes.push(DotStateAttribute::Color("red".to_string()));
                } else if self.blue.contains(&node) {
                    attributes.push(DotStateAttribute::Color("blue".to_string()));
                }
                (node.to_string(), attributes)
            })
            .collect()
    }

    fn dot_transitions(&self) -> Vec<(String, String, Vec<DotTransitionAttribute>)> {
        self.node_indices()
            .filter(|node| self.nodes[*node].representative.is_none())
            .flat_map(|node| {
                self.nodes[node].children().map(move |(symbol, child)| {
                    (
                        node.to_string(),
                        self.find(child).to_string(),
                        vec![DotTransitionAttribute::Label(
                            self.alphabet.name(symbol).unwrap_or("?").to_string(),
                        )],
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Apta, AptaError, Status};
    use crate::{alphabet::Alphabet, dot::Dottable, math::OrderedSet, sample::FiniteSample};

    pub(crate) fn small_sample() -> FiniteSample {
        FiniteSample::try_from_str("3 2\n0 2 0 1\n1 1 0\n0 1 1\n").unwrap()
    }

    #[test_log::test]
    fn build_apta() {
        let apta = Apta::from_sample(&small_sample()).unwrap();
        assert_eq!(apta.size(), 4);
        // root, "0", "0 1", "1" in insertion order
        assert_eq!(apta.status(0), Status::Common);
        assert_eq!(apta.child(0, 0), Some(1));
        assert_eq!(apta.child(1, 1), Some(2));
        assert_eq!(apta.child(0, 1), Some(3));
        assert_eq!(apta.status(1), Status::Accepting);
        assert_eq!(apta.status(2), Status::Rejecting);
        assert_eq!(apta.status(3), Status::Rejecting);
        assert_eq!(apta.accepting(), &OrderedSet::from([1]));
        assert_eq!(apta.rejecting(), &OrderedSet::from([2, 3]));
        assert_eq!(apta.red(), &OrderedSet::from([0]));
        assert_eq!(apta.blue(), &OrderedSet::from([1, 3]));
        assert_eq!(apta.with_child(0), &OrderedSet::from([0]));
        assert_eq!(apta.with_child(1), &OrderedSet::from([0, 1]));

        let root = apta.node(0);
        assert_eq!(root.accepting_paths(0), 1);
        assert_eq!(root.rejecting_paths(0), 1);
        assert_eq!(root.rejecting_paths(1), 1);
        assert_eq!(apta.node(1).accepting_endings(), 1);
        assert_eq!(apta.node(1).rejecting_paths_sum(), 1);
    }

    #[test]
    fn contradictory_sample_is_rejected() {
        let sample = FiniteSample::try_from_str("3 2\n1 2 0 1\n0 1 1\n0 2 0 1").unwrap();
        assert_eq!(
            Apta::from_sample(&sample),
            Err(AptaError::Contradiction {
                word: "0 1".to_string()
            })
        );
    }

    #[test]
    fn duplicate_words_are_fine() {
        let sample = FiniteSample::try_from_str("2 1\n1 2 0 0\n1 2 0 0").unwrap();
        let apta = Apta::from_sample(&sample).unwrap();
        assert_eq!(apta.size(), 3);
        assert_eq!(apta.node(2).accepting_endings(), 2);
    }

    #[test]
    fn provisional_fold_and_commit() {
        let mut apta = Apta::from_sample(&small_sample()).unwrap();
        let before = apta.clone();

        // fold "1" (3) into "0 1" (2) and undo it again
        apta.absorb(2, 3);
        apta.represent(3, Some(2));
        assert_eq!(apta.find(3), 2);
        apta.represent(3, None);
        apta.retract(2, 3);
        assert_eq!(apta, before);

        // fold "0 1" (2) into the root and commit
        apta.represent(2, Some(0));
        apta.absorb(0, 2);
        apta.commit_merges();
        assert_eq!(apta.size(), 3);
        assert_eq!(apta.child(1, 1), Some(0));
        assert_eq!(apta.child(0, 1), Some(2));
        assert_eq!(apta.rejecting(), &OrderedSet::from([2]));
        assert_eq!(apta.with_child(1), &OrderedSet::from([0, 1]));
        assert_eq!(apta.blue(), &apta.frontier());
    }

    #[test]
    fn promotion_keeps_partition() {
        let mut apta = Apta::from_sample(&small_sample()).unwrap();
        apta.promote(1);
        assert_eq!(apta.red(), &OrderedSet::from([0, 1]));
        assert_eq!(apta.blue(), &OrderedSet::from([2, 3]));
        assert_eq!(apta.blue(), &apta.frontier());
        assert_eq!(apta.not_red().collect::<Vec<_>>(), vec![2, 3]);
        apta.promote(3);
        assert_eq!(apta.red_bfs_order(), vec![0, 1, 3]);
        assert_eq!(apta.red_dfs_order(), vec![0, 1, 3]);
    }

    #[test]
    fn apta_dot() {
        let sample = FiniteSample::new(Alphabet::from_names(["a"]), [(vec![0], true)]);
        let apta = Apta::from_sample(&sample).unwrap();
        assert_eq!(
            apta.dot_representation(),
            "digraph Apta {\nnode [shape=\"circle\"];\n0 [color=\"red\"];\n1 [peripheries=2, color=\"blue\"];\n0 -> 1 [label=\"a\"];\n}"
        );
    }
}
