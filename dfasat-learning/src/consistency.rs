use dfasat_core::{
    apta::{Apta, NodeId, Status},
    math::OrderedSet,
};
use itertools::Itertools;
use owo_colors::OwoColorize;
use tracing::{debug, info, trace};

use crate::merge::{MergeStrategy, StateMerger};

/// Mutually incompatible nodes of an [`Apta`], grouped by their status.
///
/// Every two members are adjacent in the [`ConsistencyGraph`] the clique was taken from, so
/// any automaton consistent with the APTA needs a distinct state for each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clique {
    accepting: Vec<NodeId>,
    rejecting: Vec<NodeId>,
    common: Vec<NodeId>,
}

impl Clique {
    pub fn accepting(&self) -> &[NodeId] {
        &self.accepting
    }

    pub fn rejecting(&self) -> &[NodeId] {
        &self.rejecting
    }

    pub fn common(&self) -> &[NodeId] {
        &self.common
    }

    pub fn size(&self) -> usize {
        self.accepting.len() + self.rejecting.len() + self.common.len()
    }

    /// Accepting members first, then rejecting and then common ones.
    pub fn members(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.accepting
            .iter()
            .chain(&self.rejecting)
            .chain(&self.common)
            .copied()
    }
}

/// Undirected graph over the nodes of an [`Apta`] in which an edge connects two nodes that
/// can never be identified with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyGraph {
    adjacency: Vec<OrderedSet<NodeId>>,
    clique: Clique,
}

impl ConsistencyGraph {
    /// A graph over `size` nodes without any edges.
    pub fn empty(size: usize) -> Self {
        Self {
            adjacency: vec![OrderedSet::new(); size],
            clique: Clique::default(),
        }
    }

    /// Computes the graph for `apta`. Accepting and rejecting nodes are always adjacent, as
    /// are two red nodes. Every other pair that involves a node which is not red is connected
    /// if merging the two nodes fails. The APTA is left unchanged.
    pub fn build(apta: &mut Apta) -> Self {
        let mut graph = Self::empty(apta.size());
        let mut merger = StateMerger::new(MergeStrategy::Consistency);

        for &accepting in apta.accepting() {
            for &rejecting in apta.rejecting() {
                graph.add_edge(accepting, rejecting);
            }
        }
        let red = Apta::red(apta).iter().copied().collect_vec();
        for (i, &first) in red.iter().enumerate() {
            for &second in &red[i + 1..] {
                graph.add_edge(first, second);
            }
        }

        let not_red = apta.not_red().collect_vec();
        let mut simulated = 0usize;
        for (i, &blue) in not_red.iter().enumerate() {
            let partners = red.iter().chain(&not_red[..i]);
            for &partner in partners {
                if apta.status(partner).conflicts_with(apta.status(blue)) {
                    continue;
                }
                simulated += 1;
                if merger.merge_and_undo(apta, partner, blue) < 0 {
                    trace!("{partner} and {blue} are inconsistent");
                    graph.add_edge(partner, blue);
                }
            }
        }

        info!(
            "built consistency graph over {} nodes with {} edges, simulated {simulated} merges",
            apta.size(),
            graph.edge_count().bold()
        );
        graph
    }

    fn add_edge(&mut self, first: NodeId, second: NodeId) {
        debug_assert_ne!(first, second);
        self.adjacency[first].insert(second);
        self.adjacency[second].insert(first);
    }

    pub fn size(&self) -> usize {
        self.adjacency.len()
    }

    pub fn has_edge(&self, first: NodeId, second: NodeId) -> bool {
        self.adjacency[first].contains(&second)
    }

    pub fn neighbours(&self, node: NodeId) -> &OrderedSet<NodeId> {
        &self.adjacency[node]
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency[node].len()
    }

    /// Iterates over every edge once, as a pair with the smaller node first.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(node, neighbours)| {
            neighbours
                .range(node + 1..)
                .map(move |neighbour| (node, *neighbour))
        })
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(OrderedSet::len).sum::<usize>() / 2
    }

    /// Greedily extends `members` by nodes with the given status, always picking the node of
    /// highest degree among those adjacent to every member. Ties go to the smaller node.
    fn grow(
        &self,
        apta: &Apta,
        status: Status,
        excluded: &OrderedSet<NodeId>,
        members: &[NodeId],
    ) -> Vec<NodeId> {
        let mut chosen: Vec<NodeId> = vec![];
        let mut candidates: Vec<NodeId> = apta
            .node_indices()
            .filter(|node| apta.status(*node) == status && !excluded.contains(node))
            .filter(|node| members.iter().all(|member| self.has_edge(*member, *node)))
            .collect();
        while let Some(best) = candidates
            .iter()
            .copied()
            .rev()
            .max_by_key(|node| self.degree(*node))
        {
            chosen.push(best);
            candidates.retain(|node| *node != best && self.has_edge(best, *node));
        }
        chosen
    }

    /// Computes and remembers a clique, see [`ConsistencyGraph::find_clique_excluding`].
    pub fn find_clique(&mut self, apta: &Apta) -> &Clique {
        self.find_clique_excluding(apta, &OrderedSet::new())
    }

    /// Computes a clique of nodes that are not in `excluded`: first accepting nodes, then
    /// rejecting nodes and finally common nodes that are adjacent to all accepting and
    /// rejecting members. If the APTA has more red nodes than the clique has members, the red
    /// nodes are used instead.
    pub fn find_clique_excluding(&mut self, apta: &Apta, excluded: &OrderedSet<NodeId>) -> &Clique {
        let accepting = self.grow(apta, Status::Accepting, excluded, &[]);
        let rejecting = self.grow(apta, Status::Rejecting, excluded, &[]);
        let labelled = accepting.iter().chain(&rejecting).copied().collect_vec();
        let common = self.grow(apta, Status::Common, excluded, &labelled);
        let mut clique = Clique {
            accepting,
            rejecting,
            common,
        };

        if apta.red().len() > clique.size() {
            debug!(
                "using the {} red nodes instead of a clique of size {}",
                apta.red().len(),
                clique.size()
            );
            let by_status = |status: Status| {
                apta.red()
                    .iter()
                    .copied()
                    .filter(|red| apta.status(*red) == status)
                    .collect_vec()
            };
            clique = Clique {
                accepting: by_status(Status::Accepting),
                rejecting: by_status(Status::Rejecting),
                common: by_status(Status::Common),
            };
        }

        info!(
            "found clique of size {} ({} accepting, {} rejecting, {} common)",
            clique.size().bold(),
            clique.accepting.len(),
            clique.rejecting.len(),
            clique.common.len()
        );
        self.clique = clique;
        &self.clique
    }

    /// The last clique computed, empty if none was computed yet.
    pub fn clique(&self) -> &Clique {
        &self.clique
    }

    pub fn acceptable_clique(&self) -> &[NodeId] {
        self.clique.accepting()
    }

    pub fn rejectable_clique(&self) -> &[NodeId] {
        self.clique.rejecting()
    }

    pub fn common_clique(&self) -> &[NodeId] {
        self.clique.common()
    }

    pub fn clique_size(&self) -> usize {
        self.clique.size()
    }
}

#[cfg(test)]
mod tests {
    use dfasat_core::{
        alphabet::Alphabet,
        apta::{Apta, Status},
        math::OrderedSet,
        sample::FiniteSample,
    };
    use itertools::Itertools;

    use super::ConsistencyGraph;
    use crate::merge::{MergeStrategy, StateMerger};

    fn small_sample() -> FiniteSample {
        FiniteSample::try_from_str("3 2\n0 2 0 1\n1 1 0\n0 1 1\n").unwrap()
    }

    fn mod3_sample() -> FiniteSample {
        FiniteSample::exhaustive(Alphabet::from_names(["a", "b"]), 4, |w| {
            w.iter().filter(|sym| **sym == 0).count() % 3 == 0
        })
    }

    #[test_log::test]
    fn small_graph() {
        let mut apta = Apta::from_sample(&small_sample()).unwrap();
        let pristine = apta.clone();
        let mut graph = ConsistencyGraph::build(&mut apta);
        assert_eq!(apta, pristine);
        assert_eq!(graph.size(), 4);
        // "0" is accepting, "0 1" and "1" are rejecting
        assert!(graph.has_edge(1, 2));
        assert!(graph.has_edge(3, 1));
        // the root is common and can be identified with every node
        assert!(!graph.has_edge(0, 1));
        assert!(!graph.has_edge(0, 2));
        assert!(!graph.has_edge(0, 3));
        assert!(!graph.has_edge(2, 3));
        assert_eq!(graph.edges().collect_vec(), vec![(1, 2), (1, 3)]);
        assert_eq!(graph.degree(1), 2);
        assert_eq!(graph.neighbours(2), &OrderedSet::from([1]));

        let clique = graph.find_clique(&apta).clone();
        assert_eq!(clique.accepting(), &[1]);
        assert_eq!(clique.rejecting(), &[2]);
        assert!(clique.common().is_empty());
        assert_eq!(graph.clique_size(), 2);
    }

    #[test]
    fn edges_match_failed_merges() {
        let mut apta = Apta::from_sample(&mod3_sample()).unwrap();
        let graph = ConsistencyGraph::build(&mut apta);
        let mut merger = StateMerger::new(MergeStrategy::Consistency);
        for (first, second) in apta.node_indices().tuple_combinations() {
            let expected = apta.status(first).conflicts_with(apta.status(second))
                || merger.merge_and_undo(&mut apta, first, second) < 0;
            assert_eq!(graph.has_edge(first, second), expected, "{first} {second}");
            assert_eq!(graph.has_edge(second, first), expected);
        }
    }

    #[test_log::test]
    fn cliques_are_sound() {
        let mut apta = Apta::from_sample(&mod3_sample()).unwrap();
        let mut graph = ConsistencyGraph::build(&mut apta);
        let clique = graph.find_clique(&apta).clone();
        // one accepting residue and two rejecting ones
        assert_eq!(clique.accepting().len(), 1);
        assert_eq!(clique.rejecting().len(), 2);
        assert_eq!(clique.size(), 3);
        let members = clique.members().collect_vec();
        for (first, second) in members.into_iter().tuple_combinations() {
            assert!(graph.has_edge(first, second), "{first} {second}");
        }
        assert!(clique
            .accepting()
            .iter()
            .all(|node| apta.status(*node) == Status::Accepting));
        assert!(clique
            .rejecting()
            .iter()
            .all(|node| apta.status(*node) == Status::Rejecting));
        assert_eq!(graph.acceptable_clique(), clique.accepting());
        assert_eq!(graph.rejectable_clique(), clique.rejecting());
        assert_eq!(graph.common_clique(), clique.common());
    }

    #[test]
    fn excluded_nodes_stay_out() {
        let mut apta = Apta::from_sample(&small_sample()).unwrap();
        let mut graph = ConsistencyGraph::build(&mut apta);
        let clique = graph
            .find_clique_excluding(&apta, &OrderedSet::from([2]))
            .clone();
        assert_eq!(clique.accepting(), &[1]);
        assert_eq!(clique.rejecting(), &[3]);
    }

    #[test]
    fn red_nodes_replace_small_cliques() {
        let mut apta = Apta::from_sample(&small_sample()).unwrap();
        apta.promote(1);
        apta.promote(3);
        let mut graph = ConsistencyGraph::empty(apta.size());
        let clique = graph.find_clique(&apta).clone();
        assert_eq!(clique.accepting(), &[1]);
        assert_eq!(clique.rejecting(), &[3]);
        assert_eq!(clique.common(), &[0]);
        assert_eq!(graph.edge_count(), 0);
    }
}
