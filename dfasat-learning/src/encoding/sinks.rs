use std::collections::VecDeque;

use dfasat_core::{
    apta::{Apta, NodeId, Status},
    math::OrderedSet,
};
use tracing::debug;

use crate::config::SinkMode;

/// Vertices whose whole reachable part carries a single label, together with the sink state
/// they are collapsed into. Such vertices get no color, edges into them lead to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sinks {
    statuses: Vec<Status>,
    sink_of: Vec<Option<usize>>,
}

impl Sinks {
    /// No vertex is collapsed.
    pub fn none(size: usize) -> Self {
        Self {
            statuses: vec![],
            sink_of: vec![None; size],
        }
    }

    /// Finds the vertices that are not red and from which no accepting vertex can be
    /// reached, these go into a rejecting sink. With [`SinkMode::AcceptingAndRejecting`] the
    /// vertices from which no rejecting vertex can be reached go into an accepting sink.
    pub fn detect(apta: &Apta, mode: SinkMode) -> Self {
        let mut sinks = Self::none(apta.size());
        let statuses: &[Status] = match mode {
            SinkMode::None => return sinks,
            SinkMode::Rejecting => &[Status::Rejecting],
            SinkMode::AcceptingAndRejecting => &[Status::Rejecting, Status::Accepting],
        };

        let mut parents = vec![vec![]; apta.size()];
        for (source, _, target) in apta.edges() {
            parents[target].push(source);
        }

        for (index, status) in statuses.iter().enumerate() {
            // the opposite label must be unreachable
            let seeds = match status {
                Status::Rejecting => apta.accepting(),
                _ => apta.rejecting(),
            };
            let reaching = reverse_reachable(&parents, seeds);
            for node in apta.not_red() {
                if !reaching.contains(&node) && sinks.sink_of[node].is_none() {
                    sinks.sink_of[node] = Some(index);
                }
            }
        }
        sinks.statuses = statuses.to_vec();

        debug!(
            "collapsing {} of {} vertices into sinks",
            sinks.sunk().len(),
            apta.size()
        );
        sinks
    }

    /// Number of sink states.
    pub fn count(&self) -> usize {
        self.statuses.len()
    }

    pub fn status(&self, sink: usize) -> Status {
        self.statuses[sink]
    }

    pub fn sink_of(&self, node: NodeId) -> Option<usize> {
        self.sink_of[node]
    }

    pub fn is_sunk(&self, node: NodeId) -> bool {
        self.sink_of[node].is_some()
    }

    pub fn sunk(&self) -> OrderedSet<NodeId> {
        self.sink_of
            .iter()
            .enumerate()
            .filter_map(|(node, sink)| sink.map(|_| node))
            .collect()
    }
}

fn reverse_reachable(parents: &[Vec<NodeId>], seeds: &OrderedSet<NodeId>) -> OrderedSet<NodeId> {
    let mut seen = seeds.clone();
    let mut queue: VecDeque<NodeId> = seeds.iter().copied().collect();
    while let Some(node) = queue.pop_front() {
        for parent in &parents[node] {
            if seen.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use dfasat_core::{
        apta::{Apta, Status},
        math::OrderedSet,
        sample::FiniteSample,
    };

    use super::Sinks;
    use crate::config::SinkMode;

    #[test]
    fn detects_homogeneous_subtrees() {
        // "0" accepted, "0 1" and "1" rejected
        let sample = FiniteSample::try_from_str("3 2\n0 2 0 1\n1 1 0\n0 1 1\n").unwrap();
        let apta = Apta::from_sample(&sample).unwrap();

        let none = Sinks::detect(&apta, SinkMode::None);
        assert_eq!(none.count(), 0);
        assert!(none.sunk().is_empty());

        let rejecting = Sinks::detect(&apta, SinkMode::Rejecting);
        assert_eq!(rejecting.count(), 1);
        assert_eq!(rejecting.sunk(), OrderedSet::from([2, 3]));
        assert_eq!(rejecting.sink_of(3), Some(0));
        assert_eq!(rejecting.status(0), Status::Rejecting);
        assert!(!rejecting.is_sunk(1));

        let both = Sinks::detect(&apta, SinkMode::AcceptingAndRejecting);
        assert_eq!(both.count(), 2);
        assert_eq!(both.sunk(), OrderedSet::from([2, 3]));
        assert_eq!(both.status(1), Status::Accepting);
    }

    #[test]
    fn red_vertices_stay() {
        let sample = FiniteSample::try_from_str("2 1\n1 1 0\n1 2 0 0\n").unwrap();
        let apta = Apta::from_sample(&sample).unwrap();
        let sinks = Sinks::detect(&apta, SinkMode::AcceptingAndRejecting);
        assert_eq!(sinks.sunk(), OrderedSet::from([1, 2]));
        assert_eq!(sinks.sink_of(1), Some(1));
        assert!(!sinks.is_sunk(0));
    }
}
