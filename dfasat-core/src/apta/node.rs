use crate::alphabet::Symbol;

/// Nodes are addressed by their position in the arena of the owning [`super::Apta`].
pub type NodeId = usize;

/// The classification a node carries. Nodes that are not the end of any sample word are
/// [`Status::Common`], they may later be identified with accepting or rejecting nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Accepting,
    Rejecting,
    Common,
}

impl Status {
    pub fn from_classification(accepted: bool) -> Self {
        if accepted {
            Status::Accepting
        } else {
            Status::Rejecting
        }
    }

    pub fn is_accepting(&self) -> bool {
        matches!(self, Status::Accepting)
    }

    pub fn is_rejecting(&self) -> bool {
        matches!(self, Status::Rejecting)
    }

    pub fn is_common(&self) -> bool {
        matches!(self, Status::Common)
    }

    /// Two statuses conflict if one of them is accepting and the other one rejecting.
    pub fn conflicts_with(&self, other: Status) -> bool {
        matches!(
            (self, other),
            (Status::Accepting, Status::Rejecting) | (Status::Rejecting, Status::Accepting)
        )
    }
}

/// Counts how many accepted and rejected sample words pass through a node, per symbol on
/// which they leave it, and how many of them end in it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathStatistics {
    pub(crate) accepting_paths: Vec<u32>,
    pub(crate) rejecting_paths: Vec<u32>,
    pub(crate) accepting_endings: u32,
    pub(crate) rejecting_endings: u32,
}

impl PathStatistics {
    fn new(alphabet_size: usize) -> Self {
        Self {
            accepting_paths: vec![0; alphabet_size],
            rejecting_paths: vec![0; alphabet_size],
            accepting_endings: 0,
            rejecting_endings: 0,
        }
    }

    pub(crate) fn add(&mut self, other: &PathStatistics) {
        for (mine, theirs) in self.accepting_paths.iter_mut().zip(&other.accepting_paths) {
            *mine += theirs;
        }
        for (mine, theirs) in self.rejecting_paths.iter_mut().zip(&other.rejecting_paths) {
            *mine += theirs;
        }
        self.accepting_endings += other.accepting_endings;
        self.rejecting_endings += other.rejecting_endings;
    }

    pub(crate) fn subtract(&mut self, other: &PathStatistics) {
        for (mine, theirs) in self.accepting_paths.iter_mut().zip(&other.accepting_paths) {
            *mine -= theirs;
        }
        for (mine, theirs) in self.rejecting_paths.iter_mut().zip(&other.rejecting_paths) {
            *mine -= theirs;
        }
        self.accepting_endings -= other.accepting_endings;
        self.rejecting_endings -= other.rejecting_endings;
    }
}

/// A vertex of the prefix tree. Once states are merged, the graph formed by the nodes is no
/// longer a tree and several nodes may share a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixNode {
    pub(crate) status: Status,
    pub(crate) children: Vec<Option<NodeId>>,
    pub(crate) statistics: PathStatistics,
    pub(crate) representative: Option<NodeId>,
}

impl PrefixNode {
    pub(crate) fn new(alphabet_size: usize) -> Self {
        Self {
            status: Status::Common,
            children: vec![None; alphabet_size],
            statistics: PathStatistics::new(alphabet_size),
            representative: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The child reached on `symbol`, as it is stored. During a provisional merge the stored
    /// child may have been folded into another node, see [`super::Apta::find`].
    pub fn child(&self, symbol: Symbol) -> Option<NodeId> {
        self.children.get(symbol).copied().flatten()
    }

    /// Iterates over all `(symbol, child)` pairs of the node in ascending symbol order.
    pub fn children(&self) -> impl Iterator<Item = (Symbol, NodeId)> + '_ {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(symbol, child)| child.map(|child| (symbol, child)))
    }

    /// Number of accepted sample words that leave this node on `symbol`.
    pub fn accepting_paths(&self, symbol: Symbol) -> u32 {
        self.statistics
            .accepting_paths
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }

    /// Number of rejected sample words that leave this node on `symbol`.
    pub fn rejecting_paths(&self, symbol: Symbol) -> u32 {
        self.statistics
            .rejecting_paths
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }

    pub fn accepting_paths_sum(&self) -> u32 {
        self.statistics.accepting_paths.iter().sum()
    }

    pub fn rejecting_paths_sum(&self) -> u32 {
        self.statistics.rejecting_paths.iter().sum()
    }

    /// Number of accepted sample words ending in this node.
    pub fn accepting_endings(&self) -> u32 {
        self.statistics.accepting_endings
    }

    /// Number of rejected sample words ending in this node.
    pub fn rejecting_endings(&self) -> u32 {
        self.statistics.rejecting_endings
    }

    /// The node this one has been provisionally folded into, if any.
    pub fn representative(&self) -> Option<NodeId> {
        self.representative
    }
}

#[cfg(test)]
mod tests {
    use super::Status;

    #[test]
    fn status_conflicts() {
        assert!(Status::Accepting.conflicts_with(Status::Rejecting));
        assert!(Status::Rejecting.conflicts_with(Status::Accepting));
        assert!(!Status::Common.conflicts_with(Status::Rejecting));
        assert!(!Status::Accepting.conflicts_with(Status::Accepting));
        assert_eq!(Status::from_classification(true), Status::Accepting);
    }
}
