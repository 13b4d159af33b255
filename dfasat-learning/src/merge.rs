use dfasat_core::{
    alphabet::Symbol,
    apta::{Apta, NodeId, Status},
};
use tracing::trace;

use crate::config::{FanoutBounds, MergeHeuristic};

/// Decides whether two nodes may be identified and how much evidence a merge provides.
///
/// Every strategy refuses to identify an accepting with a rejecting node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Scores one point for every identified pair with the same label.
    Status,
    /// Additionally refuses merges between nodes whose accepted words leave on different
    /// symbols, and scores one point for every pair that both carry accepted words.
    Fanout(FanoutBounds),
    /// Only checks consistency, every identified pair scores one point.
    Consistency,
}

impl From<MergeHeuristic> for MergeStrategy {
    fn from(heuristic: MergeHeuristic) -> Self {
        match heuristic {
            MergeHeuristic::Status => MergeStrategy::Status,
            MergeHeuristic::Fanout(bounds) => MergeStrategy::Fanout(bounds),
        }
    }
}

impl MergeStrategy {
    pub fn is_consistent(&self, apta: &Apta, red: NodeId, blue: NodeId) -> bool {
        if apta.status(red).conflicts_with(apta.status(blue)) {
            return false;
        }
        match self {
            MergeStrategy::Fanout(bounds) => {
                fanout_compatible(apta, red, blue, bounds)
                    && fanout_compatible(apta, blue, red, bounds)
            }
            _ => true,
        }
    }

    pub fn score(&self, apta: &Apta, red: NodeId, blue: NodeId) -> i64 {
        match self {
            MergeStrategy::Status => {
                let (red, blue) = (apta.status(red), apta.status(blue));
                i64::from(red == blue && !red.is_common())
            }
            MergeStrategy::Fanout(_) => i64::from(
                apta.node(red).accepting_paths_sum() > 0
                    && apta.node(blue).accepting_paths_sum() > 0,
            ),
            MergeStrategy::Consistency => 1,
        }
    }
}

/// If `first` has seen enough accepted words, `second` may not send a relevant number of
/// accepted words along a symbol on which `first` has seen none.
fn fanout_compatible(apta: &Apta, first: NodeId, second: NodeId, bounds: &FanoutBounds) -> bool {
    let (first, second) = (apta.node(first), apta.node(second));
    if first.accepting_paths_sum() < bounds.paths_lower_bound {
        return true;
    }
    apta.alphabet().universe().all(|symbol| {
        second.accepting_paths(symbol) < bounds.symbol_paths_lower_bound
            || first.accepting_paths(symbol) > 0
    })
}

/// A single reversible change to the APTA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeOp {
    Status { node: NodeId, previous: Status },
    Absorb { red: NodeId, blue: NodeId },
    Adopt { parent: NodeId, symbol: Symbol },
    Represent { node: NodeId },
}

/// Identifies nodes of an [`Apta`] with each other.
///
/// A merge of `blue` into `red` identifies the two nodes and then, for every symbol on which
/// both have a successor, the two successors, until no more pairs are left or a pair is
/// inconsistent. Every change is recorded so that a provisional merge can be reverted exactly
/// by [`StateMerger::undo_merge`].
#[derive(Debug, Clone)]
pub struct StateMerger {
    strategy: MergeStrategy,
    score: i64,
    log: Vec<MergeOp>,
}

impl StateMerger {
    pub fn new(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            score: 0,
            log: vec![],
        }
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// The accumulated score, negative if the last merge was inconsistent.
    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn reset_score(&mut self) {
        self.score = 0;
    }

    /// Whether a provisional merge is waiting to be undone.
    pub fn has_pending(&self) -> bool {
        !self.log.is_empty()
    }

    /// Merges `blue` into `red`, returns whether the merge is consistent. A provisional merge
    /// must be followed by [`StateMerger::undo_merge`], regardless of its outcome. A final
    /// merge that is consistent is committed to the APTA, which renumbers its nodes, while an
    /// inconsistent final merge leaves the APTA untouched.
    pub fn merge(&mut self, apta: &mut Apta, red: NodeId, blue: NodeId, final_merge: bool) -> bool {
        debug_assert!(!self.has_pending(), "previous merge has not been undone");
        let mut pending = vec![(red, blue)];
        while let Some((red, blue)) = pending.pop() {
            let (red, blue) = (apta.find(red), apta.find(blue));
            if red == blue {
                continue;
            }
            if !self.strategy.is_consistent(apta, red, blue) {
                trace!("merging {blue} into {red} is inconsistent");
                self.score = -1;
                if final_merge {
                    self.undo_merge(apta);
                }
                return false;
            }
            self.score += self.strategy.score(apta, red, blue);

            let status = apta.status(blue);
            if apta.status(red).is_common() && !status.is_common() {
                let previous = apta.set_status(red, status);
                self.log.push(MergeOp::Status {
                    node: red,
                    previous,
                });
            }
            apta.absorb(red, blue);
            self.log.push(MergeOp::Absorb { red, blue });
            apta.represent(blue, Some(red));
            self.log.push(MergeOp::Represent { node: blue });

            for symbol in apta.alphabet().universe().collect::<Vec<_>>().into_iter().rev() {
                match (apta.child(red, symbol), apta.child(blue, symbol)) {
                    (None, Some(child)) => {
                        apta.adopt(red, symbol, child);
                        self.log.push(MergeOp::Adopt {
                            parent: red,
                            symbol,
                        });
                    }
                    (Some(red_child), Some(blue_child)) => pending.push((red_child, blue_child)),
                    _ => {}
                }
            }
        }

        if final_merge {
            self.log.clear();
            apta.commit_merges();
        }
        true
    }

    /// Reverts the last provisional merge.
    pub fn undo_merge(&mut self, apta: &mut Apta) {
        while let Some(op) = self.log.pop() {
            match op {
                MergeOp::Status { node, previous } => {
                    apta.set_status(node, previous);
                }
                MergeOp::Absorb { red, blue } => apta.retract(red, blue),
                MergeOp::Adopt { parent, symbol } => apta.release(parent, symbol),
                MergeOp::Represent { node } => apta.represent(node, None),
            }
        }
    }

    /// Evaluates merging `blue` into `red` without changing the APTA, the result is the
    /// score of the merge or `-1` if it is inconsistent.
    pub fn merge_and_undo(&mut self, apta: &mut Apta, red: NodeId, blue: NodeId) -> i64 {
        self.reset_score();
        let consistent = self.merge(apta, red, blue, false);
        let score = if consistent { self.score } else { -1 };
        self.undo_merge(apta);
        score
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

    use super::{MergeStrategy, StateMerger};
    use crate::config::FanoutBounds;

    fn odd_a_sample(len: usize) -> FiniteSample {
        FiniteSample::exhaustive(Alphabet::from_names(["a", "b"]), len, |w| {
            w.iter().filter(|sym| **sym == 0).count() % 2 == 1
        })
    }

    #[test_log::test]
    fn undo_restores_every_pair() {
        let mut apta = Apta::from_sample(&odd_a_sample(3)).unwrap();
        let pristine = apta.clone();
        let mut merger = StateMerger::new(MergeStrategy::Status);
        let mut consistent = 0;
        for red in apta.node_indices() {
            for blue in apta.node_indices().filter(|blue| *blue > red) {
                if merger.merge_and_undo(&mut apta, red, blue) >= 0 {
                    consistent += 1;
                }
                assert!(!merger.has_pending());
                assert_eq!(apta, pristine, "merging {blue} into {red} was not undone");
            }
        }
        assert!(consistent > 0);
    }

    #[test]
    fn inconsistent_merge_is_negative() {
        let sample = FiniteSample::try_from_str("3 2\n0 2 0 1\n1 1 0\n0 1 1\n").unwrap();
        let mut apta = Apta::from_sample(&sample).unwrap();
        let pristine = apta.clone();
        let mut merger = StateMerger::new(MergeStrategy::Status);
        assert_eq!(merger.merge_and_undo(&mut apta, 1, 3), -1);
        assert_eq!(apta, pristine);
        // the root is common and merging "1" into it only changes its status
        assert_eq!(merger.merge_and_undo(&mut apta, 0, 3), 0);
        assert_eq!(apta, pristine);
        // merging "0" into the root identifies "1" with "0 1"
        assert_eq!(merger.merge_and_undo(&mut apta, 0, 1), 1);
        assert_eq!(apta, pristine);
    }

    #[test]
    fn final_merge_folds_chain() {
        let sample = FiniteSample::exhaustive(Alphabet::numeric(1), 3, |_| true);
        let mut apta = Apta::from_sample(&sample).unwrap();
        assert_eq!(apta.size(), 4);
        let mut merger = StateMerger::new(MergeStrategy::Status);
        assert!(merger.merge(&mut apta, 0, 1, true));
        assert_eq!(merger.score(), 3);
        assert!(!merger.has_pending());
        assert_eq!(apta.size(), 1);
        assert_eq!(apta.child(0, 0), Some(0));
        assert_eq!(apta.status(0), Status::Accepting);
        assert_eq!(apta.node(0).accepting_endings(), 4);
        assert_eq!(apta.node(0).accepting_paths(0), 6);
        assert!(apta.blue().is_empty());
        assert_eq!(apta.blue(), &apta.frontier());
    }

    #[test]
    fn final_merge_keeps_partition() {
        let mut apta = Apta::from_sample(&odd_a_sample(3)).unwrap();
        let mut merger = StateMerger::new(MergeStrategy::Status);
        // "b" behaves like the empty word
        let b = apta.child(0, 1).unwrap();
        assert!(merger.merge(&mut apta, 0, b, true));
        assert_eq!(apta.size(), 8);
        assert_eq!(apta.child(0, 1), Some(0));
        assert_eq!(apta.red(), &OrderedSet::from([0]));
        assert_eq!(apta.blue(), &apta.frontier());
        assert_eq!(apta.blue().len(), 1);

        let a = apta.child(0, 0).unwrap();
        apta.promote(a);
        assert_eq!(apta.blue(), &apta.frontier());
        let aa = apta.child(a, 0).unwrap();
        assert!(merger.merge(&mut apta, 0, aa, true));
        assert_eq!(apta.size(), 5);
        assert_eq!(apta.red(), &OrderedSet::from([0, a]));
        let ab = apta.child(a, 1).unwrap();
        assert_eq!(apta.blue(), &OrderedSet::from([ab]));
        assert_eq!(apta.blue(), &apta.frontier());

        assert!(merger.merge(&mut apta, a, ab, true));
        assert_eq!(apta.size(), 2);
        assert!(apta.blue().is_empty());
        assert_eq!(apta.child(a, 0), Some(0));
        assert_eq!(apta.child(a, 1), Some(a));
    }

    #[test]
    fn inconsistent_final_merge_leaves_apta_alone() {
        let sample = FiniteSample::exhaustive(Alphabet::from_names(["a", "b"]), 3, |w| {
            w.iter().filter(|sym| **sym == 0).count() % 3 == 0
        });
        let mut apta = Apta::from_sample(&sample).unwrap();
        let pristine = apta.clone();
        let a = apta.child(0, 0).unwrap();
        let aa = apta.child(a, 0).unwrap();
        // both are rejecting, but "aa a" is accepted while "a a" is not
        let mut merger = StateMerger::new(MergeStrategy::Consistency);
        assert!(!merger.merge(&mut apta, a, aa, true));
        assert_eq!(merger.score(), -1);
        assert!(!merger.has_pending());
        assert_eq!(apta, pristine);
    }

    #[test]
    fn fanout_rejects_diverging_paths() {
        let sample = FiniteSample::try_from_str("3 2\n1 1 a\n1 2 a a\n1 2 a b").unwrap();
        let mut apta = Apta::from_sample(&sample).unwrap();
        let a = apta.child(0, 0).unwrap();
        let bounds = FanoutBounds {
            paths_lower_bound: 2,
            symbol_paths_lower_bound: 1,
        };
        let mut fanout = StateMerger::new(MergeStrategy::Fanout(bounds));
        assert_eq!(fanout.merge_and_undo(&mut apta, 0, a), -1);
        let mut status = StateMerger::new(MergeStrategy::Status);
        assert!(status.merge_and_undo(&mut apta, 0, a) >= 0);

        let relaxed = FanoutBounds {
            paths_lower_bound: 10,
            symbol_paths_lower_bound: 1,
        };
        let mut fanout = StateMerger::new(MergeStrategy::Fanout(relaxed));
        assert_eq!(fanout.merge_and_undo(&mut apta, 0, a), 1);
    }
}
