use dfasat_core::apta::{Apta, NodeId};
use owo_colors::OwoColorize;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::{
    config::ReductionConfig,
    merge::{MergeStrategy, StateMerger},
};

/// Scores below this are raised to it, so that a consistent merge without evidence still
/// beats "no merge".
const MINIMAL_SCORE: f64 = 0.0001;

/// What the worker decided to do next.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Promote(NodeId),
    Merge { red: NodeId, blue: NodeId, score: f64 },
    Stop,
}

/// Counts what a reduction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReductionSummary {
    pub merges: usize,
    pub promotions: usize,
    pub size: usize,
    pub red: usize,
}

/// Shrinks an [`Apta`] greedily by evidence driven state merging with the red-blue
/// framework. Blue nodes that cannot be merged into any red node are promoted, and the
/// best scoring consistent merge is performed as long as the APTA is large.
pub struct EdsmWorker {
    config: ReductionConfig,
    merger: StateMerger,
    rng: Option<StdRng>,
}

impl EdsmWorker {
    pub fn new(config: ReductionConfig) -> Self {
        let merger = StateMerger::new(MergeStrategy::from(config.heuristic));
        let rng = config.random_greedy.map(StdRng::seed_from_u64);
        Self {
            config,
            merger,
            rng,
        }
    }

    /// Runs the reduction until the bounds are reached or no blue node is left.
    pub fn run(&mut self, apta: &mut Apta) -> ReductionSummary {
        let mut summary = ReductionSummary::default();
        loop {
            match self.find_best_merge(apta) {
                Step::Stop => break,
                Step::Promote(blue) => {
                    debug!("promoting {blue}, it cannot be merged into any red node");
                    apta.promote(blue);
                    summary.promotions += 1;
                }
                Step::Merge { red, blue, score } => {
                    if apta.size() < self.config.apta_bound
                        || Apta::red(apta).len() > self.config.red_bound
                    {
                        break;
                    }
                    debug!("merging {blue} into {red} with score {score:.4}");
                    self.merger.reset_score();
                    let merged = self.merger.merge(apta, red, blue, true);
                    debug_assert!(merged, "the chosen merge was consistent when scored");
                    summary.merges += usize::from(merged);
                }
            }
        }
        summary.size = apta.size();
        summary.red = Apta::red(apta).len();
        info!(
            "reduced APTA to {} nodes with {} red ones ({} merges, {} promotions)",
            summary.size.bold(),
            summary.red,
            summary.merges,
            summary.promotions
        );
        summary
    }

    fn find_best_merge(&mut self, apta: &mut Apta) -> Step {
        let blues: Vec<NodeId> = Apta::blue(apta).iter().copied().collect();
        let reds: Vec<NodeId> = Apta::red(apta).iter().copied().collect();
        if blues.is_empty() {
            return Step::Stop;
        }

        let mut best: Option<(NodeId, NodeId, f64)> = None;
        let mut unmergeable = None;
        for blue in blues {
            let mut candidate: Option<(NodeId, f64)> = None;
            for &red in &reds {
                let score = self.merger.merge_and_undo(apta, red, blue);
                trace!("score of merging {blue} into {red} is {score}");
                if score < 0 {
                    continue;
                }
                let mut score = (score as f64).max(MINIMAL_SCORE);
                if let Some(rng) = self.rng.as_mut() {
                    score *= rng.gen::<f64>();
                }
                if candidate.map_or(true, |(_, best)| score > best) {
                    candidate = Some((red, score));
                }
            }

            match candidate {
                None if self.config.extend_first => return Step::Promote(blue),
                None => {
                    unmergeable.get_or_insert(blue);
                }
                Some((red, score)) => {
                    if best.map_or(true, |(_, _, best)| score > best) {
                        best = Some((red, blue, score));
                    }
                }
            }
        }

        match (best, unmergeable) {
            (Some((red, blue, score)), _) => Step::Merge { red, blue, score },
            (None, Some(blue)) => Step::Promote(blue),
            (None, None) => Step::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use dfasat_core::{alphabet::Alphabet, apta::Apta, sample::FiniteSample};

    use super::EdsmWorker;
    use crate::config::{FanoutBounds, MergeHeuristic, ReductionConfig};

    fn mod3_sample() -> FiniteSample {
        FiniteSample::exhaustive(Alphabet::from_names(["a", "b"]), 5, |w| {
            w.iter().filter(|sym| **sym == 0).count() % 3 == 0
        })
    }

    #[test_log::test]
    fn reduction_finds_target() {
        let sample = mod3_sample();
        let mut apta = Apta::from_sample(&sample).unwrap();
        let config = ReductionConfig::new(MergeHeuristic::Status).with_bounds(0, 50);
        let summary = EdsmWorker::new(config).run(&mut apta);
        assert!(summary.merges > 0);
        assert_eq!(summary.size, apta.size());
        assert!(apta.blue().is_empty());
        assert_eq!(apta.size(), 3);
        assert_eq!(apta.red().len(), 3);
    }

    #[test]
    fn small_apta_only_promotes() {
        let sample = mod3_sample();
        let mut apta = Apta::from_sample(&sample).unwrap();
        let before = apta.size();
        let summary = EdsmWorker::new(ReductionConfig::new(MergeHeuristic::Status)).run(&mut apta);
        assert_eq!(summary.merges, 0);
        assert_eq!(apta.size(), before);
        assert_eq!(apta.red().len(), summary.promotions + 1);
        assert_eq!(apta.blue(), &apta.frontier());
        for red in apta.red() {
            for other in apta.red() {
                if red != other {
                    let mut copy = apta.clone();
                    let mut merger = crate::merge::StateMerger::new(
                        crate::merge::MergeStrategy::Consistency,
                    );
                    assert_eq!(merger.merge_and_undo(&mut copy, *red, *other), -1);
                }
            }
        }
    }

    #[test]
    fn randomized_and_merge_first_reductions_stay_consistent() {
        let sample = mod3_sample();
        for config in [
            ReductionConfig::new(MergeHeuristic::Status)
                .with_bounds(0, 50)
                .with_random_greedy(7),
            ReductionConfig::new(MergeHeuristic::Fanout(FanoutBounds::default()))
                .with_bounds(0, 50)
                .with_extend_first(false),
        ] {
            let mut apta = Apta::from_sample(&sample).unwrap();
            EdsmWorker::new(config).run(&mut apta);
            assert!(apta.blue().is_empty());
            assert_eq!(apta.blue(), &apta.frontier());
            for (word, accepted) in sample.words() {
                let mut node = apta.root();
                for sym in word {
                    node = apta.child(node, *sym).unwrap();
                }
                assert!(!apta.status(node).conflicts_with(
                    dfasat_core::apta::Status::from_classification(accepted)
                ));
            }
        }
    }
}
