use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// How the encoder removes symmetric solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymmetryBreaking {
    /// Only red nodes are pinned to colors.
    None,
    /// Colors are numbered in breadth-first discovery order.
    #[default]
    Bfs,
    /// Colors are numbered in depth-first discovery order.
    Dfs,
    /// Members of a clique in the consistency graph are pinned to colors.
    Clique,
}

/// How many groups the grouped at-most-one encodings split their variables into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCount {
    /// `ceil(sqrt(n))` groups.
    Sqrt,
    /// `ceil(n / 2)` groups.
    Half,
}

impl GroupCount {
    pub fn groups(&self, n: usize) -> usize {
        match self {
            GroupCount::Sqrt => dfasat_core::math::ceil_sqrt(n),
            GroupCount::Half => (n + 1) / 2,
        }
        .max(1)
    }
}

/// Clause patterns for the constraint "at most one of these variables is true".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtMostOne {
    #[default]
    Pairwise,
    Binary,
    Commander(GroupCount),
    Product,
    Sequential,
    Bimander(GroupCount),
}

/// Which homogeneous subtrees are collapsed into shared sink states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkMode {
    #[default]
    None,
    /// Subtrees without accepting nodes go into a rejecting sink.
    Rejecting,
    /// Additionally, subtrees without rejecting nodes go into an accepting sink.
    AcceptingAndRejecting,
}

impl SinkMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SinkMode::None)
    }
}

/// Bounds of the fanout merge heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutBounds {
    /// A node counts as well-explored once this many accepted words pass through it.
    pub paths_lower_bound: u32,
    /// Minimum number of accepted words on a single symbol that make the symbol relevant.
    pub symbol_paths_lower_bound: u32,
}

impl Default for FanoutBounds {
    fn default() -> Self {
        Self {
            paths_lower_bound: 25,
            symbol_paths_lower_bound: 10,
        }
    }
}

/// The scoring heuristic used while reducing the APTA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeHeuristic {
    Status,
    Fanout(FanoutBounds),
}

/// Settings of the evidence driven state merging that shrinks the APTA before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionConfig {
    pub heuristic: MergeHeuristic,
    /// Merging stops once the APTA has fewer nodes than this.
    pub apta_bound: usize,
    /// Merging stops once there are more red nodes than this.
    pub red_bound: usize,
    /// Seed for randomly scaling merge scores, `None` picks the best score deterministically.
    pub random_greedy: Option<u64>,
    /// Promote the first blue node that cannot be merged anywhere instead of merging first.
    pub extend_first: bool,
}

impl ReductionConfig {
    pub fn new(heuristic: MergeHeuristic) -> Self {
        Self {
            heuristic,
            apta_bound: 1000,
            red_bound: 50,
            random_greedy: None,
            extend_first: true,
        }
    }

    pub fn with_bounds(self, apta_bound: usize, red_bound: usize) -> Self {
        Self {
            apta_bound,
            red_bound,
            ..self
        }
    }

    pub fn with_random_greedy(self, seed: u64) -> Self {
        Self {
            random_greedy: Some(seed),
            ..self
        }
    }

    pub fn with_extend_first(self, extend_first: bool) -> Self {
        Self {
            extend_first,
            ..self
        }
    }
}

/// Everything the CNF encoder needs to know besides the APTA and the number of colors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodingConfig {
    pub symmetry_breaking: SymmetryBreaking,
    pub at_most_one: AtMostOne,
    /// Percentage of labelled nodes whose label may be wrong, `0` disables noise tolerance.
    pub noise_percent: u8,
    /// Force unused transitions to be self loops.
    pub loop_fix: bool,
    pub sinks: SinkMode,
}

impl EncodingConfig {
    pub fn is_noisy(&self) -> bool {
        self.noise_percent > 0
    }
}

/// How many automata of the smallest size are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Solutions {
    #[default]
    First,
    UpTo(usize),
    All,
}

impl Solutions {
    pub fn limit(&self) -> Option<usize> {
        match self {
            Solutions::First => Some(1),
            Solutions::UpTo(n) => Some(*n),
            Solutions::All => None,
        }
    }

    pub fn enumerates(&self) -> bool {
        self.limit() != Some(1)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("minimal size {min} exceeds maximal size {max}")]
    EmptySizeRange { min: usize, max: usize },
    #[error("maximal size must be positive")]
    ZeroMaxSize,
    #[error("noise percentage {0} exceeds 100")]
    NoiseOutOfRange(u8),
    #[error("clique symmetry breaking cannot be combined with noise")]
    CliqueWithNoise,
    #[error("sink states cannot be combined with noise")]
    SinksWithNoise,
    #[error("the number of requested solutions must be positive")]
    NoSolutionsRequested,
}

/// Configuration of a complete identification run. It is built once, validated and then
/// handed to every component that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct InductionConfig {
    pub min_size: usize,
    pub max_size: usize,
    /// Time budget for all solver calls together.
    pub timeout: Option<Duration>,
    pub solutions: Solutions,
    /// Where the CNF is written to.
    pub dimacs_path: PathBuf,
    pub encoding: EncodingConfig,
    /// Heuristic reduction of the APTA, skipped if `None`.
    pub reduction: Option<ReductionConfig>,
}

impl Default for InductionConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 20,
            timeout: None,
            solutions: Solutions::First,
            dimacs_path: PathBuf::from("dimacsFile.cnf"),
            encoding: EncodingConfig::default(),
            reduction: None,
        }
    }
}

impl InductionConfig {
    pub fn with_sizes(self, min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size,
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Requesting more than one solution implies the loop fix, otherwise unconstrained
    /// transitions would produce endless variations of the same automaton.
    pub fn with_solutions(mut self, solutions: Solutions) -> Self {
        if solutions.enumerates() {
            self.encoding.loop_fix = true;
        }
        Self { solutions, ..self }
    }

    pub fn with_dimacs_path<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            dimacs_path: path.into(),
            ..self
        }
    }

    pub fn with_symmetry_breaking(mut self, symmetry_breaking: SymmetryBreaking) -> Self {
        self.encoding.symmetry_breaking = symmetry_breaking;
        self
    }

    pub fn with_at_most_one(mut self, at_most_one: AtMostOne) -> Self {
        self.encoding.at_most_one = at_most_one;
        self
    }

    pub fn with_noise(mut self, percent: u8) -> Self {
        self.encoding.noise_percent = percent;
        self
    }

    pub fn with_loop_fix(mut self, loop_fix: bool) -> Self {
        self.encoding.loop_fix = loop_fix || self.solutions.enumerates();
        self
    }

    pub fn with_sinks(mut self, sinks: SinkMode) -> Self {
        self.encoding.sinks = sinks;
        self
    }

    pub fn with_reduction(self, reduction: ReductionConfig) -> Self {
        Self {
            reduction: Some(reduction),
            ..self
        }
    }

    /// Checks that the settings can be combined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::ZeroMaxSize);
        }
        if self.min_size > self.max_size {
            return Err(ConfigError::EmptySizeRange {
                min: self.min_size,
                max: self.max_size,
            });
        }
        if self.encoding.noise_percent > 100 {
            return Err(ConfigError::NoiseOutOfRange(self.encoding.noise_percent));
        }
        if self.encoding.is_noisy() {
            if self.encoding.symmetry_breaking == SymmetryBreaking::Clique {
                return Err(ConfigError::CliqueWithNoise);
            }
            if self.encoding.sinks.is_enabled() {
                return Err(ConfigError::SinksWithNoise);
            }
        }
        if self.solutions == Solutions::UpTo(0) {
            return Err(ConfigError::NoSolutionsRequested);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_forces_loop_fix() {
        let config = InductionConfig::default().with_solutions(Solutions::All);
        assert!(config.encoding.loop_fix);
        let config = config.with_loop_fix(false);
        assert!(config.encoding.loop_fix);
        let config = InductionConfig::default().with_solutions(Solutions::First);
        assert!(!config.encoding.loop_fix);
    }

    #[test]
    fn invalid_combinations() {
        let config = InductionConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(
            config.clone().with_sizes(4, 3).validate(),
            Err(ConfigError::EmptySizeRange { min: 4, max: 3 })
        );
        assert_eq!(
            config.clone().with_noise(101).validate(),
            Err(ConfigError::NoiseOutOfRange(101))
        );
        assert_eq!(
            config
                .clone()
                .with_noise(5)
                .with_symmetry_breaking(SymmetryBreaking::Clique)
                .validate(),
            Err(ConfigError::CliqueWithNoise)
        );
        assert_eq!(
            config
                .clone()
                .with_noise(5)
                .with_sinks(SinkMode::Rejecting)
                .validate(),
            Err(ConfigError::SinksWithNoise)
        );
        assert_eq!(
            config.with_solutions(Solutions::UpTo(0)).validate(),
            Err(ConfigError::NoSolutionsRequested)
        );
    }

    #[test]
    fn group_counts() {
        assert_eq!(GroupCount::Sqrt.groups(10), 4);
        assert_eq!(GroupCount::Half.groups(10), 5);
        assert_eq!(GroupCount::Half.groups(0), 1);
    }
}
