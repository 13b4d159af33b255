use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    alphabet::{Alphabet, Symbol},
    math,
};

/// Abstracts the types of errors that can occur when parsing a [`FiniteSample`] from a string.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SampleParseError {
    #[error("missing sample header")]
    MissingHeader,
    #[error("malformed number `{0}` in sample header")]
    MalformedHeader(String),
    #[error("word {index} has classification `{found}`, expected `0` or `1`")]
    MalformedClassification { index: usize, found: String },
    #[error("word {index} has malformed length `{found}`")]
    MalformedLength { index: usize, found: String },
    #[error("word {index} is missing its classification or length")]
    MissingWord { index: usize },
    #[error("word {index} should have {expected} symbols but the input ends after {found}")]
    TruncatedWord {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("sample declares {declared} alphabet symbols but uses {found}")]
    AlphabetOverflow { declared: usize, found: usize },
    #[error("unexpected token `{0}` after the last declared word")]
    TrailingInput(String),
    #[error("sample declares {declared} alphabet symbols, at most {limit} are supported")]
    AlphabetTooLarge { declared: usize, limit: usize },
}

/// Largest alphabet a sample header may declare.
pub const MAX_ALPHABET_SIZE: usize = 1 << 16;

/// Errors that arise when loading a sample from disk, they carry the offending path.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("could not read sample {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed sample {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: SampleParseError,
    },
}

/// A finite sample consists of finitely many words over an [`Alphabet`], each of which is
/// classified as accepted (`true`) or rejected (`false`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiniteSample {
    alphabet: Alphabet,
    words: Vec<(Vec<Symbol>, bool)>,
}

impl FiniteSample {
    /// Create a new sample from the given alphabet and classified words.
    pub fn new<W: IntoIterator<Item = Symbol>, I: IntoIterator<Item = (W, bool)>>(
        alphabet: Alphabet,
        words: I,
    ) -> Self {
        let words = words
            .into_iter()
            .map(|(word, classification)| (word.into_iter().collect_vec(), classification))
            .collect_vec();
        debug_assert!(
            words
                .iter()
                .all(|(word, _)| word.iter().all(|sym| *sym < alphabet.size())),
            "sample uses symbols outside of its alphabet"
        );
        Self { alphabet, words }
    }

    /// Classifies every word of length at most `max_len` with the given function.
    pub fn exhaustive<F: Fn(&[Symbol]) -> bool>(
        alphabet: Alphabet,
        max_len: usize,
        classify: F,
    ) -> Self {
        let mut words = vec![];
        let mut layer: Vec<Vec<Symbol>> = vec![vec![]];
        for _ in 0..=max_len {
            let mut next = vec![];
            for word in layer {
                for sym in alphabet.universe() {
                    let mut extended = word.clone();
                    extended.push(sym);
                    next.push(extended);
                }
                let classification = classify(&word);
                words.push((word, classification));
            }
            layer = next;
        }
        Self { alphabet, words }
    }

    /// Reads a sample in the format
    /// ```text
    /// <word count> <alphabet size>
    /// <0|1> <length> <symbol> ... <symbol>
    /// ```
    /// where tokens may be separated by arbitrary whitespace.
    pub fn try_from_str(input: &str) -> Result<Self, SampleParseError> {
        let mut tokens = input.split_whitespace();

        let header = |token: Option<&str>| -> Result<usize, SampleParseError> {
            let token = token.ok_or(SampleParseError::MissingHeader)?;
            token
                .parse()
                .map_err(|_| SampleParseError::MalformedHeader(token.to_string()))
        };
        let count = header(tokens.next())?;
        let declared = header(tokens.next())?;
        trace!("sample header declares {count} words over {declared} symbols");
        if declared > MAX_ALPHABET_SIZE {
            return Err(SampleParseError::AlphabetTooLarge {
                declared,
                limit: MAX_ALPHABET_SIZE,
            });
        }

        // the count is not trusted for allocation, missing words are reported below
        let mut raw = vec![];
        for index in 0..count {
            let classification = match tokens.next() {
                Some("1") => true,
                Some("0") => false,
                Some(found) => {
                    return Err(SampleParseError::MalformedClassification {
                        index,
                        found: found.to_string(),
                    })
                }
                None => return Err(SampleParseError::MissingWord { index }),
            };
            let length = tokens
                .next()
                .ok_or(SampleParseError::MissingWord { index })?;
            let length: usize = length
                .parse()
                .map_err(|_| SampleParseError::MalformedLength {
                    index,
                    found: length.to_string(),
                })?;
            let word = tokens.by_ref().take(length).collect_vec();
            if word.len() < length {
                return Err(SampleParseError::TruncatedWord {
                    index,
                    expected: length,
                    found: word.len(),
                });
            }
            raw.push((word, classification));
        }
        if let Some(token) = tokens.next() {
            return Err(SampleParseError::TrailingInput(token.to_string()));
        }

        let mut names: math::Set<String> = raw
            .iter()
            .flat_map(|(word, _)| word.iter().map(|sym| sym.to_string()))
            .collect();
        if names.len() > declared {
            return Err(SampleParseError::AlphabetOverflow {
                declared,
                found: names.len(),
            });
        }
        if names.len() < declared {
            if names.iter().all(|name| name.parse::<u64>().is_ok()) {
                let mut candidate = 0u64;
                while names.len() < declared {
                    names.insert(candidate.to_string());
                    candidate += 1;
                }
            } else {
                debug!(
                    "sample declares {declared} symbols but only {} occur",
                    names.len()
                );
            }
        }

        let alphabet = Alphabet::from_names(names);
        let words = raw
            .into_iter()
            .map(|(word, classification)| {
                let word = word
                    .into_iter()
                    .map(|name| alphabet.symbol(name).expect("every name was collected"))
                    .collect_vec();
                (word, classification)
            })
            .collect();
        Ok(Self { alphabet, words })
    }

    /// Loads the sample stored in the file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SampleError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| SampleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::try_from_str(&input).map_err(|source| SampleError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Iterates over all classified words in the order in which they were given.
    pub fn words(&self) -> impl Iterator<Item = (&[Symbol], bool)> + '_ {
        self.words
            .iter()
            .map(|(word, classification)| (word.as_slice(), *classification))
    }

    /// Gives an iterator over all positive words in the sample.
    pub fn positive_words(&self) -> impl Iterator<Item = &[Symbol]> + '_ {
        self.words()
            .filter_map(|(word, classification)| classification.then_some(word))
    }

    /// Gives an iterator over all negative words in the sample.
    pub fn negative_words(&self) -> impl Iterator<Item = &[Symbol]> + '_ {
        self.words()
            .filter_map(|(word, classification)| (!classification).then_some(word))
    }

    pub fn count_words(&self) -> usize {
        self.words.len()
    }

    pub fn count_positive_words(&self) -> usize {
        self.positive_words().count()
    }

    pub fn count_negative_words(&self) -> usize {
        self.negative_words().count()
    }

    /// Returns the maximum length of any word in the sample, `0` if the sample is empty.
    pub fn max_word_len(&self) -> usize {
        self.words.iter().map(|(w, _)| w.len()).max().unwrap_or(0)
    }
}

impl Display for FiniteSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {}", self.count_words(), self.alphabet.size())?;
        for (word, classification) in self.words() {
            write!(f, "{} {}", u8::from(classification), word.len())?;
            if !word.is_empty() {
                write!(f, " {}", self.alphabet.show_word(word))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FiniteSample, SampleParseError, MAX_ALPHABET_SIZE};

    #[test_log::test]
    fn parse_sample() {
        let sample = FiniteSample::try_from_str("3 2\n0 2 0 1\n1 1 0\n0 1 1\n").unwrap();
        assert_eq!(sample.count_words(), 3);
        assert_eq!(sample.alphabet().size(), 2);
        assert_eq!(sample.count_positive_words(), 1);
        assert_eq!(sample.positive_words().next(), Some([0usize].as_slice()));
        assert_eq!(
            sample.negative_words().map(<[_]>::to_vec).collect::<Vec<_>>(),
            vec![vec![0, 1], vec![1]]
        );
        assert_eq!(sample.to_string(), "3 2\n0 2 0 1\n1 1 0\n0 1 1\n");
    }

    #[test]
    fn tokens_may_span_lines() {
        let sample = FiniteSample::try_from_str("2 2 1 0\n0 3 a\nb a").unwrap();
        assert_eq!(sample.max_word_len(), 3);
        assert_eq!(
            sample
                .words()
                .map(|(word, classification)| (word.to_vec(), classification))
                .collect::<Vec<_>>(),
            vec![(vec![], true), (vec![0, 1, 0], false)]
        );
    }

    #[test]
    fn unused_numeric_symbols_are_filled_in() {
        let sample = FiniteSample::try_from_str("1 3\n1 2 0 0").unwrap();
        assert_eq!(sample.alphabet().size(), 3);
        assert_eq!(sample.alphabet().symbol("2"), Some(2));
    }

    #[test]
    fn malformed_samples() {
        assert_eq!(
            FiniteSample::try_from_str(""),
            Err(SampleParseError::MissingHeader)
        );
        assert_eq!(
            FiniteSample::try_from_str("x 2"),
            Err(SampleParseError::MalformedHeader("x".to_string()))
        );
        assert_eq!(
            FiniteSample::try_from_str("1 2\n2 1 0"),
            Err(SampleParseError::MalformedClassification {
                index: 0,
                found: "2".to_string()
            })
        );
        assert_eq!(
            FiniteSample::try_from_str("2 2\n1 1 0"),
            Err(SampleParseError::MissingWord { index: 1 })
        );
        assert_eq!(
            FiniteSample::try_from_str("1 2\n1 3 0 1"),
            Err(SampleParseError::TruncatedWord {
                index: 0,
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            FiniteSample::try_from_str("1 1\n1 2 0 1"),
            Err(SampleParseError::AlphabetOverflow {
                declared: 1,
                found: 2
            })
        );
        assert_eq!(
            FiniteSample::try_from_str("1 2\n1 1 0 1"),
            Err(SampleParseError::TrailingInput("1".to_string()))
        );
    }

    #[test]
    fn oversized_headers_are_rejected() {
        assert_eq!(
            FiniteSample::try_from_str("18446744073709551615 2\n1 1 0\n"),
            Err(SampleParseError::MissingWord { index: 1 })
        );
        assert_eq!(
            FiniteSample::try_from_str("1 18446744073709551615\n1 1 0\n"),
            Err(SampleParseError::AlphabetTooLarge {
                declared: usize::MAX,
                limit: MAX_ALPHABET_SIZE,
            })
        );
        let input = format!("1 {MAX_ALPHABET_SIZE}\n1 1 0\n");
        let sample = FiniteSample::try_from_str(&input).unwrap();
        assert_eq!(sample.alphabet().size(), MAX_ALPHABET_SIZE);
    }

    #[test]
    fn exhaustive_sample_covers_all_short_words() {
        let alphabet = crate::alphabet::Alphabet::numeric(2);
        let sample = FiniteSample::exhaustive(alphabet, 2, |w| w.len() % 2 == 0);
        assert_eq!(sample.count_words(), 1 + 2 + 4);
        assert_eq!(sample.count_positive_words(), 5);
    }
}
