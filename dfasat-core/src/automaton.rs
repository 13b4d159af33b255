use std::collections::VecDeque;

use itertools::Itertools;

use crate::{
    alphabet::{Alphabet, Symbol},
    apta::Status,
    dot::{DotStateAttribute, DotTransitionAttribute, Dottable},
    math::{OrderedMap, OrderedSet},
    sample::FiniteSample,
};

/// A state of an [`Automaton`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomatonState {
    status: Status,
    successors: Vec<Option<usize>>,
}

impl AutomatonState {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn successor(&self, symbol: Symbol) -> Option<usize> {
        self.successors.get(symbol).copied().flatten()
    }
}

/// A deterministic finite automaton with states `0..size`, state `0` is initial.
///
/// States carry a [`Status`], words that end in an accepting state are accepted and all
/// others are rejected. Some states may be designated sinks, these loop on every symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    alphabet: Alphabet,
    states: Vec<AutomatonState>,
    sinks: OrderedSet<usize>,
}

impl Automaton {
    /// Creates an automaton with `size` states that have neither a status nor transitions.
    pub fn new(alphabet: Alphabet, size: usize) -> Self {
        let states = (0..size)
            .map(|_| AutomatonState {
                status: Status::Common,
                successors: vec![None; alphabet.size()],
            })
            .collect();
        Self {
            alphabet,
            states,
            sinks: OrderedSet::new(),
        }
    }

    /// Appends a sink state with the given status and returns its index.
    pub fn add_sink(&mut self, status: Status) -> usize {
        let sink = self.states.len();
        self.states.push(AutomatonState {
            status,
            successors: vec![Some(sink); self.alphabet.size()],
        });
        self.sinks.insert(sink);
        sink
    }

    pub fn set_status(&mut self, state: usize, status: Status) {
        self.states[state].status = status;
    }

    pub fn set_transition(&mut self, source: usize, symbol: Symbol, target: usize) {
        debug_assert!(target < self.states.len(), "target {target} does not exist");
        self.states[source].successors[symbol] = Some(target);
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn size(&self) -> usize {
        self.states.len()
    }

    pub fn initial(&self) -> usize {
        0
    }

    pub fn states(&self) -> &[AutomatonState] {
        &self.states
    }

    pub fn sinks(&self) -> &OrderedSet<usize> {
        &self.sinks
    }

    pub fn is_sink(&self, state: usize) -> bool {
        self.sinks.contains(&state)
    }

    pub fn status(&self, state: usize) -> Status {
        self.states[state].status
    }

    pub fn successor(&self, state: usize, symbol: Symbol) -> Option<usize> {
        self.states.get(state).and_then(|q| q.successor(symbol))
    }

    /// Whether every state has a successor on every symbol.
    pub fn is_complete(&self) -> bool {
        self.states
            .iter()
            .all(|state| state.successors.iter().all(Option::is_some))
    }

    /// Returns the state reached by reading `word` from the initial state, if the run does
    /// not leave the automaton through a missing transition.
    pub fn run(&self, word: &[Symbol]) -> Option<usize> {
        word.iter()
            .try_fold(self.initial(), |state, symbol| self.successor(state, *symbol))
    }

    /// Classifies `word`, gives `None` if the run on it is undefined.
    pub fn classify(&self, word: &[Symbol]) -> Option<bool> {
        self.run(word)
            .map(|state| self.states[state].status.is_accepting())
    }

    pub fn accepts(&self, word: &[Symbol]) -> bool {
        self.classify(word).unwrap_or(false)
    }

    /// The words of `sample` on which the automaton disagrees with the sample.
    pub fn misclassified<'a>(
        &'a self,
        sample: &'a FiniteSample,
    ) -> impl Iterator<Item = &'a [Symbol]> + 'a {
        sample
            .words()
            .filter(|(word, accepted)| self.accepts(word) != *accepted)
            .map(|(word, _)| word)
    }

    /// Whether every word of `sample` is classified as the sample prescribes.
    pub fn is_consistent_with(&self, sample: &FiniteSample) -> bool {
        self.misclassified(sample).next().is_none()
    }

    /// Computes a representation of the reachable part of the automaton that does not depend
    /// on the numbering of states. States are renumbered in the order in which a breadth-first
    /// search from the initial state discovers them, exploring symbols in ascending order.
    /// Two automata have the same signature iff their reachable parts are isomorphic.
    pub fn canonical_signature(&self) -> Vec<(bool, Vec<Option<usize>>)> {
        let mut number: OrderedMap<usize, usize> = OrderedMap::new();
        let mut order = vec![self.initial()];
        number.insert(self.initial(), 0);
        let mut queue = VecDeque::from([self.initial()]);
        while let Some(state) = queue.pop_front() {
            for symbol in self.alphabet.universe() {
                if let Some(target) = self.successor(state, symbol) {
                    if !number.contains_key(&target) {
                        number.insert(target, order.len());
                        order.push(target);
                        queue.push_back(target);
                    }
                }
            }
        }
        order
            .into_iter()
            .map(|state| {
                let successors = self
                    .alphabet
                    .universe()
                    .map(|symbol| self.successor(state, symbol).map(|t| number[&t]))
                    .collect_vec();
                (self.states[state].status.is_accepting(), successors)
            })
            .collect()
    }
}

impl Dottable for Automaton {
    fn dot_name(&self) -> String {
        "Automat".to_string()
    }

    fn dot_states(&self) -> Vec<(String, Vec<DotStateAttribute>)> {
        (0..self.size())
            .map(|state| {
                let mut attributes = vec![];
                if state == self.initial() {
                    attributes.push(DotStateAttribute::Style("bold".to_string()));
                }
                if self.status(state).is_accepting() {
                    attributes.push(DotStateAttribute::Peripheries(2));
                }
                if self.is_sink(state) {
                    attributes.push(DotStateAttribute::Shape("square".to_string()));
                }
                (state.to_string(), attributes)
            })
            .collect()
    }

    fn dot_transitions(&self) -> Vec<(String, String, Vec<DotTransitionAttribute>)> {
        (0..self.size())
            .flat_map(|state| {
                self.alphabet.universe().filter_map(move |symbol| {
                    self.successor(state, symbol).map(|target| {
                        (
                            state.to_string(),
                            target.to_string(),
                            vec![DotTransitionAttribute::Label(
                                self.alphabet.name(symbol).unwrap_or("?").to_string(),
                            )],
                        )
                    })
                })
            })
            .collect()
    }
}
