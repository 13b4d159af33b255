//! Clause patterns for "at most one of these literals is true".
use dfasat_core::math::{ceil_log2, div_ceil, floor_sqrt};
use itertools::Itertools;

use super::writer::{ClauseSink, Literal};
use crate::config::{AtMostOne, GroupCount};

/// Adds the disjunction of `literals`.
pub fn at_least_one<S: ClauseSink>(sink: &mut S, literals: &[Literal]) {
    sink.clause(literals)
}

/// Constrains at most one of `literals` to be true with the given scheme.
pub fn at_most_one<S: ClauseSink>(sink: &mut S, scheme: AtMostOne, literals: &[Literal]) {
    if literals.len() <= 1 {
        return;
    }
    match scheme {
        AtMostOne::Pairwise => pairwise(sink, literals),
        AtMostOne::Binary => binary(sink, literals),
        AtMostOne::Commander(groups) => commander(sink, groups, literals),
        AtMostOne::Product => product(sink, literals),
        AtMostOne::Sequential => sequential(sink, literals),
        AtMostOne::Bimander(groups) => bimander(sink, groups, literals),
    }
}

/// Adds `literals` together with at most one.
pub fn exactly_one<S: ClauseSink>(sink: &mut S, scheme: AtMostOne, literals: &[Literal]) {
    at_least_one(sink, literals);
    at_most_one(sink, scheme, literals);
}

fn pairwise<S: ClauseSink>(sink: &mut S, literals: &[Literal]) {
    for (first, second) in literals.iter().tuple_combinations() {
        sink.clause(&[-first, -second]);
    }
}

/// Makes `literal` imply the binary representation of `index` on `bits`.
fn binary_code<S: ClauseSink>(sink: &mut S, literal: Literal, index: usize, bits: &[Literal]) {
    for (position, bit) in bits.iter().enumerate() {
        let bit = if index & (1 << position) != 0 {
            *bit
        } else {
            -bit
        };
        sink.clause(&[-literal, bit]);
    }
}

fn binary<S: ClauseSink>(sink: &mut S, literals: &[Literal]) {
    let bits = (0..ceil_log2(literals.len()))
        .map(|_| sink.fresh())
        .collect_vec();
    for (index, literal) in literals.iter().enumerate() {
        binary_code(sink, *literal, index, &bits);
    }
}

fn commander<S: ClauseSink>(sink: &mut S, groups: GroupCount, literals: &[Literal]) {
    let size = div_ceil(literals.len(), groups.groups(literals.len()));
    let mut commanders = vec![];
    for group in literals.chunks(size) {
        let commander = sink.fresh();
        let mut members = group.to_vec();
        sink.clause(&members.iter().copied().chain([-commander]).collect_vec());
        members.push(-commander);
        pairwise(sink, &members);
        commanders.push(commander);
    }
    pairwise(sink, &commanders);
}

fn product<S: ClauseSink>(sink: &mut S, literals: &[Literal]) {
    let rows = floor_sqrt(literals.len());
    let columns = div_ceil(literals.len(), rows);
    let row_vars = (0..rows).map(|_| sink.fresh()).collect_vec();
    let column_vars = (0..columns).map(|_| sink.fresh()).collect_vec();
    pairwise(sink, &row_vars);
    pairwise(sink, &column_vars);
    for (index, literal) in literals.iter().enumerate() {
        sink.clause(&[-literal, row_vars[index % rows]]);
        sink.clause(&[-literal, column_vars[index / rows]]);
    }
}

fn sequential<S: ClauseSink>(sink: &mut S, literals: &[Literal]) {
    let n = literals.len();
    let counters = (0..n - 1).map(|_| sink.fresh()).collect_vec();
    sink.clause(&[-literals[0], counters[0]]);
    for i in 1..n - 1 {
        sink.clause(&[-literals[i], counters[i]]);
        sink.clause(&[-counters[i - 1], counters[i]]);
        sink.clause(&[-literals[i], -counters[i - 1]]);
    }
    sink.clause(&[-literals[n - 1], -counters[n - 2]]);
}

fn bimander<S: ClauseSink>(sink: &mut S, groups: GroupCount, literals: &[Literal]) {
    let size = div_ceil(literals.len(), groups.groups(literals.len()));
    let chunks = literals.chunks(size).collect_vec();
    let bits = (0..ceil_log2(chunks.len()))
        .map(|_| sink.fresh())
        .collect_vec();
    for (index, group) in chunks.into_iter().enumerate() {
        pairwise(sink, group);
        for literal in group {
            binary_code(sink, *literal, index, &bits);
        }
    }
}
