use dfasat_core::apta::NodeId;
use itertools::Itertools;

use super::{
    variables::VariableLayout,
    writer::{ClauseSink, Literal},
};

/// Number of labelled vertices that may be wrong, `percent` of `ends` rounded to the nearest
/// integer.
pub fn tolerated_errors(ends: usize, percent: u8) -> usize {
    ((ends * usize::from(percent) + 50) / 100).min(ends)
}

/// Marks exactly `errors` of the vertices in `ends` as wrong through their error variables.
///
/// Every error slot `q` points at one position of `ends` with a unary counter `o[q][_]`,
/// where `o[q][i]` holds iff the position is at least `i`. Positions of consecutive slots
/// strictly increase, so the slots mark distinct vertices and are not interchangeable.
pub fn limit_errors<S: ClauseSink>(
    sink: &mut S,
    layout: &VariableLayout,
    ends: &[NodeId],
    errors: usize,
) {
    let errors_of = ends
        .iter()
        .map(|end| {
            layout
                .error(*end)
                .expect("every labelled vertex has an error variable")
        })
        .collect_vec();
    if errors == 0 {
        for error in errors_of {
            sink.unit(-error);
        }
        return;
    }

    let len = ends.len();
    let mut counters: Vec<Vec<Literal>> = vec![];
    let mut positions: Vec<Vec<Literal>> = vec![];
    for _ in 0..errors {
        let counter = (0..=len).map(|_| sink.fresh()).collect_vec();
        sink.unit(counter[0]);
        sink.unit(-counter[len]);
        for i in 1..=len {
            sink.clause(&[-counter[i], counter[i - 1]]);
        }

        let position = (0..len).map(|_| sink.fresh()).collect_vec();
        for i in 0..len {
            sink.clause(&[-position[i], counter[i]]);
            sink.clause(&[-position[i], -counter[i + 1]]);
            sink.clause(&[position[i], -counter[i], counter[i + 1]]);
        }
        counters.push(counter);
        positions.push(position);
    }

    for (earlier, later) in counters.iter().tuple_windows() {
        for i in 0..len {
            sink.clause(&[-earlier[i], later[i + 1]]);
        }
    }

    for (i, error) in errors_of.into_iter().enumerate() {
        let marking = positions.iter().map(|position| position[i]).collect_vec();
        sink.clause(&std::iter::once(-error).chain(marking.iter().copied()).collect_vec());
        for mark in marking {
            sink.clause(&[error, -mark]);
        }
    }
}
