use std::collections::{BTreeMap, BTreeSet};

pub use indexmap::map;
pub use indexmap::set;

/// Type alias for sets whose iteration order is the order of the elements.
pub type OrderedSet<S> = BTreeSet<S>;
/// Type alias for sets that keep insertion order.
pub type Set<S> = indexmap::IndexSet<S>;

/// Type alias for maps whose iteration order is the order of the keys.
pub type OrderedMap<K, V> = BTreeMap<K, V>;
/// Type alias for maps that keep insertion order.
pub type Map<K, V> = indexmap::IndexMap<K, V>;

/// Represents a bijective mapping between `L` and `R`, that is a mapping which associates
/// each `L` with precisely one `R` and vice versa.
pub type Bijection<L, R> = bimap::BiBTreeMap<L, R>;

/// Number of bits needed to distinguish `n` different values, so `ceil(log2(n))`.
/// Zero and one value need no bits at all.
pub fn ceil_log2(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }
}

/// Computes `ceil(sqrt(n))` without going through floating point.
pub fn ceil_sqrt(n: usize) -> usize {
    let mut root = 0;
    while root * root < n {
        root += 1;
    }
    root
}

/// Computes `floor(sqrt(n))`.
pub fn floor_sqrt(n: usize) -> usize {
    let root = ceil_sqrt(n);
    if root * root > n {
        root - 1
    } else {
        root
    }
}

/// Divides and rounds up, `n` and `d` are assumed to be non-negative and `d` non-zero.
pub fn div_ceil(n: usize, d: usize) -> usize {
    debug_assert!(d > 0, "division by zero");
    (n + d - 1) / d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logarithms_round_up() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(1024), 10);
        assert_eq!(ceil_log2(1025), 11);
    }

    #[test]
    fn square_roots() {
        assert_eq!(ceil_sqrt(0), 0);
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(2), 2);
        assert_eq!(ceil_sqrt(9), 3);
        assert_eq!(ceil_sqrt(10), 4);
        assert_eq!(floor_sqrt(10), 3);
        assert_eq!(floor_sqrt(16), 4);
        assert_eq!(floor_sqrt(2), 1);
        assert_eq!(div_ceil(7, 3), 3);
        assert_eq!(div_ceil(6, 3), 2);
    }
}
