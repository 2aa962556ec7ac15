//! The discrete-set abstract domain: top, or a finite set of elements.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::AbstractDomain;

/// Caps the cardinality a [`DiscreteSetDomain`] will track exactly before
/// collapsing to top, guaranteeing that repeated `join_with`/`widen_with`
/// over an unboundedly growing set still terminates.
const MAX_TRACKED_ELEMENTS: usize = 32;

/// `top ∨ finite set of elements`. Bottom is the empty set: no value is
/// possible.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiscreteSetDomain<T: Ord + Clone + fmt::Debug + std::hash::Hash> {
    /// Any value is possible.
    Top,
    /// Exactly one of this finite set of elements.
    Set(BTreeSet<T>),
}

impl<T: Ord + Clone + fmt::Debug + std::hash::Hash> DiscreteSetDomain<T> {
    /// The singleton set `{v}`.
    pub fn singleton(v: T) -> Self {
        let mut s = BTreeSet::new();
        s.insert(v);
        DiscreteSetDomain::Set(s)
    }

    /// The elements of this set, or `None` if this value is top.
    pub fn elements(&self) -> Option<&BTreeSet<T>> {
        match self {
            DiscreteSetDomain::Top => None,
            DiscreteSetDomain::Set(s) => Some(s),
        }
    }

    /// Adds `v` to this set. A no-op if this value is already top.
    pub fn insert(&mut self, v: T) {
        if let DiscreteSetDomain::Set(s) = self {
            s.insert(v);
            if s.len() > MAX_TRACKED_ELEMENTS {
                *self = DiscreteSetDomain::Top;
            }
        }
    }
}

impl<T: Ord + Clone + fmt::Debug + std::hash::Hash> AbstractDomain for DiscreteSetDomain<T> {
    fn top() -> Self {
        DiscreteSetDomain::Top
    }

    fn bottom() -> Self {
        DiscreteSetDomain::Set(BTreeSet::new())
    }

    fn is_top(&self) -> bool {
        matches!(self, DiscreteSetDomain::Top)
    }

    fn is_bottom(&self) -> bool {
        matches!(self, DiscreteSetDomain::Set(s) if s.is_empty())
    }

    fn set_to_top(&mut self) {
        *self = DiscreteSetDomain::Top;
    }

    fn set_to_bottom(&mut self) {
        *self = DiscreteSetDomain::bottom();
    }

    fn join_with(&self, other: &Self) -> Self {
        match (self, other) {
            (DiscreteSetDomain::Top, _) | (_, DiscreteSetDomain::Top) => DiscreteSetDomain::Top,
            (DiscreteSetDomain::Set(a), DiscreteSetDomain::Set(b)) => {
                let union: BTreeSet<T> = a.union(b).cloned().collect();
                if union.len() > MAX_TRACKED_ELEMENTS {
                    DiscreteSetDomain::Top
                } else {
                    DiscreteSetDomain::Set(union)
                }
            }
        }
    }

    /// No relational growth-tracking is kept per element, so widening is
    /// the same accelerated union as `join_with`: the cardinality cap is
    /// what guarantees termination instead of a per-element threshold.
    fn widen_with(&self, other: &Self) -> Self {
        self.join_with(other)
    }

    fn meet_with(&self, other: &Self) -> Self {
        match (self, other) {
            (DiscreteSetDomain::Top, x) | (x, DiscreteSetDomain::Top) => x.clone(),
            (DiscreteSetDomain::Set(a), DiscreteSetDomain::Set(b)) => {
                DiscreteSetDomain::Set(a.intersection(b).cloned().collect())
            }
        }
    }

    fn narrow_with(&self, other: &Self) -> Self {
        match self {
            DiscreteSetDomain::Top => other.clone(),
            DiscreteSetDomain::Set(_) => self.clone(),
        }
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (_, DiscreteSetDomain::Top) => true,
            (DiscreteSetDomain::Top, DiscreteSetDomain::Set(_)) => false,
            (DiscreteSetDomain::Set(a), DiscreteSetDomain::Set(b)) => a.is_subset(b),
        }
    }

    fn dump(&self) -> String {
        match self {
            DiscreteSetDomain::Top => "T".to_string(),
            DiscreteSetDomain::Set(s) => {
                format!(
                    "{{{}}}",
                    s.iter().map(|e| format!("{e:?}")).collect::<Vec<_>>().join(", ")
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_union_and_meet_is_intersection() {
        let a = DiscreteSetDomain::Set(BTreeSet::from([1u32, 2, 3]));
        let b = DiscreteSetDomain::Set(BTreeSet::from([2u32, 3, 4]));
        assert_eq!(
            a.join_with(&b),
            DiscreteSetDomain::Set(BTreeSet::from([1, 2, 3, 4]))
        );
        assert_eq!(
            a.meet_with(&b),
            DiscreteSetDomain::Set(BTreeSet::from([2, 3]))
        );
    }

    #[test]
    fn growth_beyond_cap_collapses_to_top() {
        let mut s: DiscreteSetDomain<u32> = DiscreteSetDomain::Set(BTreeSet::new());
        for i in 0..(MAX_TRACKED_ELEMENTS as u32 + 5) {
            s.insert(i);
        }
        assert!(s.is_top());
    }

    #[test]
    fn leq_subset_law() {
        let a = DiscreteSetDomain::Set(BTreeSet::from([1u32]));
        let b = DiscreteSetDomain::Set(BTreeSet::from([1u32, 2]));
        assert!(a.leq(&b));
        assert!(!b.leq(&a));
    }
}
