//! A generic `Key → SeparateValue` abstract domain.
//!
//! Absence of a key denotes top for that key: a map domain with no entries
//! at all *is* top, not bottom. Bottom is tracked as an explicit flag, the
//! same way [`knight_num::Interval`] tracks top/bottom structurally rather
//! than by special-casing an empty map.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::AbstractDomain;

/// A non-relational map from `K` to an abstract value `V`, independent per
/// key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MapDomain<K: Ord + Clone + fmt::Debug + std::hash::Hash, V: AbstractDomain> {
    values: BTreeMap<K, V>,
    bottom: bool,
}

impl<K: Ord + Clone + fmt::Debug + std::hash::Hash, V: AbstractDomain> MapDomain<K, V> {
    /// The empty map: top (every key maps to top).
    pub fn new() -> Self {
        MapDomain {
            values: BTreeMap::new(),
            bottom: false,
        }
    }

    /// The value bound to `k`, or `V::top()` if `k` has no entry.
    pub fn get(&self, k: &K) -> V {
        self.values.get(k).cloned().unwrap_or_else(V::top)
    }

    /// Binds `k` to `v`. Binding to top removes the entry (an absent key
    /// already denotes top); binding to bottom forces the whole map to
    /// bottom, matching the domain interface's "any domain value is
    /// bottom ⇒ state is bottom" convention one level down.
    pub fn set(&mut self, k: K, v: V) {
        if v.is_bottom() {
            self.set_to_bottom();
        } else if v.is_top() {
            self.values.remove(&k);
        } else {
            self.values.insert(k, v);
        }
    }

    /// Removes any binding for `k`, reverting it to top.
    pub fn remove(&mut self, k: &K) {
        self.values.remove(k);
    }

    /// The keys with a binding other than top, plus their values.
    pub fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.values.iter()
    }

    /// Builds a map domain directly from `(key, value)` pairs (all implied
    /// non-top, non-bottom entries), for domains that need to construct one
    /// from a custom combine rather than via repeated `set`.
    pub fn from_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut m = MapDomain::new();
        for (k, v) in entries {
            m.set(k, v);
        }
        m
    }
}

impl<K: Ord + Clone + fmt::Debug + std::hash::Hash, V: AbstractDomain> Default for MapDomain<K, V> {
    fn default() -> Self {
        MapDomain::new()
    }
}

impl<K: Ord + Clone + fmt::Debug + std::hash::Hash, V: AbstractDomain> AbstractDomain
    for MapDomain<K, V>
{
    fn top() -> Self {
        MapDomain::new()
    }

    fn bottom() -> Self {
        MapDomain {
            values: BTreeMap::new(),
            bottom: true,
        }
    }

    fn is_top(&self) -> bool {
        !self.bottom && self.values.is_empty()
    }

    fn is_bottom(&self) -> bool {
        self.bottom
    }

    fn set_to_top(&mut self) {
        *self = MapDomain::top();
    }

    fn set_to_bottom(&mut self) {
        *self = MapDomain::bottom();
    }

    /// Keys present in only one operand are top on the other side, and
    /// `top ∨ v = top`, so the joined map keeps only keys present in both
    /// (dropping the rest back to their implicit top).
    fn join_with(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut out = MapDomain::new();
        for (k, v) in self.values.iter() {
            if let Some(ov) = other.values.get(k) {
                out.set(k.clone(), v.join_with(ov));
            }
        }
        out
    }

    fn widen_with(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut out = MapDomain::new();
        for (k, v) in self.values.iter() {
            if let Some(ov) = other.values.get(k) {
                out.set(k.clone(), v.widen_with(ov));
            }
        }
        out
    }

    /// A key absent on one side denotes top there, and `top ∧ v = v`, so
    /// the meet keeps the union of keys, combining shared keys and
    /// carrying unique keys through untouched.
    fn meet_with(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return MapDomain::bottom();
        }
        let mut out = self.clone();
        for (k, v) in other.values.iter() {
            match self.values.get(k) {
                Some(sv) => out.set(k.clone(), sv.meet_with(v)),
                None => out.set(k.clone(), v.clone()),
            }
        }
        if out.values.values().any(V::is_bottom) {
            return MapDomain::bottom();
        }
        out
    }

    fn narrow_with(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return MapDomain::bottom();
        }
        let mut out = self.clone();
        for (k, v) in other.values.iter() {
            match self.values.get(k) {
                Some(sv) => out.set(k.clone(), sv.narrow_with(v)),
                None => out.set(k.clone(), v.clone()),
            }
        }
        out
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        other
            .values
            .iter()
            .all(|(k, ov)| self.get(k).leq(ov))
    }

    fn dump(&self) -> String {
        if self.is_bottom() {
            return "_|_".to_string();
        }
        let mut parts: Vec<String> = self
            .values
            .iter()
            .map(|(k, v)| format!("{k:?} -> {}", v.dump()))
            .collect();
        parts.sort();
        format!("{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knight_num::{Bound, Interval};

    fn iv(lb: i64, ub: i64) -> Interval<i64> {
        Interval::new(Bound::finite(lb), Bound::finite(ub))
    }

    #[test]
    fn empty_map_is_top() {
        let m: MapDomain<u32, Interval<i64>> = MapDomain::new();
        assert!(m.is_top());
        assert_eq!(m.get(&0), Interval::top());
    }

    #[test]
    fn meet_inserts_the_other_sides_value_for_a_locally_absent_key() {
        let mut a: MapDomain<u32, Interval<i64>> = MapDomain::new();
        a.set(0, iv(1, 5));
        let mut b: MapDomain<u32, Interval<i64>> = MapDomain::new();
        b.set(1, iv(2, 9));
        let m = a.meet_with(&b);
        assert_eq!(m.get(&0), iv(1, 5));
        assert_eq!(m.get(&1), iv(2, 9));
    }

    #[test]
    fn join_drops_a_key_absent_on_either_side() {
        let mut a: MapDomain<u32, Interval<i64>> = MapDomain::new();
        a.set(0, iv(1, 5));
        let b: MapDomain<u32, Interval<i64>> = MapDomain::new();
        let j = a.join_with(&b);
        assert!(j.get(&0).is_top());
    }

    #[test]
    fn leq_and_join_lattice_laws() {
        let mut a: MapDomain<u32, Interval<i64>> = MapDomain::new();
        a.set(0, iv(1, 5));
        let mut b: MapDomain<u32, Interval<i64>> = MapDomain::new();
        b.set(0, iv(3, 9));
        assert!(a.leq(&a.join_with(&b)));
        assert!(a.meet_with(&b).leq(&a));
    }
}
