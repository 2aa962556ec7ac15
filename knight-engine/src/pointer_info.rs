//! The points-to/alias domain: tracks, per pointer variable, the set of
//! regions it may point to and the set of variables it may alias.
//!
//! Unlike a uniform [`crate::map_domain::MapDomain`], the two maps combine
//! with *different* value-level operators on join: points-to sets grow by
//! union (more paths, more possible targets), while alias sets shrink by
//! intersection (an alias relationship only survives a join if it held on
//! every incoming path).

use std::collections::BTreeSet;

use knight_region::RegionId;

use crate::domain::AbstractDomain;
use crate::discrete_set::DiscreteSetDomain;
use crate::linear::VarId;
use crate::map_domain::MapDomain;

/// Points-to/alias information, keyed by pointer variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PointerInfoDomain {
    points_to: MapDomain<VarId, DiscreteSetDomain<RegionId>>,
    aliases: MapDomain<VarId, DiscreteSetDomain<VarId>>,
}

impl PointerInfoDomain {
    /// The empty (top) domain.
    pub fn new() -> Self {
        PointerInfoDomain {
            points_to: MapDomain::new(),
            aliases: MapDomain::new(),
        }
    }

    /// The regions `v` may point to (top if untracked).
    pub fn points_to(&self, v: VarId) -> DiscreteSetDomain<RegionId> {
        self.points_to.get(&v)
    }

    /// The variables `v` may alias (top if untracked).
    pub fn aliases(&self, v: VarId) -> DiscreteSetDomain<VarId> {
        self.aliases.get(&v)
    }

    /// Records that `v` points to exactly `region` (a fresh assignment).
    pub fn set_points_to(&mut self, v: VarId, region: RegionId) {
        self.points_to.set(v, DiscreteSetDomain::singleton(region));
    }

    /// Adds `region` to `v`'s points-to set without discarding existing
    /// targets (a conservative weak update).
    pub fn add_points_to(&mut self, v: VarId, region: RegionId) {
        let mut current = self.points_to.get(&v);
        current.insert(region);
        self.points_to.set(v, current);
    }

    /// Records that `x` and `y` alias each other (the `x = y` case).
    pub fn set_aliased(&mut self, x: VarId, y: VarId) {
        let mut x_aliases = self.aliases.get(&x);
        x_aliases.insert(y);
        self.aliases.set(x, x_aliases);
        let mut y_aliases = self.aliases.get(&y);
        y_aliases.insert(x);
        self.aliases.set(y, y_aliases);
    }
}

impl Default for PointerInfoDomain {
    fn default() -> Self {
        PointerInfoDomain::new()
    }
}

impl AbstractDomain for PointerInfoDomain {
    fn top() -> Self {
        PointerInfoDomain::new()
    }

    fn bottom() -> Self {
        PointerInfoDomain {
            points_to: MapDomain::bottom(),
            aliases: MapDomain::bottom(),
        }
    }

    fn is_top(&self) -> bool {
        self.points_to.is_top() && self.aliases.is_top()
    }

    fn is_bottom(&self) -> bool {
        self.points_to.is_bottom() || self.aliases.is_bottom()
    }

    fn set_to_top(&mut self) {
        *self = PointerInfoDomain::top();
    }

    fn set_to_bottom(&mut self) {
        *self = PointerInfoDomain::bottom();
    }

    /// Points-to sets join by union, alias sets join by intersection — the
    /// two maps cannot share `MapDomain::join_with`'s uniform combine, so
    /// each is folded by hand over the key intersection (a key absent on
    /// either side is locally top, and `top` is the identity for both
    /// union and intersection only in the points-to case; for alias sets a
    /// key missing on one side means "unconstrained there", which is also
    /// the union's identity, so both maps drop keys missing from either
    /// side exactly like `MapDomain::join_with` does for the key set, but
    /// recombine their *values* with `join_with`/`meet_with` respectively).
    fn join_with(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let points_to = combine_on_shared_keys(&self.points_to, &other.points_to, |a, b| {
            a.join_with(b)
        });
        let aliases = combine_on_shared_keys(&self.aliases, &other.aliases, |a, b| a.meet_with(b));
        PointerInfoDomain { points_to, aliases }
    }

    fn widen_with(&self, other: &Self) -> Self {
        self.join_with(other)
    }

    fn meet_with(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return PointerInfoDomain::bottom();
        }
        PointerInfoDomain {
            points_to: self.points_to.meet_with(&other.points_to),
            aliases: self.aliases.meet_with(&other.aliases),
        }
    }

    fn narrow_with(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return PointerInfoDomain::bottom();
        }
        PointerInfoDomain {
            points_to: self.points_to.narrow_with(&other.points_to),
            aliases: self.aliases.narrow_with(&other.aliases),
        }
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        self.points_to.leq(&other.points_to) && self.aliases.leq(&other.aliases)
    }

    fn dump(&self) -> String {
        format!(
            "{{points_to: {}, aliases: {}}}",
            self.points_to.dump(),
            self.aliases.dump()
        )
    }
}

/// Combines two maps by applying `combine` to each key present in both,
/// dropping keys present in only one (an absent key denotes top, and the
/// result below is only ever used where top is the identity for both
/// `combine`s this module passes in).
fn combine_on_shared_keys<V: AbstractDomain>(
    a: &MapDomain<VarId, V>,
    b: &MapDomain<VarId, V>,
    combine: impl Fn(&V, &V) -> V,
) -> MapDomain<VarId, V> {
    let b_keys: BTreeSet<VarId> = b.entries().map(|(k, _)| *k).collect();
    let entries = a
        .entries()
        .filter(|(k, _)| b_keys.contains(k))
        .map(|(k, v)| (*k, combine(v, &b.get(k))));
    MapDomain::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use knight_num::Signedness;
    use knight_region::{DeclId, RegionManager, StackFrameId, ValueType};

    fn int_ty() -> ValueType {
        ValueType::integer(32, Signedness::Signed)
    }

    fn two_regions() -> (RegionId, RegionId) {
        let mut mgr = RegionManager::new();
        let space = mgr.stack_local_space(StackFrameId(0));
        let a = mgr.var_region(DeclId(1), space, int_ty());
        let b = mgr.var_region(DeclId(2), space, int_ty());
        (a, b)
    }

    #[test]
    fn points_to_join_is_union() {
        let (r1, r2) = two_regions();
        let p = VarId(0);
        let mut then_dom = PointerInfoDomain::new();
        then_dom.set_points_to(p, r1);
        let mut else_dom = PointerInfoDomain::new();
        else_dom.set_points_to(p, r2);

        let joined = then_dom.join_with(&else_dom);
        let targets = joined.points_to(p);
        let elements = targets.elements().expect("tracked set, not top");
        assert!(elements.contains(&r1));
        assert!(elements.contains(&r2));
    }

    #[test]
    fn alias_join_is_intersection() {
        let p = VarId(0);
        let q = VarId(1);
        let r = VarId(2);
        let mut then_dom = PointerInfoDomain::new();
        then_dom.set_aliased(p, q);
        then_dom.set_aliased(p, r);
        let mut else_dom = PointerInfoDomain::new();
        else_dom.set_aliased(p, q);

        let joined = then_dom.join_with(&else_dom);
        let aliases = joined.aliases(p);
        let elements = aliases.elements().expect("tracked set, not top");
        assert!(elements.contains(&q));
        assert!(!elements.contains(&r));
    }

    #[test]
    fn leq_and_meet_lattice_laws() {
        let (r1, r2) = two_regions();
        let p = VarId(0);
        let mut a = PointerInfoDomain::new();
        a.set_points_to(p, r1);
        let mut b = PointerInfoDomain::new();
        b.set_points_to(p, r1);
        b.set_points_to(VarId(9), r2);
        assert!(a.leq(&a.join_with(&b)));
        assert!(a.meet_with(&b).leq(&a));
    }
}
