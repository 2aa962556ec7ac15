//! The uniform abstract-domain interface and the closed sum type
//! enumerating the concrete domains `ProgramState` carries.
//!
//! A CRTP/downcast-style domain hierarchy is replaced with a trait (this
//! module) plus a closed sum type ([`DomainValue`]) rather than trait
//! objects, since the set of domains this engine ships is fixed and not
//! meant to be extended by a downstream checker crate.

use std::fmt;

use knight_num::Interval;

use crate::pointer_info::PointerInfoDomain;
use crate::separate_numerical::SeparateNumericalDomain;

/// The lattice operations every abstract domain in this engine supports.
pub trait AbstractDomain: Clone + PartialEq + Eq + std::hash::Hash + fmt::Debug {
    /// The top (least precise, "anything goes") element.
    fn top() -> Self;
    /// The bottom (unreachable/infeasible) element.
    fn bottom() -> Self;
    /// `true` iff this value is exactly top.
    fn is_top(&self) -> bool;
    /// `true` iff this value is bottom.
    fn is_bottom(&self) -> bool;
    /// Overwrites this value with top.
    fn set_to_top(&mut self);
    /// Overwrites this value with bottom.
    fn set_to_bottom(&mut self);
    /// Least upper bound.
    fn join_with(&self, other: &Self) -> Self;
    /// Widening: an accelerated join that guarantees termination.
    fn widen_with(&self, other: &Self) -> Self;
    /// Greatest lower bound.
    fn meet_with(&self, other: &Self) -> Self;
    /// Narrowing: refines an over-approximation back toward `other`.
    fn narrow_with(&self, other: &Self) -> Self;
    /// `true` iff `self` is at least as precise as (below or equal to,
    /// in the lattice order) `other`.
    fn leq(&self, other: &Self) -> bool;
    /// Structural (lattice) equality.
    fn equals(&self, other: &Self) -> bool {
        self.leq(other) && other.leq(self)
    }
    /// Puts this value into its canonical representation. Most domains
    /// have none beyond what their constructors already guarantee; the
    /// default is a no-op.
    fn normalize(&mut self) {}
    /// A human-readable rendering, for diagnostics/tracing.
    fn dump(&self) -> String {
        format!("{self:?}")
    }
}

impl<N: knight_num::IntervalNum + std::hash::Hash + fmt::Display> AbstractDomain for Interval<N> {
    fn top() -> Self {
        Interval::top()
    }
    fn bottom() -> Self {
        Interval::bottom()
    }
    fn is_top(&self) -> bool {
        Interval::is_top(self)
    }
    fn is_bottom(&self) -> bool {
        Interval::is_bottom(self)
    }
    fn set_to_top(&mut self) {
        Interval::set_to_top(self)
    }
    fn set_to_bottom(&mut self) {
        Interval::set_to_bottom(self)
    }
    fn join_with(&self, other: &Self) -> Self {
        Interval::join_with(self, other)
    }
    fn widen_with(&self, other: &Self) -> Self {
        Interval::widen_with(self, other)
    }
    fn meet_with(&self, other: &Self) -> Self {
        Interval::meet_with(self, other)
    }
    fn narrow_with(&self, other: &Self) -> Self {
        Interval::narrow_with(self, other)
    }
    fn leq(&self, other: &Self) -> bool {
        Interval::leq(self, other)
    }
    fn equals(&self, other: &Self) -> bool {
        Interval::equals(self, other)
    }
    fn dump(&self) -> String {
        format!("{self}")
    }
}

/// Additional operations exposed by a numerical domain: the
/// assignment/constraint API the symbol resolver and branch-condition
/// filtering drive through the event bus. Implemented by
/// [`crate::separate_numerical::SeparateNumericalDomain`], this engine's
/// one numerical domain.
pub trait NumericalDomain: AbstractDomain {
    /// Threshold widening: stop at `threshold` rather than jumping
    /// unboundedly to infinity.
    fn widen_with_threshold(&self, other: &Self, threshold: &knight_num::BigInt) -> Self;
    /// Threshold narrowing, the precision-recovering counterpart.
    fn narrow_with_threshold(&self, other: &Self, threshold: &knight_num::BigInt) -> Self;
}

/// Indexes the statically-known set of domains a [`crate::state::ProgramState`]
/// may carry. Closed and small by design.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum::EnumIter)]
pub enum DomId {
    /// The (non-relational) interval domain over program variables.
    Interval,
    /// The points-to/alias map domain.
    PointerInfo,
}

/// The closed sum type of concrete domain values a [`crate::state::ProgramState`]
/// can hold at a given [`DomId`] slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DomainValue {
    /// See [`crate::separate_numerical::SeparateNumericalDomain`].
    Interval(SeparateNumericalDomain),
    /// See [`crate::pointer_info::PointerInfoDomain`].
    PointerInfo(PointerInfoDomain),
}

impl DomainValue {
    /// This value's [`DomId`].
    pub fn dom_id(&self) -> DomId {
        match self {
            DomainValue::Interval(_) => DomId::Interval,
            DomainValue::PointerInfo(_) => DomId::PointerInfo,
        }
    }

    /// The top element for the given [`DomId`]'s concrete domain.
    pub fn top_for(id: DomId) -> DomainValue {
        match id {
            DomId::Interval => DomainValue::Interval(SeparateNumericalDomain::top()),
            DomId::PointerInfo => DomainValue::PointerInfo(PointerInfoDomain::top()),
        }
    }

    /// The inner interval domain, if this value is the `Interval` variant.
    pub fn as_interval(&self) -> Option<&SeparateNumericalDomain> {
        match self {
            DomainValue::Interval(d) => Some(d),
            _ => None,
        }
    }

    /// The inner interval domain, mutably, if this value is the `Interval`
    /// variant.
    pub fn as_interval_mut(&mut self) -> Option<&mut SeparateNumericalDomain> {
        match self {
            DomainValue::Interval(d) => Some(d),
            _ => None,
        }
    }

    /// The inner pointer-info domain, if this value is the `PointerInfo`
    /// variant.
    pub fn as_pointer_info(&self) -> Option<&PointerInfoDomain> {
        match self {
            DomainValue::PointerInfo(d) => Some(d),
            _ => None,
        }
    }
}

impl AbstractDomain for DomainValue {
    fn top() -> Self {
        // A `DomainValue` is never constructed without knowing its `DomId`
        // (see `top_for`); this default only exists to satisfy the trait
        // and is never reached by `ProgramState`, which always threads an
        // explicit `DomId` through.
        DomainValue::Interval(SeparateNumericalDomain::top())
    }
    fn bottom() -> Self {
        DomainValue::Interval(SeparateNumericalDomain::bottom())
    }
    fn is_top(&self) -> bool {
        match self {
            DomainValue::Interval(d) => d.is_top(),
            DomainValue::PointerInfo(d) => d.is_top(),
        }
    }
    fn is_bottom(&self) -> bool {
        match self {
            DomainValue::Interval(d) => d.is_bottom(),
            DomainValue::PointerInfo(d) => d.is_bottom(),
        }
    }
    fn set_to_top(&mut self) {
        match self {
            DomainValue::Interval(d) => d.set_to_top(),
            DomainValue::PointerInfo(d) => d.set_to_top(),
        }
    }
    fn set_to_bottom(&mut self) {
        match self {
            DomainValue::Interval(d) => d.set_to_bottom(),
            DomainValue::PointerInfo(d) => d.set_to_bottom(),
        }
    }
    fn join_with(&self, other: &Self) -> Self {
        match (self, other) {
            (DomainValue::Interval(a), DomainValue::Interval(b)) => {
                DomainValue::Interval(a.join_with(b))
            }
            (DomainValue::PointerInfo(a), DomainValue::PointerInfo(b)) => {
                DomainValue::PointerInfo(a.join_with(b))
            }
            _ => panic!("join_with across mismatched DomainValue variants"),
        }
    }
    fn widen_with(&self, other: &Self) -> Self {
        match (self, other) {
            (DomainValue::Interval(a), DomainValue::Interval(b)) => {
                DomainValue::Interval(a.widen_with(b))
            }
            (DomainValue::PointerInfo(a), DomainValue::PointerInfo(b)) => {
                DomainValue::PointerInfo(a.widen_with(b))
            }
            _ => panic!("widen_with across mismatched DomainValue variants"),
        }
    }
    fn meet_with(&self, other: &Self) -> Self {
        match (self, other) {
            (DomainValue::Interval(a), DomainValue::Interval(b)) => {
                DomainValue::Interval(a.meet_with(b))
            }
            (DomainValue::PointerInfo(a), DomainValue::PointerInfo(b)) => {
                DomainValue::PointerInfo(a.meet_with(b))
            }
            _ => panic!("meet_with across mismatched DomainValue variants"),
        }
    }
    fn narrow_with(&self, other: &Self) -> Self {
        match (self, other) {
            (DomainValue::Interval(a), DomainValue::Interval(b)) => {
                DomainValue::Interval(a.narrow_with(b))
            }
            (DomainValue::PointerInfo(a), DomainValue::PointerInfo(b)) => {
                DomainValue::PointerInfo(a.narrow_with(b))
            }
            _ => panic!("narrow_with across mismatched DomainValue variants"),
        }
    }
    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (DomainValue::Interval(a), DomainValue::Interval(b)) => a.leq(b),
            (DomainValue::PointerInfo(a), DomainValue::PointerInfo(b)) => a.leq(b),
            _ => panic!("leq across mismatched DomainValue variants"),
        }
    }
    fn dump(&self) -> String {
        match self {
            DomainValue::Interval(d) => d.dump(),
            DomainValue::PointerInfo(d) => d.dump(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_domain_satisfies_lattice_laws() {
        let a: Interval<i64> = Interval::new(knight_num::Bound::finite(1), knight_num::Bound::finite(5));
        let b: Interval<i64> = Interval::new(knight_num::Bound::finite(3), knight_num::Bound::finite(9));
        assert!(AbstractDomain::leq(&a, &AbstractDomain::join_with(&a, &b)));
        assert!(AbstractDomain::leq(&AbstractDomain::meet_with(&a, &b), &a));
    }

    #[test]
    fn dom_id_round_trips_through_top_for() {
        assert_eq!(DomainValue::top_for(DomId::Interval).dom_id(), DomId::Interval);
        assert_eq!(
            DomainValue::top_for(DomId::PointerInfo).dom_id(),
            DomId::PointerInfo
        );
    }
}
