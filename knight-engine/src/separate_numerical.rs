//! The interval domain, implemented atop a separate (non-relational)
//! numerical domain: a [`crate::map_domain::MapDomain`] from [`VarId`] to
//! [`Interval<i64>`], plus the variable-assignment, binary-assignment,
//! cast, and constraint-refinement operations a numerical domain requires.

use hashbrown::{HashMap, HashSet};
use knight_num::{BigInt, Bound, Interval, MachineInt, Signedness};

use crate::ast::BinOp;
use crate::config::FixpointConfig;
use crate::domain::{AbstractDomain, NumericalDomain};
use crate::linear::{ConstraintKind, LinearConstraint, LinearExpr, VarId};
use crate::map_domain::MapDomain;

/// The interval domain: a separate map from program variable to
/// [`Interval<i64>`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SeparateNumericalDomain {
    map: MapDomain<VarId, Interval<i64>>,
}

impl SeparateNumericalDomain {
    /// The empty (top) domain.
    pub fn new() -> Self {
        SeparateNumericalDomain { map: MapDomain::new() }
    }

    /// The interval bound to `v` (top if `v` has no entry).
    pub fn get(&self, v: VarId) -> Interval<i64> {
        self.map.get(&v)
    }

    /// Binds `v` to `iv`.
    pub fn set(&mut self, v: VarId, iv: Interval<i64>) {
        self.map.set(v, iv);
    }

    /// The bound variables with a non-top interval.
    pub fn entries(&self) -> impl Iterator<Item = (&VarId, &Interval<i64>)> {
        self.map.entries()
    }

    fn bitwise(op: BinOp, a: Interval<i64>, b: Interval<i64>) -> Interval<i64> {
        match (a.singleton_value(), b.singleton_value()) {
            (Some(x), Some(y)) => {
                let v = match op {
                    BinOp::BitAnd => x & y,
                    BinOp::BitOr => x | y,
                    BinOp::BitXor => x ^ y,
                    _ => unreachable!("bitwise() called with non-bitwise op"),
                };
                Interval::singleton(v)
            }
            // Bitwise ops have no closed-form interval transfer function;
            // conservatively over-approximate unless both sides are exact.
            _ => Interval::top(),
        }
    }

    /// `x op y` for the binary (non-assignment, non-comparison) operators.
    fn binary_op(op: BinOp, a: Interval<i64>, b: Interval<i64>) -> Interval<i64> {
        if a.is_bottom() || b.is_bottom() {
            return Interval::bottom();
        }
        match op {
            BinOp::Add => a.add(&b),
            BinOp::Sub => a.sub(&b),
            BinOp::Mul => a.mul(&b),
            BinOp::Div => a.div(&b),
            BinOp::Rem => a.rem(&b),
            BinOp::Shl => a.shl(&b),
            BinOp::Shr => a.shr(&b),
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => Self::bitwise(op, a, b),
            _ => panic!("binary_op called with assignment/comparison operator {op:?}"),
        }
    }

    /// `x = n`.
    pub fn assign_num(&mut self, x: VarId, n: &BigInt) {
        self.set(x, Interval::singleton(n.to_i64_saturating()));
    }

    /// `x = y`.
    pub fn assign_var(&mut self, x: VarId, y: VarId) {
        self.set(x, self.get(y));
    }

    /// `x = e`, evaluating the linear expression by substituting each free
    /// variable's current interval and combining with interval arithmetic.
    pub fn assign_linear_expr(&mut self, x: VarId, e: &LinearExpr) {
        let v = self.eval_linear_expr(e);
        self.set(x, v);
    }

    fn eval_linear_expr(&self, e: &LinearExpr) -> Interval<i64> {
        let mut acc = Interval::singleton(e.const_term().to_i64_saturating());
        for (v, coeff) in e.terms() {
            let term = Interval::singleton(coeff.to_i64_saturating()).mul(&self.get(*v));
            acc = acc.add(&term);
        }
        acc
    }

    /// `x = y op z` (`op` neither assignment nor comparison).
    pub fn assign_binary_var_var(&mut self, x: VarId, y: VarId, op: BinOp, z: VarId) {
        debug_assert!(!op.is_assignment() && !op.is_comparison());
        let v = Self::binary_op(op, self.get(y), self.get(z));
        self.set(x, v);
    }

    /// `x = y op n` (`op` neither assignment nor comparison).
    pub fn assign_binary_var_num(&mut self, x: VarId, y: VarId, op: BinOp, n: &BigInt) {
        debug_assert!(!op.is_assignment() && !op.is_comparison());
        let rhs = Interval::singleton(n.to_i64_saturating());
        let v = Self::binary_op(op, self.get(y), rhs);
        self.set(x, v);
    }

    /// `x = (dst_width, dst_signed) y`: clamps to the destination width
    /// using sign-aware modulo; over-approximates to the full destination
    /// range when the source interval spans a wrap boundary under the
    /// target width.
    pub fn assign_cast(&mut self, x: VarId, y: VarId, dst_width: u32, dst_signed: Signedness) {
        let y_iv = self.get(y);
        if y_iv.is_bottom() {
            self.set(x, Interval::bottom());
            return;
        }
        let dst_min = MachineInt::min_value(dst_width, dst_signed)
            .to_big_int()
            .to_i64_saturating();
        let dst_max = MachineInt::max_value(dst_width, dst_signed)
            .to_big_int()
            .to_i64_saturating();
        let full_range = Interval::new(Bound::finite(dst_min), Bound::finite(dst_max));
        let modulus: i128 = if dst_width >= 64 { i128::MAX } else { 1i128 << dst_width };

        let cast_one = |v: i64| -> i64 {
            MachineInt::new(v as i128, dst_width, dst_signed)
                .to_big_int()
                .to_i64_saturating()
        };

        let refined = match (y_iv.lb().finite_value(), y_iv.ub().finite_value()) {
            (Some(lo), Some(hi)) if (hi as i128 - lo as i128) < modulus => {
                let (a, b) = (cast_one(lo), cast_one(hi));
                if a <= b {
                    Interval::new(Bound::finite(a), Bound::finite(b))
                } else {
                    full_range
                }
            }
            _ => full_range,
        };
        self.set(x, refined);
    }

    /// Applies one linear constraint, refining every variable it mentions.
    pub fn apply_constraint(&mut self, c: &LinearConstraint, cfg: &FixpointConfig) {
        self.apply_constraint_system(std::slice::from_ref(c), cfg);
    }

    /// Applies a whole constraint system via a trigger-table fixpoint:
    /// build a pivot → constraints index once the system exceeds
    /// `cfg.trigger_table_threshold`, then refine until no variable
    /// changes or the per-cycle operation budget is exhausted.
    pub fn apply_constraint_system(&mut self, constraints: &[LinearConstraint], cfg: &FixpointConfig) {
        if self.is_bottom() {
            return;
        }
        if constraints.iter().any(LinearConstraint::is_contradiction) {
            self.set_to_bottom();
            return;
        }

        let trigger: Option<HashMap<VarId, Vec<usize>>> =
            if constraints.len() > cfg.trigger_table_threshold {
                let mut t: HashMap<VarId, Vec<usize>> = HashMap::new();
                for (i, c) in constraints.iter().enumerate() {
                    for v in c.expr().variables() {
                        t.entry(v).or_default().push(i);
                    }
                }
                Some(t)
            } else {
                None
            };

        let mut refined: HashSet<VarId> =
            constraints.iter().flat_map(|c| c.expr().variables()).collect();
        let mut ops: u32 = 0;

        while !refined.is_empty() && ops < cfg.constraint_ops_per_cycle {
            let indices: Vec<usize> = match &trigger {
                Some(t) => {
                    let mut idxs: Vec<usize> = refined
                        .iter()
                        .flat_map(|v| t.get(v).cloned().unwrap_or_default())
                        .collect();
                    idxs.sort_unstable();
                    idxs.dedup();
                    idxs
                }
                None => (0..constraints.len()).collect(),
            };

            let mut next_refined = HashSet::new();
            for i in indices {
                let c = &constraints[i];
                for pivot in c.expr().variables() {
                    ops += 1;
                    if let Some(new_iv) = self.refine_var_via_constraint(pivot, c) {
                        if new_iv.is_bottom() {
                            self.set_to_bottom();
                            return;
                        }
                        let old = self.get(pivot);
                        if !new_iv.equals(&old) {
                            self.set(pivot, new_iv);
                            next_refined.insert(pivot);
                        }
                    }
                    if ops >= cfg.constraint_ops_per_cycle {
                        break;
                    }
                }
                if ops >= cfg.constraint_ops_per_cycle {
                    break;
                }
            }
            refined = next_refined;
        }
    }

    /// The residual interval of every term in `expr` other than `pivot`,
    /// evaluated by substituting each free variable's current interval.
    fn eval_residual(&self, expr: &LinearExpr, pivot: VarId) -> Interval<i64> {
        let mut acc = Interval::singleton(expr.const_term().to_i64_saturating());
        for (v, coeff) in expr.terms() {
            if *v == pivot {
                continue;
            }
            let term = Interval::singleton(coeff.to_i64_saturating()).mul(&self.get(*v));
            acc = acc.add(&term);
        }
        acc
    }

    /// Computes a refined interval for `pivot` implied by `c`, or `None` if
    /// the constraint does not usefully narrow `pivot` right now (spec
    /// §4.3 step 4).
    fn refine_var_via_constraint(&self, pivot: VarId, c: &LinearConstraint) -> Option<Interval<i64>> {
        let coeff = c.expr().coeff_of(pivot);
        if coeff.is_zero() {
            return None;
        }
        let pivot_coeff = coeff.to_i64_saturating();
        let rest = self.eval_residual(c.expr(), pivot);
        let neg_rest = Interval::singleton(0).sub(&rest);
        let divisor = Interval::singleton(pivot_coeff);

        match c.kind() {
            ConstraintKind::Eq => {
                let residual = neg_rest.div(&divisor);
                Some(self.get(pivot).meet_with(&residual))
            }
            ConstraintKind::Ne => {
                if pivot_coeff != 1 && pivot_coeff != -1 {
                    return None;
                }
                let rest_val = rest.singleton_value()?;
                let target = if pivot_coeff == 1 { -rest_val } else { rest_val };
                let cur = self.get(pivot);
                if cur.is_bottom() {
                    return None;
                }
                if let Some(v) = cur.singleton_value() {
                    return Some(if v == target { Interval::bottom() } else { cur });
                }
                if cur.lb().finite_value() == Some(target) {
                    return Some(Interval::new(Bound::finite(target + 1), cur.ub()));
                }
                if cur.ub().finite_value() == Some(target) {
                    return Some(Interval::new(cur.lb(), Bound::finite(target - 1)));
                }
                None
            }
            ConstraintKind::Le => {
                let bound = neg_rest.div(&divisor);
                let refined = if pivot_coeff > 0 {
                    Interval::new(Bound::ninf(), bound.ub())
                } else {
                    Interval::new(bound.lb(), Bound::pinf())
                };
                Some(self.get(pivot).meet_with(&refined))
            }
        }
    }

    /// Projects `v`'s interval (an alias for [`Self::get`], named to match
    /// the domain interface's "projection to interval" operation).
    pub fn to_interval(&self, v: VarId) -> Interval<i64> {
        self.get(v)
    }

    /// Exports this domain's bindings as a linear constraint system: each
    /// bound (non-top) variable contributes `lb <= v` and `v <= ub` for
    /// whichever bounds are finite.
    pub fn to_linear_constraint_system(&self) -> Vec<LinearConstraint> {
        let mut out = Vec::new();
        for (&v, iv) in self.entries() {
            if let Some(lb) = iv.lb().finite_value() {
                // lb <= v  <=>  -v + lb <= 0
                let expr = LinearExpr::from_var(v).negate().add_scalar(&BigInt::from(lb));
                out.push(LinearConstraint::new(expr, ConstraintKind::Le));
            }
            if let Some(ub) = iv.ub().finite_value() {
                // v <= ub  <=>  v - ub <= 0
                let expr = LinearExpr::from_var(v).add_scalar(&BigInt::from(-ub));
                out.push(LinearConstraint::new(expr, ConstraintKind::Le));
            }
        }
        out
    }
}

impl Default for SeparateNumericalDomain {
    fn default() -> Self {
        SeparateNumericalDomain::new()
    }
}

impl AbstractDomain for SeparateNumericalDomain {
    fn top() -> Self {
        SeparateNumericalDomain::new()
    }
    fn bottom() -> Self {
        SeparateNumericalDomain {
            map: MapDomain::bottom(),
        }
    }
    fn is_top(&self) -> bool {
        self.map.is_top()
    }
    fn is_bottom(&self) -> bool {
        self.map.is_bottom()
    }
    fn set_to_top(&mut self) {
        self.map.set_to_top();
    }
    fn set_to_bottom(&mut self) {
        self.map.set_to_bottom();
    }
    fn join_with(&self, other: &Self) -> Self {
        SeparateNumericalDomain {
            map: self.map.join_with(&other.map),
        }
    }
    fn widen_with(&self, other: &Self) -> Self {
        SeparateNumericalDomain {
            map: self.map.widen_with(&other.map),
        }
    }
    fn meet_with(&self, other: &Self) -> Self {
        SeparateNumericalDomain {
            map: self.map.meet_with(&other.map),
        }
    }
    fn narrow_with(&self, other: &Self) -> Self {
        SeparateNumericalDomain {
            map: self.map.narrow_with(&other.map),
        }
    }
    fn leq(&self, other: &Self) -> bool {
        self.map.leq(&other.map)
    }
    fn dump(&self) -> String {
        self.map.dump()
    }
}

impl NumericalDomain for SeparateNumericalDomain {
    fn widen_with_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let t = threshold.to_i64_saturating();
        let mut out = SeparateNumericalDomain::new();
        for (v, iv) in self.entries() {
            if let Some(ov) = other.map.entries().find(|(k, _)| *k == v).map(|(_, v)| v) {
                out.set(*v, iv.widen_with_threshold(ov, t));
            }
        }
        out
    }

    fn narrow_with_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return SeparateNumericalDomain::bottom();
        }
        let t = threshold.to_i64_saturating();
        let mut out = self.clone();
        for (v, ov) in other.entries() {
            let refined = match self.map.entries().find(|(k, _)| *k == v).map(|(_, v)| v) {
                Some(sv) => sv.narrow_with_threshold(ov, t),
                None => *ov,
            };
            out.set(*v, refined);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(lb: i64, ub: i64) -> Interval<i64> {
        Interval::new(Bound::finite(lb), Bound::finite(ub))
    }

    #[test]
    fn additive_assignment_chain_matches_scenario_1() {
        let mut dom = SeparateNumericalDomain::new();
        let x = VarId(0);
        dom.assign_num(x, &BigInt::from(2i64));
        dom.assign_binary_var_num(x, x, BinOp::Add, &BigInt::from(3i64));
        assert_eq!(dom.get(x), iv(5, 5));
    }

    #[test]
    fn full_alu_chain_matches_scenario_2() {
        let mut dom = SeparateNumericalDomain::new();
        let x = VarId(0);
        dom.assign_num(x, &BigInt::from(2i64));
        dom.assign_binary_var_num(x, x, BinOp::Add, &BigInt::from(3i64));
        assert_eq!(dom.get(x), iv(5, 5));
        dom.assign_binary_var_num(x, x, BinOp::Mul, &BigInt::from(4i64));
        assert_eq!(dom.get(x), iv(20, 20));
        dom.assign_binary_var_num(x, x, BinOp::Div, &BigInt::from(2i64));
        assert_eq!(dom.get(x), iv(10, 10));
        dom.assign_binary_var_num(x, x, BinOp::Sub, &BigInt::from(1i64));
        assert_eq!(dom.get(x), iv(9, 9));
        dom.assign_binary_var_num(x, x, BinOp::Shl, &BigInt::from(1i64));
        assert_eq!(dom.get(x), iv(18, 18));
        dom.assign_binary_var_num(x, x, BinOp::Shr, &BigInt::from(1i64));
        assert_eq!(dom.get(x), iv(9, 9));
        dom.assign_binary_var_num(x, x, BinOp::Rem, &BigInt::from(2i64));
        assert_eq!(dom.get(x), iv(1, 1));
    }

    #[test]
    fn cast_out_of_range_over_approximates_matching_scenario_5() {
        let mut dom = SeparateNumericalDomain::new();
        let x = VarId(0);
        let y = VarId(1);
        dom.set(x, iv(120, 200));
        dom.assign_cast(y, x, 8, Signedness::Signed);
        assert_eq!(dom.get(y), iv(-128, 127));
    }

    #[test]
    fn join_at_disagreeing_branches_matches_scenario_6() {
        let mut then_dom = SeparateNumericalDomain::new();
        let mut else_dom = SeparateNumericalDomain::new();
        let p = VarId(0);
        then_dom.assign_num(p, &BigInt::from(3i64));
        else_dom.assign_num(p, &BigInt::from(7i64));
        let joined = then_dom.join_with(&else_dom);
        assert_eq!(joined.get(p), iv(3, 7));
    }

    #[test]
    fn equality_constraint_refines_to_exact_value() {
        let mut dom = SeparateNumericalDomain::new();
        let x = VarId(0);
        dom.set(x, iv(0, 100));
        // x - 5 == 0
        let expr = LinearExpr::from_var(x).add_scalar(&BigInt::from(-5i64));
        let c = LinearConstraint::new(expr, ConstraintKind::Eq);
        dom.apply_constraint(&c, &FixpointConfig::default());
        assert_eq!(dom.get(x), iv(5, 5));
    }

    #[test]
    fn disequality_trims_singleton_endpoint() {
        let mut dom = SeparateNumericalDomain::new();
        let x = VarId(0);
        dom.set(x, iv(0, 5));
        // x - 5 != 0
        let expr = LinearExpr::from_var(x).add_scalar(&BigInt::from(-5i64));
        let c = LinearConstraint::new(expr, ConstraintKind::Ne);
        dom.apply_constraint(&c, &FixpointConfig::default());
        assert_eq!(dom.get(x), iv(0, 4));
    }

    #[test]
    fn less_equal_constraint_refines_upper_bound() {
        let mut dom = SeparateNumericalDomain::new();
        let x = VarId(0);
        dom.set(x, iv(0, 100));
        // x - 10 <= 0  =>  x <= 10
        let expr = LinearExpr::from_var(x).add_scalar(&BigInt::from(-10i64));
        let c = LinearConstraint::new(expr, ConstraintKind::Le);
        dom.apply_constraint(&c, &FixpointConfig::default());
        assert_eq!(dom.get(x), iv(0, 10));
    }

    #[test]
    fn round_trip_through_linear_constraint_system_does_not_lose_soundness() {
        let mut dom = SeparateNumericalDomain::new();
        let x = VarId(0);
        dom.set(x, iv(3, 7));
        let cs = dom.to_linear_constraint_system();
        let mut reapplied = SeparateNumericalDomain::new();
        for c in &cs {
            reapplied.apply_constraint(c, &FixpointConfig::default());
        }
        assert!(reapplied.get(x).leq(&iv(3, 7).join_with(&iv(3, 7))));
        assert_eq!(reapplied.get(x), iv(3, 7));
    }
}
