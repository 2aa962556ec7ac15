//! Linear expressions, constraints, and constraint systems over [`BigInt`].

use hashbrown::HashSet;
use knight_num::BigInt;

use crate::symbol::SExprId;

/// A variable in the linear-arithmetic world: one numerical-domain slot,
/// ultimately backed by a region definition or a conjured symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// Every numerical-domain variable is ultimately some S-expr's symbolic
/// value, so the two id spaces are kept in lockstep rather than interned
/// separately.
impl From<SExprId> for VarId {
    fn from(s: SExprId) -> Self {
        VarId(s.0)
    }
}

/// A linear expression: `sum(coeff_i * var_i) + constant`, with zero
/// coefficients eliminated on insertion and variables kept in a canonical
/// (sorted-by-id) order so structurally equal expressions compare equal
/// regardless of construction order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinearExpr {
    terms: Vec<(VarId, BigInt)>,
    constant: BigInt,
}

impl LinearExpr {
    /// The constant expression `c`.
    pub fn constant(c: BigInt) -> Self {
        LinearExpr {
            terms: Vec::new(),
            constant: c,
        }
    }

    /// The expression `1 * var`.
    pub fn from_var(var: VarId) -> Self {
        LinearExpr {
            terms: vec![(var, BigInt::one())],
            constant: BigInt::zero(),
        }
    }

    fn set_coeff(&mut self, var: VarId, coeff: BigInt) {
        match self.terms.binary_search_by_key(&var, |(v, _)| *v) {
            Ok(idx) => {
                if coeff.is_zero() {
                    self.terms.remove(idx);
                } else {
                    self.terms[idx].1 = coeff;
                }
            }
            Err(idx) => {
                if !coeff.is_zero() {
                    self.terms.insert(idx, (var, coeff));
                }
            }
        }
    }

    /// This expression's constant term.
    pub fn const_term(&self) -> &BigInt {
        &self.constant
    }

    /// The coefficient of `var` in this expression (zero if absent).
    pub fn coeff_of(&self, var: VarId) -> BigInt {
        self.terms
            .binary_search_by_key(&var, |(v, _)| *v)
            .ok()
            .map(|idx| self.terms[idx].1.clone())
            .unwrap_or_else(BigInt::zero)
    }

    /// The variables with a non-zero coefficient, in canonical order.
    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.iter().map(|(v, _)| *v)
    }

    /// The non-zero `(variable, coefficient)` pairs, in canonical order.
    pub fn terms(&self) -> &[(VarId, BigInt)] {
        &self.terms
    }

    /// `true` iff this expression has no variable terms (a pure constant).
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// If this expression is exactly `1 * x` for some variable `x` (no
    /// constant, unit coefficient), returns `x`.
    pub fn as_single_variable(&self) -> Option<VarId> {
        if self.constant.is_zero() && self.terms.len() == 1 && self.terms[0].1 == BigInt::one() {
            Some(self.terms[0].0)
        } else {
            None
        }
    }

    /// Adds a scalar to this expression.
    pub fn add_scalar(&self, n: &BigInt) -> LinearExpr {
        LinearExpr {
            terms: self.terms.clone(),
            constant: &self.constant + n,
        }
    }

    /// Adds `coeff * var` to this expression.
    pub fn add_var(&self, var: VarId, coeff: &BigInt) -> LinearExpr {
        let mut out = self.clone();
        let combined = &out.coeff_of(var) + coeff;
        out.set_coeff(var, combined);
        out
    }

    /// Unary negation.
    pub fn negate(&self) -> LinearExpr {
        LinearExpr {
            terms: self
                .terms
                .iter()
                .map(|(v, c)| (*v, c.neg()))
                .collect(),
            constant: self.constant.neg(),
        }
    }

    /// Adds another linear expression to this one.
    pub fn add(&self, other: &LinearExpr) -> LinearExpr {
        let mut out = self.clone();
        for (v, c) in other.terms.iter() {
            let combined = &out.coeff_of(*v) + c;
            out.set_coeff(*v, combined);
        }
        out.constant = &out.constant + &other.constant;
        out
    }

    /// Subtracts another linear expression from this one.
    pub fn sub(&self, other: &LinearExpr) -> LinearExpr {
        self.add(&other.negate())
    }
}

/// The relation a [`LinearConstraint`] asserts between its expression and
/// zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// `expr == 0`
    Eq,
    /// `expr != 0`
    Ne,
    /// `expr <= 0`
    Le,
}

/// A single linear constraint `(expr, kind)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinearConstraint {
    expr: LinearExpr,
    kind: ConstraintKind,
}

impl LinearConstraint {
    /// Builds a constraint asserting `expr <kind> 0`.
    pub fn new(expr: LinearExpr, kind: ConstraintKind) -> Self {
        LinearConstraint { expr, kind }
    }

    /// This constraint's expression.
    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    /// This constraint's relation.
    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    /// `true` iff this constraint's expression is a constant satisfying
    /// its relation (always true, contributes nothing when conjoined).
    pub fn is_tautology(&self) -> bool {
        self.expr
            .is_constant()
            .then(|| self.holds_for_constant())
            .unwrap_or(false)
    }

    /// `true` iff this constraint's expression is a constant violating its
    /// relation (always false — the system is unsatisfiable if this
    /// constraint is present).
    pub fn is_contradiction(&self) -> bool {
        self.expr
            .is_constant()
            .then(|| !self.holds_for_constant())
            .unwrap_or(false)
    }

    fn holds_for_constant(&self) -> bool {
        let c = self.expr.const_term();
        match self.kind {
            ConstraintKind::Eq => c.is_zero(),
            ConstraintKind::Ne => !c.is_zero(),
            ConstraintKind::Le => !c.is_positive(),
        }
    }

    /// The logical negation of this constraint (`==` ↔ `!=`, `<= 0` ↔
    /// `> 0` i.e. `-expr - 1 <= 0`), used to invert the predicate on the
    /// `false` branch of a condition.
    pub fn negate(&self) -> LinearConstraint {
        match self.kind {
            ConstraintKind::Eq => LinearConstraint::new(self.expr.clone(), ConstraintKind::Ne),
            ConstraintKind::Ne => LinearConstraint::new(self.expr.clone(), ConstraintKind::Eq),
            ConstraintKind::Le => {
                // not (expr <= 0)  <=>  expr > 0  <=>  (-expr - 1) <= 0
                let rewritten = self.expr.negate().add_scalar(&BigInt::from(-1i64));
                LinearConstraint::new(rewritten, ConstraintKind::Le)
            }
        }
    }
}

/// A non-linear symbolic constraint: an opaque S-expr asserted to be
/// truthy (non-zero) in the current path.
pub type NonLinearConstraint = SExprId;

/// Bundles the linear constraints gathered on a path with the non-linear
/// ones the engine cannot reduce further.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintSystem {
    linear: Vec<LinearConstraint>,
    non_linear: HashSet<NonLinearConstraint>,
}

impl std::hash::Hash for ConstraintSystem {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.linear.hash(state);
        // `HashSet` iteration order isn't a function of content alone, so
        // combine per-element hashes order-independently (xor) rather than
        // hashing the set's iteration order directly — two structurally
        // equal systems built via different insertion sequences must still
        // hash identically for the state manager's folding set.
        let combined = self.non_linear.iter().fold(0u64, |acc, s| {
            use std::hash::{Hash, Hasher};
            let mut h = std::collections::hash_map::DefaultHasher::new();
            s.hash(&mut h);
            acc ^ h.finish()
        });
        combined.hash(state);
    }
}

impl ConstraintSystem {
    /// An empty constraint system (the tautology `true`).
    pub fn new() -> Self {
        ConstraintSystem::default()
    }

    /// Adds a linear constraint.
    pub fn add_linear(&mut self, c: LinearConstraint) {
        if !c.is_tautology() {
            self.linear.push(c);
        }
    }

    /// Adds a non-linear (opaque) constraint.
    pub fn add_non_linear(&mut self, s: NonLinearConstraint) {
        self.non_linear.insert(s);
    }

    /// The linear constraints in this system.
    pub fn linear(&self) -> &[LinearConstraint] {
        &self.linear
    }

    /// The non-linear constraints in this system.
    pub fn non_linear(&self) -> &HashSet<NonLinearConstraint> {
        &self.non_linear
    }

    /// `true` iff any linear constraint in this system is a contradiction.
    pub fn is_contradiction(&self) -> bool {
        self.linear.iter().any(LinearConstraint::is_contradiction)
    }

    /// Union of two systems (spec: "`merge` (union)").
    pub fn merge(&self, other: &ConstraintSystem) -> ConstraintSystem {
        let mut linear = self.linear.clone();
        for c in &other.linear {
            if !linear.contains(c) {
                linear.push(c.clone());
            }
        }
        let mut non_linear = self.non_linear.clone();
        non_linear.extend(other.non_linear.iter().cloned());
        ConstraintSystem { linear, non_linear }
    }

    /// Intersection of two systems (spec: "`retain` (intersection)"),
    /// used when combining branch states at a control-flow merge.
    pub fn retain(&self, other: &ConstraintSystem) -> ConstraintSystem {
        let linear = self
            .linear
            .iter()
            .filter(|c| other.linear.contains(c))
            .cloned()
            .collect();
        let non_linear = self
            .non_linear
            .intersection(&other.non_linear)
            .cloned()
            .collect();
        ConstraintSystem { linear, non_linear }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_coefficient_is_eliminated() {
        let x = VarId(0);
        let e = LinearExpr::from_var(x).add_var(x, &BigInt::from(-1i64));
        assert!(e.is_constant());
        assert!(e.const_term().is_zero());
    }

    #[test]
    fn single_variable_extraction() {
        let x = VarId(1);
        let e = LinearExpr::from_var(x);
        assert_eq!(e.as_single_variable(), Some(x));
        let scaled = e.add_var(x, &BigInt::from(1i64));
        assert_eq!(scaled.as_single_variable(), None);
    }

    #[test]
    fn tautology_and_contradiction_detection() {
        let zero = LinearExpr::constant(BigInt::zero());
        let eq_taut = LinearConstraint::new(zero.clone(), ConstraintKind::Eq);
        assert!(eq_taut.is_tautology());

        let one = LinearExpr::constant(BigInt::one());
        let eq_contra = LinearConstraint::new(one, ConstraintKind::Eq);
        assert!(eq_contra.is_contradiction());
    }

    #[test]
    fn negating_le_flips_to_strict_greater_encoded_as_le() {
        // not (x <= 0)  <=>  x > 0  <=>  (-x - 1) <= 0
        let x = VarId(0);
        let le = LinearConstraint::new(LinearExpr::from_var(x), ConstraintKind::Le);
        let negated = le.negate();
        assert_eq!(negated.kind(), ConstraintKind::Le);
        assert_eq!(negated.expr().coeff_of(x), BigInt::from(-1i64));
        assert_eq!(*negated.expr().const_term(), BigInt::from(-1i64));
    }

    #[test]
    fn merge_is_union_and_retain_is_intersection() {
        let x = VarId(0);
        let mut a = ConstraintSystem::new();
        a.add_linear(LinearConstraint::new(
            LinearExpr::from_var(x),
            ConstraintKind::Le,
        ));
        let b = ConstraintSystem::new();
        let merged = a.merge(&b);
        assert_eq!(merged.linear().len(), 1);
        let retained = a.retain(&b);
        assert_eq!(retained.linear().len(), 0);
    }
}
