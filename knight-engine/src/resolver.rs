//! The symbol resolver: walks a statement's typed expressions, resolves
//! them into [`crate::symbol::SExprKind`] form, records the result in the
//! state's region-definition and statement-symbol maps, and dispatches
//! [`crate::event::AssignEvent`]/[`crate::event::AssumptionEvent`]s so
//! every registered domain listener sees the effect without re-walking the
//! AST itself.
//!
//! Front-end mismatches (an AST shape this resolver doesn't model) are
//! recovered locally: a fresh conjured symbol stands in for the value, and
//! the mismatch is logged at `tracing::debug!` rather than surfaced as an
//! error, since the steady-state interpretation loop never returns
//! `Result` for abstract answers.

use knight_num::BigInt;
use knight_region::{RegionId, RegionManager, StackFrameId, ValueType};

use crate::ast::{BinOp, CastKind, Expr, Stmt, UnaryOp};
use crate::cfg::{BlockId, StmtId};
use crate::event::{AssignEvent, AssumptionEvent, EventBus};
use crate::linear::{ConstraintKind, ConstraintSystem, LinearConstraint, LinearExpr, VarId};
use crate::state::ProgramState;
use crate::symbol::{LocationContext, SExprId, SymbolManager};

/// Walks statements and branch conditions, resolving them to symbolic
/// form and driving the event bus.
///
/// Borrows the symbol/region managers and the event bus for the duration
/// of one function's analysis; the fixpoint engine owns one resolver per
/// run.
pub struct SymbolResolver<'a> {
    symbols: &'a mut SymbolManager,
    regions: &'a RegionManager,
    events: &'a EventBus,
}

impl<'a> SymbolResolver<'a> {
    /// Builds a resolver over the given managers and event bus.
    pub fn new(symbols: &'a mut SymbolManager, regions: &'a RegionManager, events: &'a EventBus) -> Self {
        SymbolResolver {
            symbols,
            regions,
            events,
        }
    }

    /// Resolves `region`'s current value in `state`, minting an external
    /// region-symbol-value the first time this frame observes it (spec
    /// §3.9 invariant (i): every referenced region has a live binding, or
    /// one is created on first read and marked external since it was
    /// already live when this analysis scope began).
    fn resolve_region(
        &mut self,
        state: &mut ProgramState,
        loc: LocationContext,
        region: RegionId,
    ) -> SExprId {
        if let Some(existing) = state.get_region_def(region, loc.frame) {
            return existing;
        }
        let sym = self.symbols.region_sym_val(region, loc, true);
        state.set_region_def(region, loc.frame, sym);
        sym
    }

    /// Resolves an expression to its symbolic value, without performing
    /// any assignment (used for right-hand-side operands and the
    /// non-assignment binary/unary/cast cases).
    fn eval_expr(&mut self, state: &mut ProgramState, loc: LocationContext, expr: &Expr) -> SExprId {
        match expr {
            Expr::IntLiteral { value, ty } => self.symbols.scalar_int(value.clone(), *ty),
            Expr::DeclRef { region } => self.resolve_region(state, loc, *region),
            Expr::Cast {
                operand,
                kind,
                src,
                dst,
            } => {
                let operand_sym = self.eval_expr(state, loc, operand);
                if matches!(kind, CastKind::Opaque) {
                    tracing::debug!(?dst, "opaque cast treated conservatively by the resolver");
                }
                self.symbols.cast(operand_sym, *src, *dst)
            }
            Expr::Unary { op, operand } => self.eval_unary(state, loc, *op, operand),
            Expr::Binary { lhs, rhs, op, ty } => {
                if op.is_assignment() {
                    // A bare (unused) assignment expression, e.g. `x = 5;`
                    // as a statement — still has assignment semantics.
                    self.eval_assignment(state, loc, lhs, rhs, *op, *ty)
                } else {
                    self.eval_binary_value(state, loc, lhs, rhs, *op, *ty)
                }
            }
        }
    }

    /// Unary expressions have no dedicated [`crate::symbol::SExprKind`]
    /// variant; each unary operator is expressed as the equivalent binary
    /// form against a synthetic operand, so the remaining machinery
    /// (complexity, interning, folding) needs no unary-specific handling.
    fn eval_unary(
        &mut self,
        state: &mut ProgramState,
        loc: LocationContext,
        op: UnaryOp,
        operand: &Expr,
    ) -> SExprId {
        let operand_sym = self.eval_expr(state, loc, operand);
        let ty = operand
            .ty()
            .unwrap_or_else(|| ValueType::integer(32, knight_num::Signedness::Signed));
        match op {
            UnaryOp::Neg => {
                let zero = self.symbols.scalar_int(BigInt::zero(), ty);
                self.symbols.binary(zero, operand_sym, BinOp::Sub, ty)
            }
            UnaryOp::Not => {
                let zero = self.symbols.scalar_int(BigInt::zero(), ty);
                self.symbols.binary(operand_sym, zero, BinOp::Eq, ty)
            }
            UnaryOp::BitNot => {
                let all_ones = all_ones_literal(ty);
                let mask = self.symbols.scalar_int(all_ones, ty);
                self.symbols.binary(operand_sym, mask, BinOp::BitXor, ty)
            }
        }
    }

    /// A non-assignment binary expression: builds the symbolic node,
    /// constant-folding to a scalar when both operands are integer
    /// literals and the result is a known numerical form.
    fn eval_binary_value(
        &mut self,
        state: &mut ProgramState,
        loc: LocationContext,
        lhs: &Expr,
        rhs: &Expr,
        op: BinOp,
        ty: ValueType,
    ) -> SExprId {
        if let (Expr::IntLiteral { value: l, .. }, Expr::IntLiteral { value: r, .. }) = (lhs, rhs) {
            if let Some(folded) = fold_constant(l, r, op) {
                return self.symbols.scalar_int(folded, ty);
            }
        }
        let lhs_sym = self.eval_expr(state, loc, lhs);
        let rhs_sym = self.eval_expr(state, loc, rhs);
        self.symbols.binary(lhs_sym, rhs_sym, op, ty)
    }

    /// The target region an assignment's left-hand side names, or `None`
    /// if the left-hand side isn't a plain declaration reference (anything
    /// more exotic — e.g. assigning through a computed pointer — is a
    /// front-end mismatch this resolver recovers from by not tracking the
    /// write precisely).
    fn assignment_target(lhs: &Expr) -> Option<RegionId> {
        match lhs {
            Expr::DeclRef { region } => Some(*region),
            _ => None,
        }
    }

    /// Resolves an assignment (`x = e` or a compound `x op= e`), dispatches
    /// the matching [`AssignEvent`], records the new region definition, and
    /// conjoins the equality constraint `target - rhs = 0` into the
    /// state's path constraints.
    fn eval_assignment(
        &mut self,
        state: &mut ProgramState,
        loc: LocationContext,
        lhs: &Expr,
        rhs: &Expr,
        op: BinOp,
        ty: ValueType,
    ) -> SExprId {
        let Some(region) = Self::assignment_target(lhs) else {
            tracing::debug!("assignment target is not a plain declaration reference; evaluating rhs only");
            return self.eval_expr(state, loc, rhs);
        };

        // Capture the target's pre-assignment definition before it is
        // overwritten below — a compound assignment's event needs it as
        // the left operand of the base operator.
        let old_def = self.resolve_region(state, loc, region);

        let base_op = op.compound_base();
        let rhs_sym = match base_op {
            None => self.eval_expr(state, loc, rhs),
            Some(base) => {
                let folded = Expr::Binary {
                    lhs: Box::new(lhs.clone()),
                    rhs: Box::new(rhs.clone()),
                    op: base,
                    ty,
                };
                self.eval_expr(state, loc, &folded)
            }
        };

        let fresh = self.symbols.region_sym_val(region, loc, false);
        state.set_region_def(region, loc.frame, fresh);
        let x = VarId::from(fresh);

        match base_op {
            None => self.dispatch_assign_for_rhs(state, loc, x, rhs),
            Some(base) => self.dispatch_compound_assign(state, loc, x, VarId::from(old_def), base, rhs),
        }

        let expr = LinearExpr::from_var(x).sub(&LinearExpr::from_var(VarId::from(rhs_sym)));
        let constraint = LinearConstraint::new(expr, ConstraintKind::Eq);
        let mut cs = ConstraintSystem::new();
        cs.add_linear(constraint);
        state.add_constraint_system(&cs);

        rhs_sym
    }

    /// Dispatches the [`AssignEvent`] for a plain `x = rhs`, picking the
    /// most specific variant the right-hand side's shape supports (a
    /// literal, a variable copy, or a binary-op form, each with its own
    /// listener hook).
    fn dispatch_assign_for_rhs(&mut self, state: &mut ProgramState, loc: LocationContext, x: VarId, rhs: &Expr) {
        match rhs {
            Expr::IntLiteral { value, .. } => {
                self.events.dispatch_assign(
                    state,
                    &AssignEvent::Num {
                        x,
                        n: value.clone(),
                    },
                );
            }
            Expr::DeclRef { region } => {
                let y_def = self.resolve_region(state, loc, *region);
                self.events.dispatch_assign(
                    state,
                    &AssignEvent::Var {
                        x,
                        y: VarId::from(y_def),
                    },
                );
            }
            Expr::Binary { lhs, rhs, op, .. } if !op.is_assignment() && !op.is_comparison() => {
                self.dispatch_binary_rhs(state, loc, x, lhs, rhs, *op);
            }
            _ => {
                tracing::debug!("rhs shape has no direct AssignEvent form; tracked symbolically only");
            }
        }
    }

    fn dispatch_binary_rhs(
        &mut self,
        state: &mut ProgramState,
        loc: LocationContext,
        x: VarId,
        lhs: &Expr,
        rhs: &Expr,
        op: BinOp,
    ) {
        match (lhs, rhs) {
            (Expr::DeclRef { region: ry }, Expr::DeclRef { region: rz }) => {
                let y = self.resolve_region(state, loc, *ry);
                let z = self.resolve_region(state, loc, *rz);
                self.events.dispatch_assign(
                    state,
                    &AssignEvent::BinaryVarVar {
                        x,
                        y: VarId::from(y),
                        op,
                        z: VarId::from(z),
                    },
                );
            }
            (Expr::DeclRef { region: ry }, Expr::IntLiteral { value, .. }) => {
                let y = self.resolve_region(state, loc, *ry);
                self.events.dispatch_assign(
                    state,
                    &AssignEvent::BinaryVarNum {
                        x,
                        y: VarId::from(y),
                        op,
                        n: value.clone(),
                    },
                );
            }
            _ => {
                tracing::debug!("binary rhs operands are neither var/var nor var/num; tracked symbolically only");
            }
        }
    }

    /// Dispatches the [`AssignEvent`] for a compound assignment `x op= e`:
    /// `old` is the target's pre-assignment numeric variable, captured by
    /// the caller before it mints the fresh post-assignment definition.
    fn dispatch_compound_assign(
        &mut self,
        state: &mut ProgramState,
        loc: LocationContext,
        x: VarId,
        old: VarId,
        base_op: BinOp,
        rhs: &Expr,
    ) {
        match rhs {
            Expr::IntLiteral { value, .. } => {
                self.events.dispatch_assign(
                    state,
                    &AssignEvent::BinaryVarNum {
                        x,
                        y: old,
                        op: base_op,
                        n: value.clone(),
                    },
                );
            }
            Expr::DeclRef { region: rz } => {
                let z = self.resolve_region(state, loc, *rz);
                self.events.dispatch_assign(
                    state,
                    &AssignEvent::BinaryVarVar {
                        x,
                        y: old,
                        op: base_op,
                        z: VarId::from(z),
                    },
                );
            }
            _ => {
                tracing::debug!("compound assignment rhs tracked symbolically only");
            }
        }
    }

    /// Resolves a declaration or expression statement; a declaration with
    /// an initializer and a plain assignment collapse to the same
    /// region-definition update.
    pub fn eval_stmt(
        &mut self,
        state: &mut ProgramState,
        frame: StackFrameId,
        block: BlockId,
        stmt_id: StmtId,
        stmt: &Stmt,
    ) {
        let loc = LocationContext {
            frame,
            block,
            stmt: stmt_id,
        };
        let sym = match stmt {
            Stmt::Expr(expr) => self.eval_expr(state, loc, expr),
            Stmt::Decl { region, init } => match init {
                Some(expr) => {
                    let rhs_sym = self.eval_expr(state, loc, expr);
                    let fresh = self.symbols.region_sym_val(*region, loc, false);
                    state.set_region_def(*region, frame, fresh);
                    self.dispatch_assign_for_rhs(state, loc, VarId::from(fresh), expr);
                    let expr_constraint = LinearExpr::from_var(VarId::from(fresh))
                        .sub(&LinearExpr::from_var(VarId::from(rhs_sym)));
                    let mut cs = ConstraintSystem::new();
                    cs.add_linear(LinearConstraint::new(expr_constraint, ConstraintKind::Eq));
                    state.add_constraint_system(&cs);
                    fresh
                }
                None => {
                    let sym = self.symbols.region_sym_val(*region, loc, false);
                    state.set_region_def(*region, frame, sym);
                    sym
                }
            },
        };
        state.set_stmt_sexpr(stmt_id, frame, sym);
    }

    /// A cast assignment `x = (dst) y`: dispatches `AssignEvent::Cast`
    /// directly, bypassing the generic
    /// `eval_assignment` dispatch table, since only integer-to-integer
    /// casts that change width carry a numeric transfer function.
    pub fn eval_cast_assignment(
        &mut self,
        state: &mut ProgramState,
        loc: LocationContext,
        target: RegionId,
        source: RegionId,
        dst_width: u32,
        dst_signed: knight_num::Signedness,
    ) -> SExprId {
        let y_def = self.resolve_region(state, loc, source);
        let fresh = self.symbols.region_sym_val(target, loc, false);
        state.set_region_def(target, loc.frame, fresh);
        self.events.dispatch_assign(
            state,
            &AssignEvent::Cast {
                x: VarId::from(fresh),
                y: VarId::from(y_def),
                dst_width,
                dst_signed,
            },
        );
        fresh
    }

    /// Converts a branch condition into a [`LinearConstraint`] and
    /// dispatches an [`AssumptionEvent`] against a clone
    /// of `state`, then folds that constraint into the returned state's
    /// path constraints. `branch_taken` selects whether the condition or
    /// its negation holds on the edge being filtered.
    pub fn filter_condition(
        &mut self,
        state: &ProgramState,
        loc: LocationContext,
        cond: &Expr,
        branch_taken: bool,
        config: &crate::config::FixpointConfig,
    ) -> ProgramState {
        let mut out = state.clone();
        let Some(constraint) = self.encode_predicate(&mut out, loc, cond) else {
            tracing::debug!("branch condition has no linear-predicate encoding; filtering skipped");
            return out;
        };
        let constraint = if branch_taken {
            constraint
        } else {
            constraint.negate()
        };
        let mut cs = ConstraintSystem::new();
        cs.add_linear(constraint.clone());
        out.add_constraint_system(&cs);
        self.events
            .dispatch_assumption(&mut out, &AssumptionEvent { constraint }, config);
        out
    }

    /// Encodes a comparison expression as a [`LinearConstraint`].
    /// Returns `None` for a condition that isn't a
    /// top-level comparison of two integer-valued operands (anything else
    /// is a non-linear condition this engine tracks only as an opaque
    /// constraint, added separately by the caller if desired).
    fn encode_predicate(
        &mut self,
        state: &mut ProgramState,
        loc: LocationContext,
        cond: &Expr,
    ) -> Option<LinearConstraint> {
        let Expr::Binary { lhs, rhs, op, .. } = cond else {
            return None;
        };
        if !op.is_comparison() {
            return None;
        }
        let lhs_sym = self.eval_expr(state, loc, lhs);
        let rhs_sym = self.eval_expr(state, loc, rhs);
        let diff = LinearExpr::from_var(VarId::from(lhs_sym)).sub(&LinearExpr::from_var(VarId::from(rhs_sym)));
        Some(match op {
            BinOp::Eq => LinearConstraint::new(diff, ConstraintKind::Eq),
            BinOp::Ne => LinearConstraint::new(diff, ConstraintKind::Ne),
            // lhs < rhs  <=>  lhs - rhs <= -1  <=>  (lhs - rhs + 1) <= 0
            BinOp::Lt => LinearConstraint::new(diff.add_scalar(&BigInt::one()), ConstraintKind::Le),
            // lhs > rhs  <=>  rhs - lhs <= -1  <=>  (rhs - lhs + 1) <= 0
            BinOp::Gt => LinearConstraint::new(diff.negate().add_scalar(&BigInt::one()), ConstraintKind::Le),
            // lhs <= rhs  <=>  lhs - rhs <= 0
            BinOp::Le => LinearConstraint::new(diff, ConstraintKind::Le),
            // lhs >= rhs  <=>  rhs - lhs <= 0
            BinOp::Ge => LinearConstraint::new(diff.negate(), ConstraintKind::Le),
            _ => unreachable!("is_comparison() guards to exactly these six operators"),
        })
    }
}

/// Folds a binary operator over two integer literals, when the operator
/// has a total, deterministic result (division/remainder by zero are left
/// unfolded — the resolver conservatively keeps them symbolic rather than
/// panicking on a front-end-supplied literal zero divisor).
fn fold_constant(l: &BigInt, r: &BigInt, op: BinOp) -> Option<BigInt> {
    Some(match op {
        BinOp::Add => l + r,
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div if !r.is_zero() => l.div_trunc(r),
        BinOp::Rem if !r.is_zero() => l.rem_trunc(r),
        BinOp::BitAnd => l.bitand(r),
        BinOp::BitOr => l.bitor(r),
        BinOp::BitXor => l.bitxor(r),
        _ => return None,
    })
}

/// The all-ones bit pattern for `ty`'s width, used to express `~x` as
/// `x ^ all_ones`, since there is no dedicated unary S-expr variant.
fn all_ones_literal(ty: ValueType) -> BigInt {
    let width = ty.bit_width().min(63);
    &BigInt::one().shl(width) - &BigInt::one()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomId;
    use crate::event::IntervalListener;
    use knight_num::Signedness;
    use knight_region::DeclId;

    fn int_ty() -> ValueType {
        ValueType::integer(32, Signedness::Signed)
    }

    fn setup() -> (SymbolManager, RegionManager, EventBus, RegionId, StackFrameId) {
        let symbols = SymbolManager::new();
        let mut regions = RegionManager::new();
        let frame = StackFrameId(0);
        let space = regions.stack_local_space(frame);
        let x = regions.var_region(DeclId(1), space, int_ty());
        let mut events = EventBus::new();
        events.register(Box::new(IntervalListener));
        (symbols, regions, events, x, frame)
    }

    fn assign_literal(resolver: &mut SymbolResolver, state: &mut ProgramState, frame: StackFrameId, region: RegionId, n: i64) {
        let stmt = Stmt::Expr(Expr::Binary {
            lhs: Box::new(Expr::DeclRef { region }),
            rhs: Box::new(Expr::IntLiteral {
                value: BigInt::from(n),
                ty: int_ty(),
            }),
            op: BinOp::Assign,
            ty: int_ty(),
        });
        resolver.eval_stmt(state, frame, BlockId(0), StmtId(0), &stmt);
    }

    #[test]
    fn plain_assignment_binds_a_fresh_def_and_updates_the_interval() {
        let (mut symbols, regions, events, x, frame) = setup();
        let mut resolver = SymbolResolver::new(&mut symbols, &regions, &events);
        let mut state = ProgramState::new();

        assign_literal(&mut resolver, &mut state, frame, x, 2);

        let def = state.get_region_def(x, frame).expect("assignment binds a def");
        let v = state
            .get_dom(DomId::Interval)
            .as_interval()
            .unwrap()
            .get(VarId::from(def));
        assert_eq!(v.singleton_value(), Some(2));
    }

    #[test]
    fn compound_assignment_updates_the_interval_from_the_prior_value() {
        let (mut symbols, regions, events, x, frame) = setup();
        let mut resolver = SymbolResolver::new(&mut symbols, &regions, &events);
        let mut state = ProgramState::new();

        assign_literal(&mut resolver, &mut state, frame, x, 2);
        let compound = Stmt::Expr(Expr::Binary {
            lhs: Box::new(Expr::DeclRef { region: x }),
            rhs: Box::new(Expr::IntLiteral {
                value: BigInt::from(3i64),
                ty: int_ty(),
            }),
            op: BinOp::AddAssign,
            ty: int_ty(),
        });
        resolver.eval_stmt(&mut state, frame, BlockId(0), StmtId(1), &compound);

        let def = state.get_region_def(x, frame).expect("compound assignment binds a def");
        let v = state
            .get_dom(DomId::Interval)
            .as_interval()
            .unwrap()
            .get(VarId::from(def));
        assert_eq!(v.singleton_value(), Some(5));
    }

    #[test]
    fn integer_literal_binary_expression_folds_to_a_scalar() {
        let (mut symbols, regions, events, _x, frame) = setup();
        let mut resolver = SymbolResolver::new(&mut symbols, &regions, &events);
        let mut state = ProgramState::new();
        let expr = Expr::Binary {
            lhs: Box::new(Expr::IntLiteral {
                value: BigInt::from(2i64),
                ty: int_ty(),
            }),
            rhs: Box::new(Expr::IntLiteral {
                value: BigInt::from(3i64),
                ty: int_ty(),
            }),
            op: BinOp::Add,
            ty: int_ty(),
        };
        let loc = LocationContext {
            frame,
            block: BlockId(0),
            stmt: StmtId(0),
        };
        let sym = resolver.eval_expr(&mut state, loc, &expr);
        assert_eq!(
            symbols.kind(sym),
            &crate::symbol::SExprKind::IntLiteral {
                value: BigInt::from(5i64),
                ty: int_ty()
            }
        );
    }

    #[test]
    fn equality_condition_encodes_to_an_eq_predicate() {
        let (mut symbols, regions, events, x, frame) = setup();
        let mut resolver = SymbolResolver::new(&mut symbols, &regions, &events);
        let mut state = ProgramState::new();
        assign_literal(&mut resolver, &mut state, frame, x, 5);

        let cond = Expr::Binary {
            lhs: Box::new(Expr::DeclRef { region: x }),
            rhs: Box::new(Expr::IntLiteral {
                value: BigInt::from(5i64),
                ty: int_ty(),
            }),
            op: BinOp::Eq,
            ty: int_ty(),
        };
        let loc = LocationContext {
            frame,
            block: BlockId(0),
            stmt: StmtId(1),
        };
        let config = crate::config::FixpointConfig::default();
        let then_state = resolver.filter_condition(&state, loc, &cond, true, &config);
        assert!(!then_state.is_bottom());

        let else_state = resolver.filter_condition(&state, loc, &cond, false, &config);
        assert!(else_state.is_bottom());
    }
}
