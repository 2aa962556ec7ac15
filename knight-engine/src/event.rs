//! The typed event bus that decouples
//! [`crate::resolver::SymbolResolver`] from the domains it drives: the
//! resolver emits [`AssignEvent`]/[`AssumptionEvent`] values as it walks a
//! statement, and each registered [`EventListener`] reacts to the ones it
//! owns, updating its slot of the [`crate::state::ProgramState`] being
//! built. Dispatch always runs listeners in registration order, never a
//! data-dependent one, so two runs over the same statement sequence update
//! state identically regardless of which domains happen to be registered.

use knight_num::{BigInt, Signedness};
use knight_region::RegionId;

use crate::ast::BinOp;
use crate::config::FixpointConfig;
use crate::linear::{LinearConstraint, VarId};
use crate::state::ProgramState;

/// What changed when an assignment-like statement executed: enough
/// structure for a domain listener to replay the effect on the variable(s)
/// it names, without re-walking the AST itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssignEvent {
    /// `x = n`.
    Num {
        /// The assigned-to variable.
        x: VarId,
        /// The literal value.
        n: BigInt,
    },
    /// `x = y`.
    Var {
        /// The assigned-to variable.
        x: VarId,
        /// The source variable.
        y: VarId,
    },
    /// `x = y op z`.
    BinaryVarVar {
        /// The assigned-to variable.
        x: VarId,
        /// The left operand.
        y: VarId,
        /// The operator.
        op: BinOp,
        /// The right operand.
        z: VarId,
    },
    /// `x = y op n`.
    BinaryVarNum {
        /// The assigned-to variable.
        x: VarId,
        /// The left operand.
        y: VarId,
        /// The operator.
        op: BinOp,
        /// The literal right operand.
        n: BigInt,
    },
    /// `x = (dst_width, dst_signed) y`.
    Cast {
        /// The assigned-to variable.
        x: VarId,
        /// The source variable.
        y: VarId,
        /// The destination integer width.
        dst_width: u32,
        /// The destination signedness.
        dst_signed: Signedness,
    },
    /// `x` now points only to `region` (a fresh address binding: `x =
    /// &region` or equivalent).
    PointsTo {
        /// The pointer variable.
        x: VarId,
        /// The region it now points to exclusively.
        region: RegionId,
    },
    /// `x` and `y` now alias (the pointer-copy case, `x = y` where both
    /// are pointers).
    Aliased {
        /// One side of the new alias relationship.
        x: VarId,
        /// The other side.
        y: VarId,
    },
}

/// A fact gathered from a branch condition: one linear constraint known to
/// hold on the path being explored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssumptionEvent {
    /// The constraint implied by the branch condition.
    pub constraint: LinearConstraint,
}

/// Reacts to events emitted while walking a statement, updating whichever
/// [`crate::domain::DomId`] slot(s) of a [`ProgramState`] it owns.
pub trait EventListener {
    /// Applies an assignment event, in place, to `state`.
    fn on_assign(&self, state: &mut ProgramState, event: &AssignEvent);
    /// Applies an assumption event, in place, to `state`.
    fn on_assumption(&self, state: &mut ProgramState, event: &AssumptionEvent, cfg: &FixpointConfig);
}

/// Dispatches events to registered listeners in registration order.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventBus {
    /// An empty bus.
    pub fn new() -> Self {
        EventBus { listeners: Vec::new() }
    }

    /// Registers a listener. It is dispatched to after every
    /// previously-registered listener.
    pub fn register(&mut self, listener: Box<dyn EventListener>) {
        self.listeners.push(listener);
    }

    /// Dispatches `event` to every registered listener, in order.
    pub fn dispatch_assign(&self, state: &mut ProgramState, event: &AssignEvent) {
        for listener in &self.listeners {
            listener.on_assign(state, event);
        }
    }

    /// Dispatches `event` to every registered listener, in order.
    pub fn dispatch_assumption(&self, state: &mut ProgramState, event: &AssumptionEvent, cfg: &FixpointConfig) {
        for listener in &self.listeners {
            listener.on_assumption(state, event, cfg);
        }
    }
}

/// Wires [`AssignEvent`]/[`AssumptionEvent`]s into the
/// [`crate::separate_numerical::SeparateNumericalDomain`] slot of a state.
pub struct IntervalListener;

impl EventListener for IntervalListener {
    fn on_assign(&self, state: &mut ProgramState, event: &AssignEvent) {
        use crate::domain::{DomId, DomainValue};

        let mut dom = match state.get_dom(DomId::Interval).as_interval() {
            Some(d) => d.clone(),
            None => return,
        };
        match event {
            AssignEvent::Num { x, n } => dom.assign_num(*x, n),
            AssignEvent::Var { x, y } => dom.assign_var(*x, *y),
            AssignEvent::BinaryVarVar { x, y, op, z } => dom.assign_binary_var_var(*x, *y, *op, *z),
            AssignEvent::BinaryVarNum { x, y, op, n } => dom.assign_binary_var_num(*x, *y, *op, n),
            AssignEvent::Cast { x, y, dst_width, dst_signed } => {
                dom.assign_cast(*x, *y, *dst_width, *dst_signed)
            }
            AssignEvent::PointsTo { .. } | AssignEvent::Aliased { .. } => return,
        }
        state.set_dom(DomId::Interval, DomainValue::Interval(dom));
    }

    fn on_assumption(&self, state: &mut ProgramState, event: &AssumptionEvent, cfg: &FixpointConfig) {
        use crate::domain::{DomId, DomainValue};

        let mut dom = match state.get_dom(DomId::Interval).as_interval() {
            Some(d) => d.clone(),
            None => return,
        };
        dom.apply_constraint(&event.constraint, cfg);
        state.set_dom(DomId::Interval, DomainValue::Interval(dom));
    }
}

/// Wires the pointer-affecting [`AssignEvent`] variants into the
/// [`crate::pointer_info::PointerInfoDomain`] slot of a state. Assumption
/// events carry no pointer-relevant information, so this listener ignores
/// them.
pub struct PointerInfoListener;

impl EventListener for PointerInfoListener {
    fn on_assign(&self, state: &mut ProgramState, event: &AssignEvent) {
        use crate::domain::{DomId, DomainValue};

        let mut dom = match state.get_dom(DomId::PointerInfo).as_pointer_info() {
            Some(d) => d.clone(),
            None => return,
        };
        match event {
            AssignEvent::PointsTo { x, region } => dom.set_points_to(*x, *region),
            AssignEvent::Aliased { x, y } => dom.set_aliased(*x, *y),
            _ => return,
        }
        state.set_dom(DomId::PointerInfo, DomainValue::PointerInfo(dom));
    }

    fn on_assumption(&self, _state: &mut ProgramState, _event: &AssumptionEvent, _cfg: &FixpointConfig) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{ConstraintKind, LinearExpr};

    fn bus_with_both_listeners() -> EventBus {
        let mut bus = EventBus::new();
        bus.register(Box::new(IntervalListener));
        bus.register(Box::new(PointerInfoListener));
        bus
    }

    #[test]
    fn assign_num_event_updates_the_interval_slot() {
        let bus = bus_with_both_listeners();
        let mut state = ProgramState::new();
        let x = VarId(0);
        bus.dispatch_assign(&mut state, &AssignEvent::Num { x, n: BigInt::from(42i64) });
        let dom = state.get_dom(crate::domain::DomId::Interval);
        let iv = dom.as_interval().unwrap().get(x);
        assert_eq!(iv.singleton_value(), Some(42));
    }

    #[test]
    fn points_to_event_is_ignored_by_the_interval_listener() {
        use knight_region::{DeclId, RegionManager, StackFrameId, ValueType};
        let mut regions = RegionManager::new();
        let space = regions.stack_local_space(StackFrameId(0));
        let r = regions.var_region(DeclId(1), space, ValueType::integer(32, Signedness::Signed));

        let bus = bus_with_both_listeners();
        let mut state = ProgramState::new();
        let p = VarId(0);
        bus.dispatch_assign(&mut state, &AssignEvent::PointsTo { x: p, region: r });

        assert!(state.get_dom(crate::domain::DomId::Interval).as_interval().unwrap().get(p).is_top());
        let targets = state
            .get_dom(crate::domain::DomId::PointerInfo)
            .as_pointer_info()
            .unwrap()
            .points_to(p);
        assert!(targets.elements().unwrap().contains(&r));
    }

    #[test]
    fn assumption_event_narrows_the_interval_slot() {
        let bus = bus_with_both_listeners();
        let mut state = ProgramState::new();
        let x = VarId(0);
        bus.dispatch_assign(&mut state, &AssignEvent::Num { x, n: BigInt::from(0i64) });

        // Reset to an unconstrained interval, then assume `x <= 10`.
        {
            use crate::domain::{DomId, DomainValue};
            use knight_num::{Bound, Interval};
            let mut dom = state.get_dom(DomId::Interval).as_interval().unwrap().clone();
            dom.set(x, Interval::new(Bound::finite(0), Bound::finite(100)));
            state.set_dom(DomId::Interval, DomainValue::Interval(dom));
        }

        let expr = LinearExpr::from_var(x).add_scalar(&BigInt::from(-10i64));
        let constraint = LinearConstraint::new(expr, ConstraintKind::Le);
        bus.dispatch_assumption(&mut state, &AssumptionEvent { constraint }, &FixpointConfig::default());

        let iv = state.get_dom(crate::domain::DomId::Interval).as_interval().unwrap().get(x);
        assert_eq!(iv.ub().finite_value(), Some(10));
    }
}
