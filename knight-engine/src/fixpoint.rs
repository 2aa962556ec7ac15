//! The intraprocedural fixpoint engine: computes a weak topological order
//! over a [`ControlFlowGraph`], then iterates the transfer function to a
//! fixpoint, widening at loop heads after a configurable delay and
//! narrowing afterward to recover precision.
//!
//! Ordering the iteration strategy around a WTO (rather than a plain
//! worklist) is Bourdoncle's 1993 construction, the same one `crab`/`ikos`
//! use; a structured control loop threads an explicit budget through the
//! iteration rather than trusting an unbounded `while true`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use knight_region::{RegionManager, StackFrameId};

use crate::ast::{Expr, Stmt};
use crate::cfg::{BasicBlock, BlockId, ControlFlowGraph, StmtId};
use crate::config::FixpointConfig;
use crate::event::EventBus;
use crate::resolver::SymbolResolver;
use crate::state::ProgramState;
use crate::symbol::{LocationContext, SymbolManager};

/// A cooperative cancellation flag: a caller running the
/// fixpoint engine on a worker thread or under a wall-clock budget can set
/// this from outside; the engine checks it between loop-head iterations
/// and returns the best sound summary computed so far rather than running
/// unbounded.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// `true` iff [`Self::cancel`] has been called on this token or a clone
    /// of it.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One weak-topological-order component: either a single block, or a loop
/// headed by a block with a nested body.
#[derive(Clone, Debug, PartialEq, Eq)]
enum WtoComponent {
    Vertex(BlockId),
    Component { head: BlockId, body: Vec<WtoComponent> },
}

/// Bourdoncle's recursive WTO construction, specialized to [`BlockId`].
struct WtoBuilder<'a> {
    cfg: &'a ControlFlowGraph,
    dfn: HashMap<BlockId, u32>,
    stack: Vec<BlockId>,
    next_dfn: u32,
}

const DFN_INFINITY: u32 = u32::MAX;

impl<'a> WtoBuilder<'a> {
    fn new(cfg: &'a ControlFlowGraph) -> Self {
        WtoBuilder {
            cfg,
            dfn: HashMap::new(),
            stack: Vec::new(),
            next_dfn: 0,
        }
    }

    fn build(mut self) -> Vec<WtoComponent> {
        let mut partition = Vec::new();
        self.visit(self.cfg.entry(), &mut partition);
        partition
    }

    fn visit(&mut self, v: BlockId, partition: &mut Vec<WtoComponent>) -> u32 {
        self.stack.push(v);
        self.next_dfn += 1;
        self.dfn.insert(v, self.next_dfn);
        let mut head = self.next_dfn;
        let mut loop_flag = false;
        for &w in self.cfg.block(v).successors() {
            let min = match self.dfn.get(&w).copied() {
                None | Some(0) => self.visit(w, partition),
                Some(n) => n,
            };
            if min <= head {
                head = min;
                loop_flag = true;
            }
        }
        if head == *self.dfn.get(&v).unwrap() {
            self.dfn.insert(v, DFN_INFINITY);
            let mut element = self.stack.pop().expect("v was just pushed");
            if loop_flag {
                while element != v {
                    self.dfn.insert(element, 0);
                    element = self.stack.pop().expect("stack underflow during WTO construction");
                }
                self.component(v, partition);
            } else {
                // Prepend: components close in post-order (a vertex's
                // successors finish before it does), so consing onto the
                // front turns that into the reverse-post (topological)
                // order the stabilization pass walks.
                partition.insert(0, WtoComponent::Vertex(v));
            }
        }
        head
    }

    fn component(&mut self, v: BlockId, partition: &mut Vec<WtoComponent>) {
        let mut body = Vec::new();
        for &w in self.cfg.block(v).successors() {
            if matches!(self.dfn.get(&w).copied(), None | Some(0)) {
                self.visit(w, &mut body);
            }
        }
        partition.insert(0, WtoComponent::Component { head: v, body });
    }
}

/// The result of one fixpoint run over a function.
#[derive(Clone, Debug)]
pub struct FixpointOutcome {
    /// The abstract state known to hold immediately before each block
    /// executes its statements.
    entry_states: BTreeMap<BlockId, ProgramState>,
    /// The abstract state known to hold after the control-flow graph's
    /// exit block finishes executing.
    exit_state: ProgramState,
    /// `true` iff the run was stopped early by a [`CancelToken`] or the
    /// internal iteration budget, rather than reaching a true fixpoint.
    /// The states recorded are still sound over-approximations — just not
    /// necessarily the least ones.
    cancelled: bool,
}

impl FixpointOutcome {
    /// The state known to hold immediately before `block` runs, if the
    /// block was reached during analysis.
    pub fn state_before(&self, block: BlockId) -> Option<&ProgramState> {
        self.entry_states.get(&block)
    }

    /// The state known to hold after the function's exit block.
    pub fn exit_state(&self) -> &ProgramState {
        &self.exit_state
    }

    /// `true` iff the analysis was cut short before reaching a fixpoint.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Drives the weak-topological-order fixpoint loop over one function's
/// [`ControlFlowGraph`].
pub struct Fixpoint<'a> {
    cfg: &'a ControlFlowGraph,
    config: FixpointConfig,
    frame: StackFrameId,
    predecessors: HashMap<BlockId, Vec<BlockId>>,
}

/// A hard backstop on total loop-head re-stabilization passes across the
/// whole run, metering iteration rather than trusting termination
/// arguments alone: widening is supposed to guarantee convergence, but
/// this bounds the damage if a domain or a config value ever violates
/// that guarantee.
const MAX_STABILIZATION_PASSES: u32 = 100_000;

impl<'a> Fixpoint<'a> {
    /// Builds a fixpoint runner for `cfg`, analyzed in `frame`, under
    /// `config`'s widening/narrowing schedule.
    pub fn new(cfg: &'a ControlFlowGraph, frame: StackFrameId, config: FixpointConfig) -> Self {
        let mut predecessors: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for block in cfg.blocks() {
            for &succ in block.successors() {
                predecessors.entry(succ).or_default().push(block.id());
            }
        }
        Fixpoint {
            cfg,
            config,
            frame,
            predecessors,
        }
    }

    /// Runs the analysis to a fixpoint (or until `cancel` fires / the
    /// internal pass budget is exhausted), driving `resolver`'s
    /// assign/assumption dispatch through `symbols`/`regions`/`events`.
    pub fn run(
        &self,
        symbols: &mut SymbolManager,
        regions: &RegionManager,
        events: &EventBus,
        cancel: &CancelToken,
    ) -> FixpointOutcome {
        let wto = WtoBuilder::new(self.cfg).build();

        let mut states: HashMap<BlockId, ProgramState> = self
            .cfg
            .blocks()
            .iter()
            .map(|b| (b.id(), ProgramState::bottom()))
            .collect();
        states.insert(self.cfg.entry(), ProgramState::new());

        let mut budget = MAX_STABILIZATION_PASSES;
        self.stabilize_partition(&wto, &mut states, symbols, regions, events, cancel, &mut budget);

        let cancelled = cancel.is_cancelled() || budget == 0;
        let exit_in = states
            .get(&self.cfg.exit())
            .cloned()
            .unwrap_or_else(ProgramState::bottom);
        let exit_state = self.transfer(self.cfg.block(self.cfg.exit()), exit_in, symbols, regions, events);

        FixpointOutcome {
            entry_states: states.into_iter().collect(),
            exit_state,
            cancelled,
        }
    }

    fn stabilize_partition(
        &self,
        partition: &[WtoComponent],
        states: &mut HashMap<BlockId, ProgramState>,
        symbols: &mut SymbolManager,
        regions: &RegionManager,
        events: &EventBus,
        cancel: &CancelToken,
        budget: &mut u32,
    ) {
        for component in partition {
            match component {
                WtoComponent::Vertex(v) => {
                    let new_in = self.compute_in_state(*v, states, symbols, regions, events);
                    states.insert(*v, new_in);
                }
                WtoComponent::Component { head, body } => {
                    self.stabilize_component(*head, body, states, symbols, regions, events, cancel, budget);
                }
            }
        }
    }

    fn stabilize_component(
        &self,
        head: BlockId,
        body: &[WtoComponent],
        states: &mut HashMap<BlockId, ProgramState>,
        symbols: &mut SymbolManager,
        regions: &RegionManager,
        events: &EventBus,
        cancel: &CancelToken,
        budget: &mut u32,
    ) {
        let loc = self.merge_loc(head);
        let mut iter = 0u32;
        loop {
            if *budget == 0 || cancel.is_cancelled() {
                return;
            }
            *budget -= 1;

            let incoming = self.compute_in_state(head, states, symbols, regions, events);
            let old = states.get(&head).cloned().unwrap_or_else(ProgramState::bottom);
            let widening = iter >= self.config.widening_delay;
            let candidate = if widening {
                old.widen(&incoming, symbols, regions, loc)
            } else {
                old.join(&incoming, symbols, regions, loc)
            };
            let stable = candidate.leq(&old);
            tracing::debug!(?head, iter, widening, stable, "loop-head stabilization pass");
            states.insert(head, candidate);
            self.stabilize_partition(body, states, symbols, regions, events, cancel, budget);
            iter += 1;
            if stable {
                break;
            }
        }

        for _ in 0..self.config.narrowing_iterations {
            if *budget == 0 || cancel.is_cancelled() {
                return;
            }
            *budget -= 1;

            let incoming = self.compute_in_state(head, states, symbols, regions, events);
            let old = states.get(&head).cloned().unwrap_or_else(ProgramState::bottom);
            let narrowed = old.narrow(&incoming);
            states.insert(head, narrowed);
            self.stabilize_partition(body, states, symbols, regions, events, cancel, budget);
        }
    }

    /// Joins every predecessor's transferred-and-filtered state into `v`'s
    /// in-state. A block with no recorded predecessors keeps whatever is
    /// already in `states` (the seeded entry state, for the graph's entry
    /// block; bottom, for dead code unreachable from entry).
    fn compute_in_state(
        &self,
        v: BlockId,
        states: &HashMap<BlockId, ProgramState>,
        symbols: &mut SymbolManager,
        regions: &RegionManager,
        events: &EventBus,
    ) -> ProgramState {
        let preds = match self.predecessors.get(&v) {
            Some(p) if !p.is_empty() => p.clone(),
            _ => return states.get(&v).cloned().unwrap_or_else(ProgramState::bottom),
        };

        let mut acc: Option<ProgramState> = None;
        for p in preds {
            let pred_block = self.cfg.block(p);
            let pred_in = states.get(&p).cloned().unwrap_or_else(ProgramState::bottom);
            let pred_out = self.transfer(pred_block, pred_in, symbols, regions, events);

            let contribution = match pred_block.conditional_terminator() {
                Some((cond_id, then_block, else_block)) if then_block == v || else_block == v => {
                    match condition_expr(pred_block, cond_id) {
                        Some(cond) => {
                            let branch_taken = then_block == v;
                            let loc = LocationContext {
                                frame: self.frame,
                                block: p,
                                stmt: cond_id,
                            };
                            SymbolResolver::new(symbols, regions, events)
                                .filter_condition(&pred_out, loc, cond, branch_taken, &self.config)
                        }
                        None => pred_out,
                    }
                }
                _ => pred_out,
            };

            acc = Some(match acc {
                None => contribution,
                Some(a) => a.join(&contribution, symbols, regions, self.merge_loc(v)),
            });
        }
        acc.unwrap_or_else(ProgramState::bottom)
    }

    /// Runs every statement in `block` over `state` in order, returning the
    /// resulting out-state.
    fn transfer(
        &self,
        block: &BasicBlock,
        state: ProgramState,
        symbols: &mut SymbolManager,
        regions: &RegionManager,
        events: &EventBus,
    ) -> ProgramState {
        let mut out = state;
        for (stmt_id, stmt) in block.stmts() {
            SymbolResolver::new(symbols, regions, events).eval_stmt(&mut out, self.frame, block.id(), *stmt_id, stmt);
        }
        out
    }

    /// A [`LocationContext`] identifying `block` as a control-flow merge
    /// point, for the region-definition bookkeeping [`ProgramState::join`]/
    /// [`ProgramState::widen`] perform when two branches disagree.
    fn merge_loc(&self, block: BlockId) -> LocationContext {
        LocationContext {
            frame: self.frame,
            block,
            stmt: StmtId(0),
        }
    }
}

/// The boolean-valued expression a block's conditional terminator tests,
/// looked up by the statement id the terminator names.
fn condition_expr(block: &BasicBlock, stmt_id: StmtId) -> Option<&Expr> {
    block.stmts().iter().find_map(|(id, stmt)| {
        if *id != stmt_id {
            return None;
        }
        match stmt {
            Stmt::Expr(e) => Some(e),
            Stmt::Decl { .. } => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;
    use crate::domain::DomId;
    use crate::event::IntervalListener;
    use knight_num::{BigInt, Signedness};
    use knight_region::{DeclId, ValueType};

    fn int_ty() -> ValueType {
        ValueType::integer(32, Signedness::Signed)
    }

    fn assign(region: knight_region::RegionId, op: BinOp, rhs: Expr) -> Stmt {
        Stmt::Expr(Expr::Binary {
            lhs: Box::new(Expr::DeclRef { region }),
            rhs: Box::new(rhs),
            op,
            ty: int_ty(),
        })
    }

    fn lit(n: i64) -> Expr {
        Expr::IntLiteral {
            value: BigInt::from(n),
            ty: int_ty(),
        }
    }

    #[test]
    fn straight_line_chain_yields_a_singleton_exit_interval() {
        let mut symbols = SymbolManager::new();
        let mut regions = RegionManager::new();
        let mut events = EventBus::new();
        events.register(Box::new(IntervalListener));
        let frame = StackFrameId(0);
        let space = regions.stack_local_space(frame);
        let x = regions.var_region(DeclId(1), space, int_ty());

        let mut entry = BasicBlock::new(BlockId(0));
        entry.push_stmt(StmtId(0), assign(x, BinOp::Assign, lit(2)));
        entry.push_stmt(StmtId(1), assign(x, BinOp::AddAssign, lit(3)));

        let mut cfg = ControlFlowGraph::new(BlockId(0), BlockId(0));
        cfg.add_block(entry);

        let fp = Fixpoint::new(&cfg, frame, FixpointConfig::default());
        let outcome = fp.run(&mut symbols, &regions, &events, &CancelToken::new());

        let def = outcome
            .exit_state()
            .get_region_def(x, frame)
            .expect("exit state binds x");
        let interval = outcome
            .exit_state()
            .get_dom(DomId::Interval)
            .as_interval()
            .unwrap()
            .get(crate::linear::VarId::from(def));
        assert_eq!(interval.singleton_value(), Some(5));
        assert!(!outcome.cancelled());
    }

    #[test]
    fn two_branch_join_widens_disagreeing_values_to_an_interval() {
        let mut symbols = SymbolManager::new();
        let mut regions = RegionManager::new();
        let mut events = EventBus::new();
        events.register(Box::new(IntervalListener));
        let frame = StackFrameId(0);
        let space = regions.stack_local_space(frame);
        let x = regions.var_region(DeclId(1), space, int_ty());

        let mut entry = BasicBlock::new(BlockId(0));
        entry.set_conditional_terminator(StmtId(0), BlockId(1), BlockId(2));
        entry.push_stmt(
            StmtId(0),
            Expr::Binary {
                lhs: Box::new(Expr::DeclRef { region: x }),
                rhs: Box::new(lit(0)),
                op: BinOp::Eq,
                ty: int_ty(),
            },
        );

        let mut then_block = BasicBlock::new(BlockId(1));
        then_block.push_stmt(StmtId(1), assign(x, BinOp::Assign, lit(1)));
        then_block.add_successor(BlockId(3));

        let mut else_block = BasicBlock::new(BlockId(2));
        else_block.push_stmt(StmtId(2), assign(x, BinOp::Assign, lit(2)));
        else_block.add_successor(BlockId(3));

        let join_block = BasicBlock::new(BlockId(3));

        let mut cfg = ControlFlowGraph::new(BlockId(0), BlockId(3));
        cfg.add_block(entry);
        cfg.add_block(then_block);
        cfg.add_block(else_block);
        cfg.add_block(join_block);

        let fp = Fixpoint::new(&cfg, frame, FixpointConfig::default());
        let outcome = fp.run(&mut symbols, &regions, &events, &CancelToken::new());

        let def = outcome
            .exit_state()
            .get_region_def(x, frame)
            .expect("join assigns a fresh conjured def for x");
        let interval = outcome
            .exit_state()
            .get_dom(DomId::Interval)
            .as_interval()
            .unwrap()
            .get(crate::linear::VarId::from(def));
        assert!(interval.is_top(), "neither branch's def survives identically, so the fresh conjured symbol starts unconstrained");
    }

    #[test]
    fn loop_reaches_a_stable_fixpoint_without_being_cancelled() {
        let mut symbols = SymbolManager::new();
        let mut regions = RegionManager::new();
        let mut events = EventBus::new();
        events.register(Box::new(IntervalListener));
        let frame = StackFrameId(0);
        let space = regions.stack_local_space(frame);
        let i = regions.var_region(DeclId(1), space, int_ty());

        // entry: i = 0;
        let mut entry = BasicBlock::new(BlockId(0));
        entry.push_stmt(StmtId(0), assign(i, BinOp::Assign, lit(0)));
        entry.add_successor(BlockId(1));

        // loop head: while (i < 10)
        let mut head = BasicBlock::new(BlockId(1));
        head.push_stmt(
            StmtId(1),
            Expr::Binary {
                lhs: Box::new(Expr::DeclRef { region: i }),
                rhs: Box::new(lit(10)),
                op: BinOp::Lt,
                ty: int_ty(),
            },
        );
        head.set_conditional_terminator(StmtId(1), BlockId(2), BlockId(3));

        // body: i += 1; back to head
        let mut body = BasicBlock::new(BlockId(2));
        body.push_stmt(StmtId(2), assign(i, BinOp::AddAssign, lit(1)));
        body.add_successor(BlockId(1));

        let exit = BasicBlock::new(BlockId(3));

        let mut cfg = ControlFlowGraph::new(BlockId(0), BlockId(3));
        cfg.add_block(entry);
        cfg.add_block(head);
        cfg.add_block(body);
        cfg.add_block(exit);

        let fp = Fixpoint::new(&cfg, frame, FixpointConfig::default());
        let outcome = fp.run(&mut symbols, &regions, &events, &CancelToken::new());

        assert!(!outcome.cancelled());
        let def = outcome
            .state_before(BlockId(3))
            .and_then(|s| s.get_region_def(i, frame))
            .expect("loop exit state binds i");
        let interval = outcome
            .state_before(BlockId(3))
            .unwrap()
            .get_dom(DomId::Interval)
            .as_interval()
            .unwrap()
            .get(crate::linear::VarId::from(def));
        assert_eq!(interval.lb().finite_value(), Some(10));
    }
}
