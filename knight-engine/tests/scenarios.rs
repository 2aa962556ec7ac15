//! End-to-end scenarios exercising [`knight_engine::fixpoint::Fixpoint`]
//! over a [`knight_engine::cfg::ControlFlowGraph`], rather than the
//! resolver or a single domain in isolation.

use knight_engine::ast::{BinOp, Expr, Stmt};
use knight_engine::cfg::{BasicBlock, BlockId, ControlFlowGraph, StmtId};
use knight_engine::config::FixpointConfig;
use knight_engine::domain::DomId;
use knight_engine::event::{EventBus, IntervalListener};
use knight_engine::fixpoint::{CancelToken, Fixpoint};
use knight_engine::linear::VarId;
use knight_engine::resolver::SymbolResolver;
use knight_engine::symbol::{LocationContext, SymbolManager};
use knight_num::{BigInt, Bound, Interval, Signedness};
use knight_region::{DeclId, RegionId, RegionManager, StackFrameId, ValueType};

/// Installs a `tracing` subscriber so a failing scenario's stabilization
/// log lines show up under `cargo test -- --nocapture`. Safe to call from
/// every test: `try_init` no-ops past the first call.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn int_ty() -> ValueType {
    ValueType::integer(32, Signedness::Signed)
}

fn decl_ref(region: RegionId) -> Expr {
    Expr::DeclRef { region }
}

fn lit(n: i64) -> Expr {
    Expr::IntLiteral {
        value: BigInt::from(n),
        ty: int_ty(),
    }
}

fn assign(region: RegionId, op: BinOp, rhs: Expr) -> Stmt {
    Stmt::Expr(Expr::Binary {
        lhs: Box::new(decl_ref(region)),
        rhs: Box::new(rhs),
        op,
        ty: int_ty(),
    })
}

fn cmp(region: RegionId, op: BinOp, rhs: Expr) -> Expr {
    Expr::Binary {
        lhs: Box::new(decl_ref(region)),
        rhs: Box::new(rhs),
        op,
        ty: int_ty(),
    }
}

fn interval_of(
    state: &knight_engine::state::ProgramState,
    frame: StackFrameId,
    region: RegionId,
) -> knight_num::Interval<i64> {
    let def = state
        .get_region_def(region, frame)
        .expect("region has a live definition in this state");
    state
        .get_dom(DomId::Interval)
        .as_interval()
        .unwrap()
        .get(VarId::from(def))
}

/// Scenario 1: an additive chain (`x = 2; x += 3; x += 10;`) resolves to a
/// single concrete value with no loss of precision.
#[test]
fn additive_chain_tracks_a_precise_singleton() {
    init_tracing();
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
    entry.push_stmt(StmtId(2), assign(x, BinOp::AddAssign, lit(10)));

    let mut cfg = ControlFlowGraph::new(BlockId(0), BlockId(0));
    cfg.add_block(entry);

    let fp = Fixpoint::new(&cfg, frame, FixpointConfig::default());
    let outcome = fp.run(&mut symbols, &regions, &events, &CancelToken::new());

    assert!(!outcome.cancelled());
    let iv = interval_of(outcome.exit_state(), frame, x);
    assert_eq!(iv.singleton_value(), Some(15));
}

/// Scenario 2: a chain mixing every arithmetic operator the interval
/// domain's `binary_op` table supports stays a precise singleton
/// throughout, the way a constant-folded ALU sequence would.
#[test]
fn full_alu_chain_stays_precise() {
    init_tracing();
    let mut symbols = SymbolManager::new();
    let mut regions = RegionManager::new();
    let mut events = EventBus::new();
    events.register(Box::new(IntervalListener));
    let frame = StackFrameId(0);
    let space = regions.stack_local_space(frame);
    let x = regions.var_region(DeclId(1), space, int_ty());

    let mut entry = BasicBlock::new(BlockId(0));
    entry.push_stmt(StmtId(0), assign(x, BinOp::Assign, lit(10))); // x = 10
    entry.push_stmt(StmtId(1), assign(x, BinOp::SubAssign, lit(3))); // x = 7
    entry.push_stmt(StmtId(2), assign(x, BinOp::MulAssign, lit(2))); // x = 14
    entry.push_stmt(StmtId(3), assign(x, BinOp::DivAssign, lit(7))); // x = 2
    entry.push_stmt(StmtId(4), assign(x, BinOp::AddAssign, lit(1))); // x = 3

    let mut cfg = ControlFlowGraph::new(BlockId(0), BlockId(0));
    cfg.add_block(entry);

    let fp = Fixpoint::new(&cfg, frame, FixpointConfig::default());
    let outcome = fp.run(&mut symbols, &regions, &events, &CancelToken::new());

    assert!(!outcome.cancelled());
    let iv = interval_of(outcome.exit_state(), frame, x);
    assert_eq!(iv.singleton_value(), Some(3));
}

/// Scenario 3: a loop bounded by a free external symbol `n` (never
/// assigned within this frame, so the first read mints an external
/// region-symbol-value) still reaches a fixpoint without being cancelled,
/// and the widened/narrowed loop counter keeps the sound fact that it
/// never goes negative.
#[test]
fn loop_bounded_by_a_free_symbol_reaches_a_sound_fixpoint() {
    init_tracing();
    let mut symbols = SymbolManager::new();
    let mut regions = RegionManager::new();
    let mut events = EventBus::new();
    events.register(Box::new(IntervalListener));
    let frame = StackFrameId(0);
    let space = regions.stack_local_space(frame);
    let i = regions.var_region(DeclId(1), space, int_ty());
    let n = regions.var_region(DeclId(2), space, int_ty());

    // entry: i = 0;
    let mut entry = BasicBlock::new(BlockId(0));
    entry.push_stmt(StmtId(0), assign(i, BinOp::Assign, lit(0)));
    entry.add_successor(BlockId(1));

    // head: while (i < n)
    let mut head = BasicBlock::new(BlockId(1));
    head.push_stmt(StmtId(1), cmp(i, BinOp::Lt, decl_ref(n)));
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
    let post_loop = outcome
        .state_before(BlockId(3))
        .expect("exit block is reached");
    let iv = interval_of(post_loop, frame, i);
    assert_eq!(iv.lb().finite_value(), Some(0), "the loop counter never runs negative");
}

/// Scenario 4: branching on `if (x == 5)` leaves the then-branch with `x`
/// narrowed to the singleton `5` and the else-branch with the equality
/// assumption's negation folded in.
#[test]
fn equality_branch_narrows_each_side_of_the_diamond() {
    init_tracing();
    let mut symbols = SymbolManager::new();
    let mut regions = RegionManager::new();
    let mut events = EventBus::new();
    events.register(Box::new(IntervalListener));
    let frame = StackFrameId(0);
    let space = regions.stack_local_space(frame);
    let x = regions.var_region(DeclId(1), space, int_ty());

    // entry: x = <external free value>; if (x == 5)
    let loc0 = LocationContext {
        frame,
        block: BlockId(0),
        stmt: StmtId(0),
    };
    let mut entry = BasicBlock::new(BlockId(0));
    entry.push_stmt(StmtId(0), cmp(x, BinOp::Eq, lit(5)));
    entry.set_conditional_terminator(StmtId(0), BlockId(1), BlockId(2));

    let then_block = BasicBlock::new(BlockId(1));
    let else_block = BasicBlock::new(BlockId(2));
    let join_block = BasicBlock::new(BlockId(3));

    let mut cfg = ControlFlowGraph::new(BlockId(0), BlockId(3));
    cfg.add_block(entry);
    cfg.add_block(then_block);
    cfg.add_block(else_block);
    cfg.add_block(join_block);

    // Bind `x` to a free external symbol before the fixpoint runs, the
    // way the first read of a not-yet-assigned parameter does.
    let mut seed_state = knight_engine::state::ProgramState::new();
    SymbolResolver::new(&mut symbols, &regions, &events).eval_stmt(
        &mut seed_state,
        frame,
        BlockId(0),
        StmtId(u32::MAX),
        &Stmt::Decl { region: x, init: None },
    );
    let _ = loc0;

    let fp = Fixpoint::new(&cfg, frame, FixpointConfig::default());
    let outcome = fp.run(&mut symbols, &regions, &events, &CancelToken::new());

    assert!(!outcome.cancelled());
    let then_state = outcome.state_before(BlockId(1)).expect("then branch is reached");
    let then_iv = interval_of(then_state, frame, x);
    assert_eq!(then_iv.singleton_value(), Some(5));

    let else_state = outcome.state_before(BlockId(2)).expect("else branch is reached");
    let else_iv = interval_of(else_state, frame, x);
    assert!(
        !else_iv.singleton_value().is_some_and(|v| v == 5),
        "the else branch's assumption rules out exactly 5"
    );
}

/// Scenario 5: casting a non-singleton interval down to a narrower width
/// that can't represent every value in it over-approximates to the full
/// destination range, rather than silently wrapping each bound
/// independently (see `separate_numerical::assign_cast`).
#[test]
fn narrowing_cast_over_approximates_when_the_source_spans_the_modulus() {
    init_tracing();
    let mut symbols = SymbolManager::new();
    let mut regions = RegionManager::new();
    let mut events = EventBus::new();
    events.register(Box::new(IntervalListener));
    let frame = StackFrameId(0);
    let space = regions.stack_local_space(frame);
    let x = regions.var_region(DeclId(1), space, int_ty());
    let y = regions.var_region(
        DeclId(2),
        space,
        ValueType::integer(8, Signedness::Unsigned),
    );

    // if (cond) x = 0; else x = 300;  -- join leaves x in a wide interval
    let mut entry = BasicBlock::new(BlockId(0));
    entry.push_stmt(StmtId(0), cmp(x, BinOp::Eq, lit(0)));
    entry.set_conditional_terminator(StmtId(0), BlockId(1), BlockId(2));

    let mut then_block = BasicBlock::new(BlockId(1));
    then_block.push_stmt(StmtId(1), assign(x, BinOp::Assign, lit(0)));
    then_block.add_successor(BlockId(3));

    let mut else_block = BasicBlock::new(BlockId(2));
    else_block.push_stmt(StmtId(2), assign(x, BinOp::Assign, lit(300)));
    else_block.add_successor(BlockId(3));

    let join_block = BasicBlock::new(BlockId(3));

    let mut cfg = ControlFlowGraph::new(BlockId(0), BlockId(3));
    cfg.add_block(entry);
    cfg.add_block(then_block);
    cfg.add_block(else_block);
    cfg.add_block(join_block);

    let fp = Fixpoint::new(&cfg, frame, FixpointConfig::default());
    let outcome = fp.run(&mut symbols, &regions, &events, &CancelToken::new());
    assert!(!outcome.cancelled());

    let join_state = outcome.exit_state().clone();
    let x_def = join_state
        .get_region_def(x, frame)
        .expect("join assigns a fresh conjured def for x");

    let loc = LocationContext {
        frame,
        block: BlockId(3),
        stmt: StmtId(3),
    };
    let mut cast_state = join_state;
    let mut resolver = SymbolResolver::new(&mut symbols, &regions, &events);
    resolver.eval_cast_assignment(&mut cast_state, loc, y, x, 8, Signedness::Unsigned);
    let _ = x_def;

    let y_iv = interval_of(&cast_state, frame, y);
    assert_eq!(y_iv.lb().finite_value(), Some(0));
    assert_eq!(y_iv.ub().finite_value(), Some(255));
}

/// Scenario 6: after a two-branch join where each side assigns a
/// different concrete value, the merged region definition is a fresh
/// conjured symbol whose interval is exactly the join of the two branch
/// singletons — not either branch's value alone, and not top.
#[test]
fn disagreeing_branches_bind_a_fresh_def_joining_both_branch_values() {
    init_tracing();
    let mut symbols = SymbolManager::new();
    let mut regions = RegionManager::new();
    let mut events = EventBus::new();
    events.register(Box::new(IntervalListener));
    let frame = StackFrameId(0);
    let space = regions.stack_local_space(frame);
    let x = regions.var_region(DeclId(1), space, int_ty());

    let mut entry = BasicBlock::new(BlockId(0));
    entry.push_stmt(StmtId(0), cmp(x, BinOp::Eq, lit(0)));
    entry.set_conditional_terminator(StmtId(0), BlockId(1), BlockId(2));

    let mut then_block = BasicBlock::new(BlockId(1));
    then_block.push_stmt(StmtId(1), assign(x, BinOp::Assign, lit(1)));
    then_block.add_successor(BlockId(3));

    let mut else_block = BasicBlock::new(BlockId(2));
    else_block.push_stmt(StmtId(2), assign(x, BinOp::Assign, lit(100)));
    else_block.add_successor(BlockId(3));

    let join_block = BasicBlock::new(BlockId(3));

    let mut cfg = ControlFlowGraph::new(BlockId(0), BlockId(3));
    cfg.add_block(entry);
    cfg.add_block(then_block);
    cfg.add_block(else_block);
    cfg.add_block(join_block);

    let fp = Fixpoint::new(&cfg, frame, FixpointConfig::default());
    let outcome = fp.run(&mut symbols, &regions, &events, &CancelToken::new());

    assert!(!outcome.cancelled());
    let iv = interval_of(outcome.exit_state(), frame, x);
    assert_eq!(
        iv,
        Interval::new(Bound::finite(1), Bound::finite(100)),
        "the fresh def's interval is the join of both branches' singletons"
    );
}
