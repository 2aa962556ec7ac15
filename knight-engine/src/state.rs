//! The abstract program state: the per-path snapshot the fixpoint engine
//! joins/widens/meets/narrows at control-flow points, plus the
//! folding-set manager that interns and reference-counts them.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use knight_region::{RegionId, RegionManager, StackFrameId};

use crate::cfg::StmtId;
use crate::domain::{AbstractDomain, DomId, DomainValue};
use crate::linear::{ConstraintSystem, VarId};
use crate::separate_numerical::SeparateNumericalDomain;
use crate::symbol::{LocationContext, SExprId, SymbolManager};
use crate::Shared;

use strum::IntoEnumIterator;

/// The abstract state at one program point: a domain value per tracked
/// [`DomId`] (absent keys denote top, same convention as
/// [`crate::map_domain::MapDomain`]), the region definitions and
/// statement-result symbols live at this point, and the path constraints
/// gathered to reach it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramState {
    domain_values: BTreeMap<DomId, Shared<DomainValue>>,
    region_defs: BTreeMap<(RegionId, StackFrameId), SExprId>,
    stmt_sexprs: BTreeMap<(StmtId, StackFrameId), SExprId>,
    constraints: ConstraintSystem,
}

impl ProgramState {
    /// The empty state: every domain at top, no known region definitions,
    /// no path constraints. Represents "nothing is known yet", not
    /// unreachability.
    pub fn new() -> Self {
        ProgramState {
            domain_values: BTreeMap::new(),
            region_defs: BTreeMap::new(),
            stmt_sexprs: BTreeMap::new(),
            constraints: ConstraintSystem::new(),
        }
    }

    /// An unreachable-path state.
    pub fn bottom() -> Self {
        let mut s = ProgramState::new();
        s.set_dom(DomId::Interval, DomainValue::bottom());
        s
    }

    /// `true` iff this path is infeasible: a domain is bottom, or the path
    /// constraints are contradictory.
    pub fn is_bottom(&self) -> bool {
        self.constraints.is_contradiction()
            || self.domain_values.values().any(|v| v.is_bottom())
    }

    /// The value bound to `id` (top if untracked).
    pub fn get_dom(&self, id: DomId) -> Shared<DomainValue> {
        self.domain_values
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Shared::new(DomainValue::top_for(id)))
    }

    /// Binds `id` to `v`. Binding to top drops the entry (an absent key
    /// already denotes top, matching [`crate::map_domain::MapDomain`]).
    pub fn set_dom(&mut self, id: DomId, v: DomainValue) {
        if v.is_top() {
            self.domain_values.remove(&id);
        } else {
            self.domain_values.insert(id, Shared::new(v));
        }
    }

    /// Records that `region`, in `frame`, currently holds the value of
    /// `sexpr`.
    pub fn set_region_def(&mut self, region: RegionId, frame: StackFrameId, sexpr: SExprId) {
        self.region_defs.insert((region, frame), sexpr);
    }

    /// The symbol currently bound to `region` in `frame`, if this state has
    /// observed a definition for it.
    pub fn get_region_def(&self, region: RegionId, frame: StackFrameId) -> Option<SExprId> {
        self.region_defs.get(&(region, frame)).copied()
    }

    /// The numerical-domain variable the interval/separate domain tracks
    /// for `region`'s current value, if one is live (the linear-arithmetic
    /// slot a region's symbolic value maps onto).
    pub fn try_get_zvariable(&self, region: RegionId, frame: StackFrameId) -> Option<VarId> {
        self.get_region_def(region, frame).map(VarId::from)
    }

    /// Caches the symbol a statement evaluated to.
    pub fn set_stmt_sexpr(&mut self, stmt: StmtId, frame: StackFrameId, sexpr: SExprId) {
        self.stmt_sexprs.insert((stmt, frame), sexpr);
    }

    /// The symbol a statement last evaluated to in this state, if cached.
    pub fn get_stmt_sexpr(&self, stmt: StmtId, frame: StackFrameId) -> Option<SExprId> {
        self.stmt_sexprs.get(&(stmt, frame)).copied()
    }

    /// The path constraints gathered to reach this state.
    pub fn constraints(&self) -> &ConstraintSystem {
        &self.constraints
    }

    /// Adds a constraint gathered along this path (predicate encoding,
    /// called by the resolver on an `assume`).
    pub fn add_constraint_system(&mut self, other: &ConstraintSystem) {
        self.constraints = self.constraints.merge(other);
    }

    /// The path constraints combined with every finite bound the interval
    /// domain currently tracks: the full linear view of this state's
    /// knowledge, for a checker that wants to hand it to an external
    /// solver.
    pub fn to_linear_constraint_system(&self) -> ConstraintSystem {
        let mut out = self.constraints.clone();
        if let Some(interval) = self.get_dom(DomId::Interval).as_interval() {
            for c in interval.to_linear_constraint_system() {
                out.add_linear(c);
            }
        }
        out
    }

    /// Least-upper-bound of two states at a control-flow merge (spec
    /// §4.4.1). Per-domain values join pointwise; path constraints keep
    /// only what both branches agree on ([`ConstraintSystem::retain`] —
    /// its own doc comment names this exact use); a region definition that
    /// disagrees between branches (or is live on only one of them) is
    /// replaced with a fresh conjured symbol, rather than silently picking
    /// one branch's value, so that later reads of the region don't
    /// spuriously inherit a value it may not actually hold. For an
    /// integer-typed region the fresh symbol's numerical-domain variable is
    /// bound to the join of the two branches' intervals ([`bind_fresh_numeric_vars`]),
    /// not left unbound/top: each side's interval is assigned onto the
    /// fresh variable in its own cloned copy of the numerical domain
    /// before the two copies are joined, so the merged variable keeps the
    /// union of what both branches knew.
    pub fn join(
        &self,
        other: &ProgramState,
        symbols: &mut SymbolManager,
        regions: &RegionManager,
        loc: LocationContext,
    ) -> ProgramState {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut out = ProgramState::new();
        for id in DomId::iter() {
            let joined = self.get_dom(id).join_with(other.get_dom(id).as_ref());
            out.set_dom(id, joined);
        }
        let (region_defs, aliasing, numeric) =
            merge_region_defs(&self.region_defs, &other.region_defs, symbols, regions, loc);
        out.region_defs = region_defs;
        apply_fresh_aliasing(&mut out, &aliasing);
        bind_fresh_numeric_vars(&mut out, self, other, &numeric, |a, b| a.join_with(b));
        out.constraints = self.constraints.retain(&other.constraints);
        out
    }

    /// Widening: like [`Self::join`], but per-domain values widen instead
    /// of join, to guarantee termination across loop iterations.
    pub fn widen(
        &self,
        other: &ProgramState,
        symbols: &mut SymbolManager,
        regions: &RegionManager,
        loc: LocationContext,
    ) -> ProgramState {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let mut out = ProgramState::new();
        for id in DomId::iter() {
            let widened = self.get_dom(id).widen_with(other.get_dom(id).as_ref());
            out.set_dom(id, widened);
        }
        let (region_defs, aliasing, numeric) =
            merge_region_defs(&self.region_defs, &other.region_defs, symbols, regions, loc);
        out.region_defs = region_defs;
        apply_fresh_aliasing(&mut out, &aliasing);
        bind_fresh_numeric_vars(&mut out, self, other, &numeric, |a, b| a.widen_with(b));
        out.constraints = self.constraints.retain(&other.constraints);
        out
    }

    /// Greatest-lower-bound: combines two states known to describe the
    /// same program point (e.g. a caller's state and a callee summary
    /// applied into it), keeping every fact either one knows.
    pub fn meet(&self, other: &ProgramState) -> ProgramState {
        if self.is_bottom() || other.is_bottom() {
            return ProgramState::bottom();
        }
        let mut out = ProgramState::new();
        for id in DomId::iter() {
            let met = self.get_dom(id).meet_with(other.get_dom(id).as_ref());
            out.set_dom(id, met);
        }
        out.region_defs = prefer_self(&self.region_defs, &other.region_defs);
        out.stmt_sexprs = prefer_self(&self.stmt_sexprs, &other.stmt_sexprs);
        out.constraints = self.constraints.merge(&other.constraints);
        out
    }

    /// Narrowing: per-domain values narrow toward
    /// `other`'s; region/statement bookkeeping and path constraints are
    /// unaffected, since narrowing only recovers numerical precision lost
    /// to widening.
    pub fn narrow(&self, other: &ProgramState) -> ProgramState {
        if self.is_bottom() || other.is_bottom() {
            return ProgramState::bottom();
        }
        let mut out = self.clone();
        for id in DomId::iter() {
            let narrowed = self.get_dom(id).narrow_with(other.get_dom(id).as_ref());
            out.set_dom(id, narrowed);
        }
        out
    }

    /// `true` iff `self` is at least as precise as `other`: every tracked
    /// domain refines `other`'s, `self`'s path constraints imply `other`'s,
    /// and the two states agree exactly on every region definition, since
    /// comparing two arbitrary S-exprs for implication is undecidable in
    /// general and structural equality is the decidable approximation this
    /// engine uses instead.
    pub fn leq(&self, other: &ProgramState) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        let domains_ok = DomId::iter().all(|id| self.get_dom(id).leq(other.get_dom(id).as_ref()));
        let region_defs_ok = self.region_defs == other.region_defs;
        let constraints_ok = other
            .constraints
            .linear()
            .iter()
            .all(|c| self.constraints.linear().contains(c));
        domains_ok && region_defs_ok && constraints_ok
    }

    /// Structural equality (both directions of [`Self::leq`]).
    pub fn equals(&self, other: &ProgramState) -> bool {
        self.leq(other) && other.leq(self)
    }
}

impl Default for ProgramState {
    fn default() -> Self {
        ProgramState::new()
    }
}

/// A disagreeing pointer-typed region definition resolved to a fresh
/// conjured variable: the fresh variable may be either candidate, so it is
/// recorded as aliasing both — the join, not the resolver, is what
/// actually knows two symbolic identities have collapsed into one
/// "could be either" value.
struct FreshAliasing {
    fresh: VarId,
    candidate_a: VarId,
    candidate_b: VarId,
}

/// A disagreeing integer-typed region definition resolved to a fresh
/// conjured variable: per spec §4.4.1(3)/§9 ("Shared numerical state under
/// joins"), the numerical domain must see each side's binding assigned onto
/// this fresh variable *before* the two copies are combined, so the merged
/// variable ends up bound to the join/widen of the two branch intervals
/// rather than reading back as top.
struct FreshNumeric {
    fresh: VarId,
    candidate_a: Option<VarId>,
    candidate_b: Option<VarId>,
}

fn merge_region_defs(
    a: &BTreeMap<(RegionId, StackFrameId), SExprId>,
    b: &BTreeMap<(RegionId, StackFrameId), SExprId>,
    symbols: &mut SymbolManager,
    regions: &RegionManager,
    loc: LocationContext,
) -> (
    BTreeMap<(RegionId, StackFrameId), SExprId>,
    Vec<FreshAliasing>,
    Vec<FreshNumeric>,
) {
    let mut keys: Vec<(RegionId, StackFrameId)> = a.keys().chain(b.keys()).copied().collect();
    keys.sort();
    keys.dedup();

    let mut out = BTreeMap::new();
    let mut aliasing = Vec::new();
    let mut numeric = Vec::new();
    let mut tag = 0u32;
    for key in keys {
        let (region, _frame) = key;
        let merged = match (a.get(&key), b.get(&key)) {
            (Some(&x), Some(&y)) if x == y => x,
            (candidate_a, candidate_b) => {
                let ty = regions.region(region).value_type();
                let fresh = symbols.conjured(loc.stmt, ty, loc.frame, Some(tag));
                tag += 1;
                if ty.is_pointer() {
                    if let (Some(&a_def), Some(&b_def)) = (candidate_a, candidate_b) {
                        aliasing.push(FreshAliasing {
                            fresh: VarId::from(fresh),
                            candidate_a: VarId::from(a_def),
                            candidate_b: VarId::from(b_def),
                        });
                    }
                } else {
                    numeric.push(FreshNumeric {
                        fresh: VarId::from(fresh),
                        candidate_a: candidate_a.map(|&d| VarId::from(d)),
                        candidate_b: candidate_b.map(|&d| VarId::from(d)),
                    });
                }
                fresh
            }
        };
        out.insert(key, merged);
    }
    (out, aliasing, numeric)
}

/// Folds each [`FreshAliasing`] into `out`'s pointer-info domain slot, so a
/// fresh variable minted for a disagreeing pointer region def is on record
/// as possibly-aliasing both of the branch values it replaced.
fn apply_fresh_aliasing(out: &mut ProgramState, aliasing: &[FreshAliasing]) {
    if aliasing.is_empty() {
        return;
    }
    let mut dom = match out.get_dom(DomId::PointerInfo).as_pointer_info() {
        Some(d) => d.clone(),
        None => return,
    };
    for fa in aliasing {
        dom.set_aliased(fa.fresh, fa.candidate_a);
        dom.set_aliased(fa.fresh, fa.candidate_b);
    }
    out.set_dom(DomId::PointerInfo, DomainValue::PointerInfo(dom));
}

/// Binds each [`FreshNumeric`]'s fresh variable in `out`'s interval-domain
/// slot to the join/widen of the two branches' bindings, exactly as spec
/// §9 prescribes: clone the numerical domain, assign each side's binding to
/// the new variable in its own copy, then combine the two copies with the
/// same operation (`combine`) the caller is already applying to every other
/// domain slot. `self_state`/`other_state` are the two pre-merge states
/// (`self`/`other` of [`ProgramState::join`]/[`ProgramState::widen`]), read
/// for each side's current interval of its candidate variable.
fn bind_fresh_numeric_vars(
    out: &mut ProgramState,
    self_state: &ProgramState,
    other_state: &ProgramState,
    numeric: &[FreshNumeric],
    combine: impl Fn(&SeparateNumericalDomain, &SeparateNumericalDomain) -> SeparateNumericalDomain,
) {
    if numeric.is_empty() {
        return;
    }
    let self_interval = self_state
        .get_dom(DomId::Interval)
        .as_interval()
        .cloned()
        .unwrap_or_default();
    let other_interval = other_state
        .get_dom(DomId::Interval)
        .as_interval()
        .cloned()
        .unwrap_or_default();

    let mut out_interval = out
        .get_dom(DomId::Interval)
        .as_interval()
        .cloned()
        .unwrap_or_default();
    for fn_ in numeric {
        let mut a_copy = self_interval.clone();
        if let Some(v) = fn_.candidate_a {
            a_copy.set(fn_.fresh, self_interval.get(v));
        }
        let mut b_copy = other_interval.clone();
        if let Some(v) = fn_.candidate_b {
            b_copy.set(fn_.fresh, other_interval.get(v));
        }
        let combined = combine(&a_copy, &b_copy);
        out_interval.set(fn_.fresh, combined.get(fn_.fresh));
    }
    out.set_dom(DomId::Interval, DomainValue::Interval(out_interval));
}

fn prefer_self<K: Ord + Clone, V: Clone>(a: &BTreeMap<K, V>, b: &BTreeMap<K, V>) -> BTreeMap<K, V> {
    let mut out = b.clone();
    out.extend(a.iter().map(|(k, v)| (k.clone(), v.clone())));
    out
}

/// A reference-counted, interned handle to a [`ProgramState`] held by a
/// [`StateManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

/// Interns and reference-counts [`ProgramState`]s — the Rust analog of the
/// reference implementation's folding set of program states, extended with
/// explicit refcounting and a free list: unlike [`RegionManager`] or
/// [`SymbolManager`], whose interned values live for the whole analysis,
/// states are created and discarded at a high rate during fixpoint
/// iteration, so reclaiming slots (rather than only ever growing the pool)
/// matters here.
#[derive(Debug, Default)]
pub struct StateManager {
    slots: Vec<Option<ProgramState>>,
    index: HashMap<ProgramState, StateId>,
    ref_counts: Vec<u32>,
    free_list: Vec<StateId>,
}

impl StateManager {
    /// Creates an empty state manager.
    pub fn new() -> Self {
        StateManager::default()
    }

    /// Interns `state`, returning a handle with one reference held. Calling
    /// this again with a structurally equal state returns the same handle
    /// with its reference count bumped, rather than allocating a new slot.
    pub fn intern(&mut self, state: ProgramState) -> StateId {
        if let Some(&id) = self.index.get(&state) {
            self.ref_counts[id.0 as usize] += 1;
            return id;
        }
        let id = match self.free_list.pop() {
            Some(id) => {
                self.slots[id.0 as usize] = Some(state.clone());
                self.ref_counts[id.0 as usize] = 1;
                id
            }
            None => {
                let id = StateId(self.slots.len() as u32);
                self.slots.push(Some(state.clone()));
                self.ref_counts.push(1);
                id
            }
        };
        self.index.insert(state, id);
        id
    }

    /// Bumps `id`'s reference count (a second owner now holds it).
    pub fn retain(&mut self, id: StateId) {
        self.ref_counts[id.0 as usize] += 1;
    }

    /// Drops one reference to `id`; once it reaches zero the slot is freed
    /// and its id may be reused by a future [`Self::intern`] call.
    pub fn release(&mut self, id: StateId) {
        let idx = id.0 as usize;
        debug_assert!(self.ref_counts[idx] > 0, "releasing an unreferenced state");
        self.ref_counts[idx] -= 1;
        if self.ref_counts[idx] == 0 {
            if let Some(state) = self.slots[idx].take() {
                self.index.remove(&state);
            }
            self.free_list.push(id);
        }
    }

    /// The state behind a live handle. Panics if `id` was already fully
    /// released.
    pub fn get(&self, id: StateId) -> &ProgramState {
        self.slots[id.0 as usize]
            .as_ref()
            .expect("state id released or never allocated")
    }
}
