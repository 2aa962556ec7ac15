//! Errors returned across the engine's public API boundary.
//!
//! Precondition violations (mismatched bit widths, division by zero,
//! out-of-range shifts) are not represented here: they are programmer bugs
//! and abort via `assert!`/`debug_assert!` at the point of violation, the
//! way a modeled outcome is kept distinct from a host-bug panic.
//! `EngineError` is reserved for recoverable conditions a front-end can hit
//! while driving the engine.

use knight_region::RegionId;

/// Errors a front-end can observe while querying a
/// [`crate::state::ProgramState`].
///
/// Cancellation is deliberately not a variant here: the fixpoint engine
/// reports it as a flag on its ordinary return value
/// ([`crate::fixpoint::FixpointOutcome`]), not as an `Err`, since a
/// cancelled analysis still yields a sound (if imprecise) summary rather
/// than a failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A statement referenced a region with no live definition in the
    /// current frame — this is surfaced rather than panicking because the
    /// query API, unlike the resolver's internal walk, is reachable
    /// directly by front-ends and checkers.
    #[error("no live definition for region {0:?} in the current frame")]
    NoLiveRegionDef(RegionId),
}
