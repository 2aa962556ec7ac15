//! Numeric knobs for the fixpoint engine and constraint solver.
//!
//! Threaded through explicitly rather than hardcoded, so callers can tune
//! widening/narrowing behavior per function without recompiling.

/// Configuration for one run of the fixpoint engine over a function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixpointConfig {
    /// Number of join-with-transfer iterations to attempt at a loop head
    /// before falling back to widening.
    pub widening_delay: u32,
    /// Maximum number of narrowing iterations applied after widening
    /// stabilizes, to recover precision.
    pub narrowing_iterations: u32,
    /// Minimum constraint-system size before a trigger table is built
    /// instead of a flat per-constraint scan.
    pub trigger_table_threshold: usize,
    /// Maximum number of constraint-refinement operations allowed per
    /// fixpoint cycle.
    pub constraint_ops_per_cycle: u32,
}

impl FixpointConfig {
    /// Per-cycle operation budget used to derive the default
    /// [`Self::constraint_ops_per_cycle`].
    const OPS_PER_CYCLE: u32 = 27;

    /// The budget multiplier applied to [`Self::OPS_PER_CYCLE`] to derive the
    /// default [`Self::constraint_ops_per_cycle`].
    const BUDGET_MULTIPLIER: u32 = 10;
}

impl Default for FixpointConfig {
    fn default() -> Self {
        FixpointConfig {
            widening_delay: 1,
            narrowing_iterations: 2,
            trigger_table_threshold: 3,
            constraint_ops_per_cycle: Self::BUDGET_MULTIPLIER * Self::OPS_PER_CYCLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_the_documented_budget() {
        let cfg = FixpointConfig::default();
        assert_eq!(cfg.trigger_table_threshold, 3);
        assert_eq!(cfg.constraint_ops_per_cycle, 270);
    }
}
