//! Abstract memory budget interfaces.
//!
//! The concrete implementation lives in `splitscan-mem`. Only the traits live
//! here so connectors can be written against the API without depending on the
//! accounting logic.

/// Bytes held against a budget; returned when dropped.
///
/// Implementations must be RAII (release on `Drop`) and `Send` so a data
/// source holding one can move between worker threads.
pub trait BudgetGuard: Send {
    /// Number of bytes currently accounted for by this guard.
    fn bytes(&self) -> usize;
    /// Debug tag for metrics/tracing.
    fn tag(&self) -> &'static str {
        "guard"
    }
}

/// A handle representing a memory-cap enforcer shared by one query.
///
/// Data sources call `try_acquire` before materialising a batch. On `None`
/// they fail the `next()` call instead of allocating past the cap.
pub trait MemoryBudget: Send + Sync + 'static {
    type Guard: BudgetGuard;

    /// Attempt to acquire `bytes` from the live budget. Returns a guard on success.
    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard>;

    /// Total configured capacity (bytes).
    fn capacity_bytes(&self) -> usize;

    /// Approximate currently used bytes (advisory; not a correctness API).
    fn used_bytes(&self) -> usize;
}
