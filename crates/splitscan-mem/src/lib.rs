#![forbid(unsafe_code)]
//! splitscan-mem: hard memory budgeting with RAII guards.
//!
//! Concrete implementations of the interfaces in `splitscan-core::budget`.
//! A query owns one `MemoryBudgetImpl`; every data source created for that
//! query borrows it and holds a guard while it materialises a batch.

pub mod error;
pub mod guard;
pub mod tracking;

pub use guard::{BudgetGuardImpl, MemoryBudgetImpl};
pub use tracking::PeakTracker;
