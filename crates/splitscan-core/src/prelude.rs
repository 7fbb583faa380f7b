//! Convenient re-exports for downstream crates.

pub use crate::budget::{BudgetGuard, MemoryBudget};
pub use crate::config::ScanConfig;
pub use crate::error::{Error, Result};
pub use crate::filter::Filter;
pub use crate::hash::{Hash256, RowDigest};
pub use crate::schema::{DataType, Field, Schema};
pub use crate::types::{Column, RowBatch, Scalar};
