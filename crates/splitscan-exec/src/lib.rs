#![forbid(unsafe_code)]
//! splitscan-exec: drives data sources the way an engine would.
//!
//! [`TableScan`] feeds one data source splits from a shared [`SplitQueue`]
//! and pulls batches until the queue is empty, awaiting `Pending` futures
//! as they come. [`parallel_scan`] runs several of those on scoped threads
//! against one query context and merges their [`ScanMetrics`].

pub mod error;
pub mod metrics;
pub mod scan;

pub use error::{ExecError, Result};
pub use metrics::ScanMetrics;
pub use scan::{parallel_scan, ScanRequest, SplitQueue, TableScan};
