//! Scan configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Hard memory cap (in bytes) shared by all data sources of one query.
    pub mem_cap_bytes: usize,

    /// Upper bound on rows requested per `next()` call.
    pub max_batch_rows: usize,

    /// How many splits a table is cut into when the caller does not say.
    pub split_parts: u64,

    /// Worker count for parallel scans.
    pub max_parallel_tasks: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mem_cap_bytes: 512 * 1024 * 1024, // 512 MiB default
            max_batch_rows: 1024,
            split_parts: 4,
            max_parallel_tasks: 4,
        }
    }
}

impl ScanConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SPLITSCAN_MEM_CAP_BYTES`: memory cap in bytes
    /// - `SPLITSCAN_MAX_BATCH_ROWS`: rows per batch
    /// - `SPLITSCAN_SPLIT_PARTS`: default split count
    /// - `SPLITSCAN_MAX_PARALLEL_TASKS`: worker count
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("SPLITSCAN_MEM_CAP_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.mem_cap_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("SPLITSCAN_MAX_BATCH_ROWS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_batch_rows = v;
            }
        }

        if let Ok(s) = std::env::var("SPLITSCAN_SPLIT_PARTS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.split_parts = v;
            }
        }

        if let Ok(s) = std::env::var("SPLITSCAN_MAX_PARALLEL_TASKS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_parallel_tasks = v;
            }
        }

        cfg
    }

    /// Reject settings that would make a scan loop forever or never start.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_rows == 0 {
            return Err(Error::Config("max_batch_rows must be positive".into()));
        }
        if self.split_parts == 0 {
            return Err(Error::Config("split_parts must be positive".into()));
        }
        if self.max_parallel_tasks == 0 {
            return Err(Error::Config("max_parallel_tasks must be positive".into()));
        }
        Ok(())
    }
}
