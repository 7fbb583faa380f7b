//! Per-scan counters.
//!
//! Counters are plain integers owned by one worker; workers merge their
//! metrics at the end of a parallel scan instead of sharing atomics.

use std::collections::BTreeMap;

use serde::Serialize;

use splitscan_connectors::{DataSource, RuntimeCounter};
use splitscan_core::hash::RowDigest;
use splitscan_core::types::RowBatch;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanMetrics {
    /// Rows handed to the caller, after any filtering.
    pub rows: u64,
    /// Rows dropped by dynamic filters the data source could not take.
    pub rows_filtered: u64,
    /// `completed_rows` as reported by the data sources.
    pub completed_rows: u64,
    pub completed_bytes: u64,
    pub batches: u64,
    /// `Ready` batches that carried no rows.
    pub empty_batches: u64,
    pub splits: u64,
    pub pending_waits: u64,
    /// Data-source runtime stats summed by name.
    pub source_stats: BTreeMap<String, RuntimeCounter>,
    #[serde(skip)]
    pub digest: RowDigest,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch(&mut self, batch: &RowBatch) {
        let rows = batch.num_rows() as u64;
        if rows == 0 {
            self.empty_batches += 1;
            return;
        }
        self.rows += rows;
        self.batches += 1;
        self.digest.update(batch);
    }

    pub fn record_filtered(&mut self, rows: u64) {
        self.rows_filtered += rows;
    }

    pub fn record_split(&mut self) {
        self.splits += 1;
    }

    pub fn record_pending(&mut self) {
        self.pending_waits += 1;
    }

    /// Fold in a data source's final counters. Call once per source.
    pub fn absorb_source(&mut self, source: &dyn DataSource) {
        self.completed_rows += source.completed_rows();
        self.completed_bytes += source.completed_bytes();
        merge_stats(&mut self.source_stats, &source.runtime_stats());
    }

    pub fn merge(&mut self, other: &ScanMetrics) {
        self.rows += other.rows;
        self.rows_filtered += other.rows_filtered;
        self.completed_rows += other.completed_rows;
        self.completed_bytes += other.completed_bytes;
        self.batches += other.batches;
        self.empty_batches += other.empty_batches;
        self.splits += other.splits;
        self.pending_waits += other.pending_waits;
        merge_stats(&mut self.source_stats, &other.source_stats);
        self.digest.merge(&other.digest);
    }

    /// Hex digest of every row seen, independent of order and batching.
    pub fn digest_hex(&self) -> String {
        self.digest.finish().to_hex()
    }

    pub fn emit(&self, label: &str) {
        tracing::info!(
            scan = label,
            rows = self.rows,
            filtered = self.rows_filtered,
            bytes = self.completed_bytes,
            batches = self.batches,
            splits = self.splits,
            pending = self.pending_waits,
            "scan finished"
        );
        for (name, counter) in &self.source_stats {
            tracing::debug!(scan = label, stat = %name, value = counter.value, "source stat");
        }
    }
}

fn merge_stats(into: &mut BTreeMap<String, RuntimeCounter>, from: &BTreeMap<String, RuntimeCounter>) {
    for (name, counter) in from {
        into.entry(name.clone())
            .and_modify(|c| c.value = c.value.saturating_add(counter.value))
            .or_insert(*counter);
    }
}
