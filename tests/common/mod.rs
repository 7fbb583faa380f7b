//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use splitscan_connectors::config::ConnectorConfig;
use splitscan_connectors::hive::HiveColumnHandle;
use splitscan_connectors::tpch::{table_schema, TpchColumnHandle, TpchConnector, TpchTable};
use splitscan_connectors::{
    ColumnHandle, Connector, ConnectorQueryCtx, ConnectorSplit, DataSource, Executor, NextBatch,
    TableHandle,
};
use splitscan_core::prelude::{Field, RowBatch, Schema};
use splitscan_exec::ScanRequest;
use splitscan_mem::MemoryBudgetImpl;

pub fn ctx() -> ConnectorQueryCtx {
    ConnectorQueryCtx::new("test-query", "test-task", MemoryBudgetImpl::unlimited())
}

pub fn tpch_connector() -> Arc<TpchConnector> {
    Arc::new(TpchConnector::new("tpch", ConnectorConfig::new()).expect("tpch connector"))
}

/// Output schema and handles for `columns` of `table`, in the given order.
pub fn tpch_columns(table: TpchTable, columns: &[&str]) -> (Schema, HashMap<String, ColumnHandle>) {
    let schema = table_schema(table);
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| schema.fields[schema.index_of(c).expect("known column")].clone())
        .collect();
    let handles = columns
        .iter()
        .map(|c| (c.to_string(), ColumnHandle::Tpch(TpchColumnHandle::new(*c))))
        .collect();
    (Schema::new(fields), handles)
}

pub fn tpch_request(table: TpchTable, scale_factor: f64, columns: &[&str]) -> ScanRequest {
    let conn = tpch_connector();
    let handle = splitscan_connectors::tpch::TpchTableHandle::new("tpch", table, scale_factor)
        .expect("table handle");
    let (output, handles) = tpch_columns(table, columns);
    let connector: Arc<dyn Connector> = conn;
    ScanRequest::new(connector, output, TableHandle::Tpch(handle), handles)
}

pub fn hive_handles(columns: &[HiveColumnHandle]) -> (Schema, HashMap<String, ColumnHandle>) {
    let fields = columns
        .iter()
        .map(|h| Field::new(h.name.clone(), h.data_type, true))
        .collect();
    let handles = columns
        .iter()
        .map(|h| (h.name.clone(), ColumnHandle::Hive(h.clone())))
        .collect();
    (Schema::new(fields), handles)
}

/// Rows of `batches` rendered as strings and sorted, for multiset equality.
pub fn sorted_rows(batches: &[RowBatch]) -> Vec<String> {
    let mut rows: Vec<String> = batches
        .iter()
        .flat_map(|b| (0..b.num_rows()).map(move |i| format!("{:?}", b.row(i).expect("row"))))
        .collect();
    rows.sort();
    rows
}

/// Drain the current split of `source`, blocking on `Pending`.
pub fn drain_split(source: &mut dyn DataSource, batch_rows: u64) -> Vec<RowBatch> {
    let mut out = Vec::new();
    loop {
        match source.next(batch_rows).expect("next") {
            NextBatch::Ready(batch) => out.push(batch),
            NextBatch::Exhausted => return out,
            NextBatch::Pending(ready) => futures::executor::block_on(ready),
        }
    }
}

/// Scan every split through one data source.
pub fn scan_all(source: &mut dyn DataSource, splits: &[Arc<ConnectorSplit>], batch_rows: u64) -> Vec<RowBatch> {
    let mut out = Vec::new();
    for split in splits {
        source.add_split(Arc::clone(split)).expect("add_split");
        out.extend(drain_split(source, batch_rows));
    }
    out
}

/// Executor that queues tasks until the test runs them.
#[derive(Default)]
pub struct ManualExecutor {
    tasks: Mutex<Vec<Box<dyn FnOnce() + Send + 'static>>>,
}

impl ManualExecutor {
    pub fn pending(&self) -> usize {
        self.tasks.lock().expect("tasks").len()
    }

    pub fn run_all(&self) -> usize {
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock().expect("tasks"));
        let n = tasks.len();
        for task in tasks {
            task();
        }
        n
    }
}

impl Executor for ManualExecutor {
    fn spawn(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        self.tasks.lock().expect("tasks").push(task);
    }
}
