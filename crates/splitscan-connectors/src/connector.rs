//! Connector, data source, and data sink traits + the types they exchange.
//!
//! Invariants every `DataSource` upholds:
//! - one split at a time: `add_split` is accepted only in `Unbound` or
//!   `Exhausted`, anything else is a protocol violation;
//! - `completed_rows`/`completed_bytes` never decrease;
//! - `Pending` is a cooperative yield: the caller awaits the returned future
//!   before calling `next` again and never spins.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use splitscan_core::filter::Filter;
use splitscan_core::schema::{Field, Schema};
use splitscan_core::types::RowBatch;
use splitscan_mem::MemoryBudgetImpl;

use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, Result};
use crate::handle::{ColumnHandle, TableHandle};
use crate::split::ConnectorSplit;

/// Resolves when a data source that returned `Pending` can make progress.
pub type ContinueFuture = BoxFuture<'static, ()>;

/// Outcome of one `DataSource::next` call.
pub enum NextBatch {
    /// Rows from the current split. May be empty after filtering.
    Ready(RowBatch),
    /// The current split is consumed; add another split or drop the source.
    Exhausted,
    /// No data yet; await the future, then call `next` again.
    Pending(ContinueFuture),
}

impl fmt::Debug for NextBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextBatch::Ready(b) => write!(f, "Ready({} rows)", b.num_rows()),
            NextBatch::Exhausted => f.write_str("Exhausted"),
            NextBatch::Pending(_) => f.write_str("Pending"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSourceState {
    Unbound,
    SplitAssigned,
    Producing,
    Exhausted,
    Closed,
}

impl DataSourceState {
    pub fn accepts_split(self) -> bool {
        matches!(self, DataSourceState::Unbound | DataSourceState::Exhausted)
    }

    /// True while a split is bound and may still produce rows.
    pub fn has_split(self) -> bool {
        matches!(self, DataSourceState::SplitAssigned | DataSourceState::Producing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterUnit {
    None,
    Bytes,
    Nanos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCounter {
    pub value: i64,
    pub unit: CounterUnit,
}

impl RuntimeCounter {
    pub fn count(value: u64) -> Self {
        Self {
            value: i64::try_from(value).unwrap_or(i64::MAX),
            unit: CounterUnit::None,
        }
    }

    pub fn bytes(value: u64) -> Self {
        Self {
            value: i64::try_from(value).unwrap_or(i64::MAX),
            unit: CounterUnit::Bytes,
        }
    }
}

/// Pull-based producer bound to one table and column projection.
pub trait DataSource: Send {
    /// Bind the next split. Valid only in `Unbound` or `Exhausted`.
    fn add_split(&mut self, split: Arc<ConnectorSplit>) -> Result<()>;

    /// Produce up to `max_rows` rows from the current split.
    fn next(&mut self, max_rows: u64) -> Result<NextBatch>;

    /// Push a filter on output column `column_index` into the scan.
    ///
    /// Sources that cannot apply it must fail with `NotSupported` so the
    /// engine applies the filter itself.
    fn add_dynamic_filter(&mut self, column_index: usize, filter: Filter) -> Result<()>;

    fn completed_rows(&self) -> u64;

    fn completed_bytes(&self) -> u64;

    fn runtime_stats(&self) -> BTreeMap<String, RuntimeCounter>;

    fn state(&self) -> DataSourceState;

    /// Release the current split and any held resources. Dropping the
    /// source has the same effect.
    fn close(&mut self);
}

/// Write path. No bundled connector implements it.
pub trait DataSink: Send {
    fn append(&mut self, batch: &RowBatch) -> Result<()>;

    /// Flush and return a description of what was committed.
    fn finish(&mut self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertTableHandle {
    pub connector_id: String,
    pub table_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitStrategy {
    NoCommit,
    TaskCommit,
}

/// Opaque task executor handed to connectors at construction.
pub trait Executor: Send + Sync {
    fn spawn(&self, task: Box<dyn FnOnce() + Send + 'static>);
}

/// Runs each task on a fresh OS thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn spawn(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        std::thread::spawn(task);
    }
}

/// Per-query context a data source borrows for its whole lifetime.
///
/// The memory budget belongs to the query, not to any data source.
#[derive(Debug, Clone)]
pub struct ConnectorQueryCtx {
    query_id: String,
    task_id: String,
    budget: MemoryBudgetImpl,
    session: ConnectorConfig,
}

impl ConnectorQueryCtx {
    pub fn new(query_id: impl Into<String>, task_id: impl Into<String>, budget: MemoryBudgetImpl) -> Self {
        Self {
            query_id: query_id.into(),
            task_id: task_id.into(),
            budget,
            session: ConnectorConfig::default(),
        }
    }

    pub fn with_session(mut self, session: ConnectorConfig) -> Self {
        self.session = session;
        self
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn memory_budget(&self) -> &MemoryBudgetImpl {
        &self.budget
    }

    pub fn session(&self) -> &ConnectorConfig {
        &self.session
    }
}

/// Pair every output field with the column handle registered under its name.
///
/// Fails when the output type is empty, repeats a name, names a column with
/// no handle, or maps two output fields onto the same underlying column.
pub(crate) fn bind_output_columns<'h>(
    output_type: &'h Schema,
    column_handles: &'h HashMap<String, ColumnHandle>,
) -> Result<Vec<(&'h Field, &'h ColumnHandle)>> {
    if output_type.is_empty() {
        return Err(ConnectorError::Validation(
            "output type must name at least one column".into(),
        ));
    }
    output_type
        .ensure_unique_names()
        .map_err(|e| ConnectorError::Validation(e.to_string()))?;

    let mut seen = HashSet::with_capacity(output_type.len());
    let mut bound = Vec::with_capacity(output_type.len());
    for field in &output_type.fields {
        let handle = column_handles.get(&field.name).ok_or_else(|| {
            ConnectorError::Lookup(format!("no column handle for output column '{}'", field.name))
        })?;
        if !seen.insert(handle.name()) {
            return Err(ConnectorError::Validation(format!(
                "column '{}' is mapped to more than one output column",
                handle.name()
            )));
        }
        bound.push((field, handle));
    }
    Ok(bound)
}

/// A pluggable backend implementing the handle/split/data-source contract.
pub trait Connector: Send + Sync {
    fn connector_id(&self) -> &str;

    /// Build a data source producing `output_type`, where every output field
    /// name is a key of `column_handles`.
    fn create_data_source<'a>(
        &self,
        output_type: &Schema,
        table_handle: &TableHandle,
        column_handles: &HashMap<String, ColumnHandle>,
        ctx: &'a ConnectorQueryCtx,
    ) -> Result<Box<dyn DataSource + 'a>>;

    fn create_data_sink(
        &self,
        input_type: &Schema,
        insert_handle: &InsertTableHandle,
        ctx: &ConnectorQueryCtx,
        commit_strategy: CommitStrategy,
    ) -> Result<Box<dyn DataSink>>;

    /// Whether data sources of this connector accept dynamic filters.
    fn can_add_dynamic_filter(&self) -> bool {
        false
    }
}

/// Named constructor for connectors, registered in [`crate::registry`].
pub trait ConnectorFactory: Send + Sync {
    fn connector_name(&self) -> &str;

    fn new_connector(
        &self,
        id: &str,
        config: ConnectorConfig,
        io_executor: Option<Arc<dyn Executor>>,
        cpu_executor: Option<Arc<dyn Executor>>,
    ) -> Result<Arc<dyn Connector>>;
}
