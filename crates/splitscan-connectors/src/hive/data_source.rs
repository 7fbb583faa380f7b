//! Data source reading hive file splits.
//!
//! Output columns are assembled per batch from three places: columns read
//! from the file, per-split constants (partition keys and synthesized
//! columns), and the row ordinal within the split. Rows are then dropped by
//! the bucket-conversion filter, the table's subfield filters and any
//! dynamic filters, in that order.
//!
//! With an io executor the file read runs on the executor and `next`
//! returns `Pending` until it completes.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::task::AtomicWaker;

use splitscan_core::filter::Filter;
use splitscan_core::schema::{DataType, Field, Schema};
use splitscan_core::types::{Column, RowBatch, Scalar};
use splitscan_io::readers::BatchReader;
use splitscan_mem::BudgetGuardImpl;

use crate::connector::{
    bind_output_columns, ConnectorQueryCtx, DataSource, DataSourceState, Executor, NextBatch,
    RuntimeCounter,
};
use crate::error::{ConnectorError, Result};
use crate::handle::{ColumnHandle, TableHandle};
use crate::hive::bucket::BucketConversionFilter;
use crate::hive::handle::{HiveColumnHandle, HiveColumnType, HiveTableHandle};
use crate::hive::partition::{
    partition_value, synthesized_value, BUCKET_COLUMN, FILE_MODIFIED_TIME_COLUMN,
    FILE_SIZE_COLUMN, PATH_COLUMN,
};
use crate::hive::reader::FileReaderFactory;
use crate::hive::split::{FileFormat, HiveConnectorSplit};
use crate::split::ConnectorSplit;

/// Bytes assumed per value of a variable-width column when reserving budget.
const VARIABLE_WIDTH_ESTIMATE: usize = 32;

/// Read when no file column is otherwise needed, so batches keep a row count.
const ROW_CARRIER: &str = "$row";

#[derive(Debug, Clone)]
enum OutputSource {
    /// Index into the split's read columns.
    File(usize),
    /// Constant for the whole split.
    PartitionKey,
    Synthesized,
    RowIndex,
}

#[derive(Debug, Clone)]
struct OutputColumn {
    alias: String,
    handle: HiveColumnHandle,
    source: OutputSource,
}

/// Options the connector passes to each data source.
#[derive(Clone)]
pub struct HiveScanOptions {
    pub readers: Arc<dyn FileReaderFactory>,
    pub io_executor: Option<Arc<dyn Executor>>,
    /// Upper bound on rows requested from a reader per `next` call.
    pub max_read_rows: u64,
}

/// Per-split state.
struct ActiveSplit {
    split: Arc<ConnectorSplit>,
    /// `None` while a read is in flight, or for a split pruned by a
    /// partition filter.
    reader: Option<Box<dyn BatchReader>>,
    pruned: bool,
    /// Per-output constant, for partition-key and synthesized outputs.
    constants: Vec<Option<Scalar>>,
    bucket_filter: Option<(BucketConversionFilter, Vec<usize>)>,
    next_row_index: u64,
}

type ReadOutcome = (Box<dyn BatchReader>, splitscan_io::Result<Option<RowBatch>>);

/// A read running on the io executor.
struct InFlight {
    outcome: Mutex<Option<ReadOutcome>>,
    waker: AtomicWaker,
    done: AtomicBool,
}

impl InFlight {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            waker: AtomicWaker::new(),
            done: AtomicBool::new(false),
        }
    }

    fn complete(&self, outcome: ReadOutcome) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        self.done.store(true, Ordering::Release);
        self.waker.wake();
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn take(&self) -> Option<ReadOutcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Resolves once the in-flight read has completed.
struct ReadReady(Arc<InFlight>);

impl Future for ReadReady {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0.is_done() {
            return Poll::Ready(());
        }
        self.0.waker.register(cx.waker());
        if self.0.is_done() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

pub struct HiveDataSource<'a> {
    ctx: &'a ConnectorQueryCtx,
    options: HiveScanOptions,
    table: HiveTableHandle,
    outputs: Vec<OutputColumn>,
    /// File columns every split reads, before bucket columns are added.
    base_reads: Vec<Field>,
    /// Subfield filters on file columns, by name.
    file_filters: Vec<(String, Filter)>,
    /// Subfield filters on partition keys, checked once per split.
    partition_filters: Vec<(String, DataType, Filter)>,
    /// Filters on output columns, by output index.
    dynamic_filters: Vec<(usize, Filter)>,

    state: DataSourceState,
    active: Option<ActiveSplit>,
    /// Column names of the active split's reads, in read order.
    reads: Vec<String>,
    in_flight: Option<Arc<InFlight>>,
    read_guard: Option<BudgetGuardImpl>,
    row_bytes: usize,

    completed_rows: u64,
    bytes_done: u64,
    completed_bytes: u64,
    rows_filtered_by_bucket: u64,
    rows_filtered_by_predicate: u64,
    splits_processed: u64,
    pending_waits: u64,
}

impl<'a> HiveDataSource<'a> {
    pub fn new(
        output_type: &Schema,
        table_handle: &TableHandle,
        column_handles: &HashMap<String, ColumnHandle>,
        options: HiveScanOptions,
        ctx: &'a ConnectorQueryCtx,
    ) -> Result<Self> {
        let table = table_handle.as_hive()?.clone();

        let mut outputs = Vec::with_capacity(output_type.len());
        let mut base_reads: Vec<Field> = Vec::new();
        let mut row_bytes = 0;
        for (field, handle) in bind_output_columns(output_type, column_handles)? {
            let handle = handle.as_hive()?;
            if handle.data_type != field.data_type {
                return Err(ConnectorError::Validation(format!(
                    "output column '{}' declared {} but column '{}' is {}",
                    field.name, field.data_type, handle.name, handle.data_type
                )));
            }
            let source = match handle.column_type {
                HiveColumnType::Regular => {
                    base_reads.push(Field::new(handle.name.clone(), handle.data_type, true));
                    OutputSource::File(base_reads.len() - 1)
                }
                HiveColumnType::PartitionKey => OutputSource::PartitionKey,
                HiveColumnType::Synthesized => {
                    check_synthesized(handle)?;
                    OutputSource::Synthesized
                }
                HiveColumnType::RowIndex => {
                    if handle.data_type != DataType::Int64 {
                        return Err(ConnectorError::Validation(format!(
                            "row index column '{}' must be bigint",
                            handle.name
                        )));
                    }
                    OutputSource::RowIndex
                }
            };
            row_bytes += handle.data_type.fixed_width().unwrap_or(VARIABLE_WIDTH_ESTIMATE);
            outputs.push(OutputColumn {
                alias: field.name.clone(),
                handle: handle.clone(),
                source,
            });
        }

        let mut file_filters = Vec::new();
        let mut partition_filters = Vec::new();
        for (name, filter) in table.effective_filters() {
            let handle = column_handles
                .values()
                .filter_map(|h| h.as_hive().ok())
                .find(|h| &h.name == name);
            match handle.map(|h| (h.column_type, h.data_type)) {
                Some((HiveColumnType::PartitionKey, data_type)) => {
                    partition_filters.push((name.clone(), data_type, filter.clone()));
                }
                Some((HiveColumnType::Regular, data_type)) => {
                    push_read(&mut base_reads, name, data_type);
                    file_filters.push((name.clone(), filter.clone()));
                }
                Some((other, _)) => {
                    return Err(ConnectorError::NotSupported(format!(
                        "filters on {other} column '{name}'"
                    )));
                }
                None => {
                    let data_type = table
                        .data_columns
                        .as_ref()
                        .and_then(|s| s.index_of(name).map(|i| s.fields[i].data_type))
                        .ok_or_else(|| {
                            ConnectorError::Lookup(format!(
                                "filter column '{name}' is not a known column of {}",
                                table.table_name
                            ))
                        })?;
                    push_read(&mut base_reads, name, data_type);
                    file_filters.push((name.clone(), filter.clone()));
                }
            }
        }

        Ok(Self {
            ctx,
            options,
            table,
            outputs,
            base_reads,
            file_filters,
            partition_filters,
            dynamic_filters: Vec::new(),
            state: DataSourceState::Unbound,
            active: None,
            reads: Vec::new(),
            in_flight: None,
            read_guard: None,
            row_bytes,
            completed_rows: 0,
            bytes_done: 0,
            completed_bytes: 0,
            rows_filtered_by_bucket: 0,
            rows_filtered_by_predicate: 0,
            splits_processed: 0,
            pending_waits: 0,
        })
    }

    pub fn current_split(&self) -> Option<&ConnectorSplit> {
        self.active.as_ref().map(|a| a.split.as_ref())
    }

    /// File schema and projection for `reads`.
    ///
    /// With declared data columns the file is read by name through them.
    /// Without, JSON lines are still read by key, but a delimited text file
    /// has no names to resolve, so reading any of its columns is an error.
    fn file_layout(&self, format: FileFormat, reads: &mut Vec<Field>) -> Result<(Schema, Vec<usize>)> {
        let declared = self.table.data_columns.as_ref().filter(|s| !s.is_empty());
        if reads.is_empty() {
            let carrier = match declared {
                Some(schema) => schema.fields[0].clone(),
                None => Field::new(ROW_CARRIER, DataType::Utf8, true),
            };
            reads.push(carrier);
        }
        match declared {
            Some(schema) => {
                let projection = reads
                    .iter()
                    .map(|f| {
                        schema.index_of(&f.name).ok_or_else(|| {
                            ConnectorError::Lookup(format!(
                                "column '{}' is not a data column of {}",
                                f.name, self.table.table_name
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((schema.clone(), projection))
            }
            None => {
                if format == FileFormat::Text {
                    if let Some(f) = reads.iter().find(|f| f.name != ROW_CARRIER) {
                        return Err(ConnectorError::Validation(format!(
                            "reading column '{}' from text files of {} requires declared data columns",
                            f.name, self.table.table_name
                        )));
                    }
                }
                Ok((Schema::new(reads.clone()), (0..reads.len()).collect()))
            }
        }
    }

    fn open_split(&mut self, split: Arc<ConnectorSplit>) -> Result<ActiveSplit> {
        let hive = split.as_hive()?;
        hive.validate()?;

        let mut constants = Vec::with_capacity(self.outputs.len());
        for out in &self.outputs {
            constants.push(match out.source {
                OutputSource::PartitionKey => {
                    Some(partition_value(hive, &out.handle.name, out.handle.data_type)?)
                }
                OutputSource::Synthesized => {
                    Some(synthesized_value(hive, &out.handle.name, out.handle.data_type)?)
                }
                OutputSource::File(_) | OutputSource::RowIndex => None,
            });
        }

        for (name, data_type, filter) in &self.partition_filters {
            let value = partition_value(hive, name, *data_type)?;
            if !filter.test(&value) {
                tracing::debug!(path = %hive.file_path, key = %name, "split pruned by partition filter");
                self.reads.clear();
                return Ok(ActiveSplit {
                    split,
                    reader: None,
                    pruned: true,
                    constants,
                    bucket_filter: None,
                    next_row_index: 0,
                });
            }
        }

        let mut reads = self.base_reads.clone();
        let bucket_filter = match (&hive.bucket_conversion, hive.table_bucket_number) {
            (Some(conv), Some(bucket)) => {
                let filter = BucketConversionFilter::new(conv, bucket)?;
                let mut idx = Vec::with_capacity(conv.bucket_column_handles.len());
                for h in &conv.bucket_column_handles {
                    idx.push(push_read(&mut reads, &h.name, h.data_type));
                }
                Some((filter, idx))
            }
            _ => None,
        };

        let (file_schema, projection) = self.file_layout(hive.file_format, &mut reads)?;
        let reader = self
            .options
            .readers
            .create_reader(hive, &file_schema, &projection)?;
        self.reads = reads.into_iter().map(|f| f.name).collect();

        Ok(ActiveSplit {
            split,
            reader: Some(reader),
            pruned: false,
            constants,
            bucket_filter,
            next_row_index: 0,
        })
    }

    fn finish_split(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(
                connector = %active.split.connector_id(),
                rows = self.completed_rows,
                pruned = active.pruned,
                "hive split exhausted"
            );
        }
        self.bytes_done = self.completed_bytes;
        self.read_guard = None;
        self.state = DataSourceState::Exhausted;
    }

    /// Turn a batch of read columns into an output batch.
    fn assemble(&mut self, read: RowBatch) -> Result<RowBatch> {
        let num_rows = read.num_rows();
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| ConnectorError::Invariant("read completed without a split".into()))?;
        self.completed_rows += num_rows as u64;

        let mut keep = vec![true; num_rows];
        if let Some((filter, idx)) = &active.bucket_filter {
            let cols: Vec<&Column> = idx.iter().map(|&i| &read.columns[i]).collect();
            let mask = filter.mask(&cols, num_rows);
            let dropped = mask.iter().filter(|k| !**k).count();
            self.rows_filtered_by_bucket += dropped as u64;
            if dropped == num_rows && num_rows > 0 {
                tracing::warn!(
                    bucket = filter.table_bucket_number(),
                    rows = num_rows,
                    "bucket conversion dropped every row of a chunk"
                );
            }
            keep = mask;
        }

        let mut dropped_by_predicate = 0u64;
        for (name, filter) in &self.file_filters {
            let Some(i) = self.reads.iter().position(|r| r == name) else {
                continue;
            };
            for (k, v) in keep.iter_mut().zip(&read.columns[i].values) {
                if *k && !filter.test(v) {
                    *k = false;
                    dropped_by_predicate += 1;
                }
            }
        }

        let first_row_index = active.next_row_index;
        active.next_row_index += num_rows as u64;

        let mut slots: Vec<Option<Column>> = read.columns.into_iter().map(Some).collect();
        let mut columns = Vec::with_capacity(self.outputs.len());
        for (out, constant) in self.outputs.iter().zip(&active.constants) {
            let values = match (&out.source, constant) {
                (OutputSource::File(i), _) => slots
                    .get_mut(*i)
                    .and_then(Option::take)
                    .map(|c| c.values)
                    .ok_or_else(|| {
                        ConnectorError::Invariant(format!("read column {i} missing from batch"))
                    })?,
                (OutputSource::RowIndex, _) => (first_row_index..first_row_index + num_rows as u64)
                    .map(|i| Scalar::I64(i64::try_from(i).unwrap_or(i64::MAX)))
                    .collect(),
                (_, Some(value)) => vec![value.clone(); num_rows],
                (_, None) => vec![Scalar::Null; num_rows],
            };
            columns.push(Column::new(out.alias.clone(), values));
        }

        for (out_idx, filter) in &self.dynamic_filters {
            for (k, v) in keep.iter_mut().zip(&columns[*out_idx].values) {
                if *k && !filter.test(v) {
                    *k = false;
                    dropped_by_predicate += 1;
                }
            }
        }
        self.rows_filtered_by_predicate += dropped_by_predicate;

        let batch = RowBatch::new(columns);
        if keep.iter().all(|k| *k) {
            Ok(batch)
        } else {
            Ok(batch.filter(&keep)?)
        }
    }

    /// One read step. Leaves `read_guard` set; `next` releases it.
    fn read_next(&mut self, rows: usize) -> Result<NextBatch> {
        let read = if let Some(flight) = self.in_flight.take() {
            if !flight.is_done() {
                self.in_flight = Some(Arc::clone(&flight));
                return Ok(NextBatch::Pending(Box::pin(ReadReady(flight))));
            }
            let (reader, outcome) = flight
                .take()
                .ok_or_else(|| ConnectorError::Invariant("completed read has no result".into()))?;
            self.record_bytes(reader.bytes_read());
            if let Some(active) = self.active.as_mut() {
                active.reader = Some(reader);
            }
            outcome?
        } else {
            let Some(active) = self.active.as_mut() else {
                self.finish_split();
                return Ok(NextBatch::Exhausted);
            };
            let Some(mut reader) = active.reader.take() else {
                self.finish_split();
                return Ok(NextBatch::Exhausted);
            };
            let reserve = rows.saturating_mul(self.row_bytes);
            let guard = match self.ctx.memory_budget().acquire(reserve, "hive-read") {
                Ok(guard) => guard,
                Err(e) => {
                    active.reader = Some(reader);
                    return Err(e.into());
                }
            };
            self.read_guard = Some(guard);

            if let Some(executor) = &self.options.io_executor {
                let flight = Arc::new(InFlight::new());
                let task_flight = Arc::clone(&flight);
                executor.spawn(Box::new(move || {
                    let outcome = reader.next_batch(rows);
                    task_flight.complete((reader, outcome));
                }));
                self.in_flight = Some(Arc::clone(&flight));
                self.pending_waits += 1;
                self.state = DataSourceState::Producing;
                return Ok(NextBatch::Pending(Box::pin(ReadReady(flight))));
            }

            let outcome = reader.next_batch(rows);
            let read_bytes = reader.bytes_read();
            active.reader = Some(reader);
            self.record_bytes(read_bytes);
            outcome?
        };

        let result = match read {
            None => {
                self.finish_split();
                NextBatch::Exhausted
            }
            Some(batch) => {
                let out = self.assemble(batch)?;
                self.state = DataSourceState::Producing;
                tracing::trace!(rows = out.num_rows(), "hive batch");
                NextBatch::Ready(out)
            }
        };
        Ok(result)
    }

    /// `read_bytes` is the active reader's running total.
    fn record_bytes(&mut self, read_bytes: u64) {
        self.completed_bytes = self.completed_bytes.max(self.bytes_done + read_bytes);
    }
}

/// Index of `name` in `reads`, appending it if absent.
fn push_read(reads: &mut Vec<Field>, name: &str, data_type: DataType) -> usize {
    match reads.iter().position(|f| f.name == name) {
        Some(i) => i,
        None => {
            reads.push(Field::new(name, data_type, true));
            reads.len() - 1
        }
    }
}

fn check_synthesized(handle: &HiveColumnHandle) -> Result<()> {
    match handle.name.as_str() {
        PATH_COLUMN | FILE_SIZE_COLUMN | FILE_MODIFIED_TIME_COLUMN | BUCKET_COLUMN => Ok(()),
        other => Err(ConnectorError::Lookup(format!(
            "unknown synthesized column '{other}'"
        ))),
    }
}

impl DataSource for HiveDataSource<'_> {
    fn add_split(&mut self, split: Arc<ConnectorSplit>) -> Result<()> {
        if !self.state.accepts_split() {
            return Err(ConnectorError::Invariant(format!(
                "add_split called in state {:?}; the previous split must be exhausted first",
                self.state
            )));
        }
        let active = self.open_split(split)?;
        if let Ok(hive) = active.split.as_hive() {
            tracing::debug!(
                path = %hive.file_path,
                start = hive.start,
                length = hive.length,
                "hive split assigned"
            );
        }
        self.active = Some(active);
        self.splits_processed += 1;
        self.state = DataSourceState::SplitAssigned;
        Ok(())
    }

    fn next(&mut self, max_rows: u64) -> Result<NextBatch> {
        if max_rows == 0 {
            return Err(ConnectorError::Validation("batch size must be positive".into()));
        }
        if self.state == DataSourceState::Closed {
            return Err(ConnectorError::Invariant("next called on a closed data source".into()));
        }
        if !self.state.has_split() {
            return Ok(NextBatch::Exhausted);
        }
        let rows = usize::try_from(max_rows.min(self.options.max_read_rows.max(1)))
            .unwrap_or(usize::MAX);
        let result = self.read_next(rows);
        // the guard only outlives this call while a read is in flight
        if !matches!(result, Ok(NextBatch::Pending(_))) {
            self.read_guard = None;
        }
        result
    }

    fn add_dynamic_filter(&mut self, column_index: usize, filter: Filter) -> Result<()> {
        if column_index >= self.outputs.len() {
            return Err(ConnectorError::Validation(format!(
                "dynamic filter column {column_index} out of range for {} output columns",
                self.outputs.len()
            )));
        }
        tracing::debug!(
            column = %self.outputs[column_index].alias,
            "dynamic filter added"
        );
        self.dynamic_filters.push((column_index, filter));
        Ok(())
    }

    fn completed_rows(&self) -> u64 {
        self.completed_rows
    }

    fn completed_bytes(&self) -> u64 {
        self.completed_bytes
    }

    fn runtime_stats(&self) -> BTreeMap<String, RuntimeCounter> {
        BTreeMap::from([
            ("rowsRead".to_string(), RuntimeCounter::count(self.completed_rows)),
            (
                "rowsFilteredByBucket".to_string(),
                RuntimeCounter::count(self.rows_filtered_by_bucket),
            ),
            (
                "rowsFilteredByPredicate".to_string(),
                RuntimeCounter::count(self.rows_filtered_by_predicate),
            ),
            ("bytesRead".to_string(), RuntimeCounter::bytes(self.completed_bytes)),
            ("splitsProcessed".to_string(), RuntimeCounter::count(self.splits_processed)),
            ("pendingWaits".to_string(), RuntimeCounter::count(self.pending_waits)),
        ])
    }

    fn state(&self) -> DataSourceState {
        self.state
    }

    fn close(&mut self) {
        self.active = None;
        self.in_flight = None;
        self.read_guard = None;
        self.state = DataSourceState::Closed;
    }
}
