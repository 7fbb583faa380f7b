//! Scan driver and the shared split queue.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use splitscan_connectors::{
    ColumnHandle, Connector, ConnectorError, ConnectorQueryCtx, ConnectorSplit, DataSource, NextBatch,
    TableHandle,
};
use splitscan_core::filter::Filter;
use splitscan_core::schema::Schema;
use splitscan_core::types::RowBatch;

use crate::error::{ExecError, Result};
use crate::metrics::ScanMetrics;

/// Splits waiting to be scanned, shared by every worker of a scan.
#[derive(Debug, Default)]
pub struct SplitQueue {
    splits: Mutex<VecDeque<Arc<ConnectorSplit>>>,
}

impl SplitQueue {
    pub fn new(splits: impl IntoIterator<Item = Arc<ConnectorSplit>>) -> Self {
        Self {
            splits: Mutex::new(splits.into_iter().collect()),
        }
    }

    pub fn push(&self, split: Arc<ConnectorSplit>) {
        self.lock().push_back(split);
    }

    pub fn pop(&self) -> Option<Arc<ConnectorSplit>> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Arc<ConnectorSplit>>> {
        self.splits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything needed to open a data source for one table scan.
#[derive(Clone)]
pub struct ScanRequest {
    pub connector: Arc<dyn Connector>,
    pub output_type: Schema,
    pub table_handle: TableHandle,
    pub column_handles: HashMap<String, ColumnHandle>,
    /// Rows asked for per `next` call.
    pub batch_rows: u64,
    /// Filters pushed into each data source, by output column index. The
    /// scan applies any filter its data source does not support.
    pub dynamic_filters: Vec<(usize, Filter)>,
}

impl ScanRequest {
    pub fn new(
        connector: Arc<dyn Connector>,
        output_type: Schema,
        table_handle: TableHandle,
        column_handles: HashMap<String, ColumnHandle>,
    ) -> Self {
        Self {
            connector,
            output_type,
            table_handle,
            column_handles,
            batch_rows: 1024,
            dynamic_filters: Vec::new(),
        }
    }

    pub fn with_batch_rows(mut self, batch_rows: u64) -> Self {
        self.batch_rows = batch_rows;
        self
    }

    pub fn with_dynamic_filter(mut self, column_index: usize, filter: Filter) -> Self {
        self.dynamic_filters.push((column_index, filter));
        self
    }
}

/// One data source working through a split queue.
pub struct TableScan<'a> {
    source: Box<dyn DataSource + 'a>,
    queue: &'a SplitQueue,
    batch_rows: u64,
    /// Filters the data source refused, applied to each batch here.
    scan_filters: Vec<(usize, Filter)>,
    metrics: ScanMetrics,
}

impl<'a> TableScan<'a> {
    pub fn new(request: &ScanRequest, ctx: &'a ConnectorQueryCtx, queue: &'a SplitQueue) -> Result<Self> {
        if request.batch_rows == 0 {
            return Err(ExecError::Invalid("batch_rows must be positive".into()));
        }
        let mut source = request.connector.create_data_source(
            &request.output_type,
            &request.table_handle,
            &request.column_handles,
            ctx,
        )?;
        let mut scan_filters = Vec::new();
        for (column, filter) in &request.dynamic_filters {
            match source.add_dynamic_filter(*column, filter.clone()) {
                Ok(()) => {}
                Err(ConnectorError::NotSupported(_)) => {
                    if *column >= request.output_type.len() {
                        return Err(ExecError::Invalid(format!(
                            "dynamic filter column {column} out of range for {} output columns",
                            request.output_type.len()
                        )));
                    }
                    scan_filters.push((*column, filter.clone()));
                }
                Err(e) => return Err(e.into()),
            }
        }
        if !scan_filters.is_empty() {
            tracing::debug!(
                connector = request.connector.connector_id(),
                filters = scan_filters.len(),
                "applying dynamic filters in the scan"
            );
        }
        Ok(Self {
            source,
            queue,
            batch_rows: request.batch_rows,
            scan_filters,
            metrics: ScanMetrics::new(),
        })
    }

    /// Next non-empty batch, or `None` once the queue is drained.
    ///
    /// Blocks the calling thread on `Pending` futures.
    pub fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        loop {
            if self.source.state().accepts_split() {
                let Some(split) = self.queue.pop() else {
                    return Ok(None);
                };
                self.source.add_split(split)?;
                self.metrics.record_split();
            }
            match self.source.next(self.batch_rows)? {
                NextBatch::Ready(batch) => {
                    let batch = self.apply_scan_filters(batch)?;
                    self.metrics.record_batch(&batch);
                    if batch.num_rows() > 0 {
                        return Ok(Some(batch));
                    }
                }
                NextBatch::Exhausted => {}
                NextBatch::Pending(ready) => {
                    self.metrics.record_pending();
                    futures::executor::block_on(ready);
                }
            }
        }
    }

    fn apply_scan_filters(&mut self, batch: RowBatch) -> Result<RowBatch> {
        if self.scan_filters.is_empty() || batch.num_rows() == 0 {
            return Ok(batch);
        }
        let mut keep = vec![true; batch.num_rows()];
        for (column, filter) in &self.scan_filters {
            let values = batch
                .columns
                .get(*column)
                .map(|c| &c.values)
                .ok_or_else(|| ExecError::Invalid(format!("batch has no column {column}")))?;
            for (k, v) in keep.iter_mut().zip(values) {
                *k = *k && filter.test(v);
            }
        }
        let dropped = keep.iter().filter(|k| !**k).count() as u64;
        if dropped == 0 {
            return Ok(batch);
        }
        self.metrics.record_filtered(dropped);
        batch.filter(&keep).map_err(|e| ExecError::Invalid(e.to_string()))
    }

    /// Scan to the end, handing each batch to `sink`.
    pub fn drain(mut self, mut sink: impl FnMut(RowBatch) -> Result<()>) -> Result<ScanMetrics> {
        while let Some(batch) = self.next_batch()? {
            sink(batch)?;
        }
        Ok(self.finish())
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn source(&self) -> &dyn DataSource {
        self.source.as_ref()
    }

    /// Close the data source and return the scan's metrics.
    pub fn finish(mut self) -> ScanMetrics {
        self.metrics.absorb_source(self.source.as_ref());
        self.source.close();
        self.metrics
    }
}

/// Scan `splits` with `workers` data sources in parallel.
///
/// Each worker owns one data source and pulls splits from a shared queue
/// until it is empty. Batches are folded into the metrics' row digest and
/// discarded.
pub fn parallel_scan(
    request: &ScanRequest,
    ctx: &ConnectorQueryCtx,
    splits: Vec<Arc<ConnectorSplit>>,
    workers: usize,
) -> Result<ScanMetrics> {
    if workers == 0 {
        return Err(ExecError::Invalid("parallel scan needs at least one worker".into()));
    }
    let queue = SplitQueue::new(splits);
    let workers = workers.min(queue.len().max(1));
    tracing::debug!(
        connector = request.connector.connector_id(),
        splits = queue.len(),
        workers,
        "starting parallel scan"
    );

    let results: Vec<Result<ScanMetrics>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let queue = &queue;
                scope.spawn(move || {
                    let span = tracing::debug_span!("scan_worker", worker);
                    let _enter = span.enter();
                    TableScan::new(request, ctx, queue)?.drain(|_| Ok(()))
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(worker, handle)| handle.join().unwrap_or(Err(ExecError::Worker(worker))))
            .collect()
    });

    let mut total = ScanMetrics::new();
    for result in results {
        total.merge(&result?);
    }
    Ok(total)
}
