//! Data source generating TPC-H rows for one split at a time.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use splitscan_core::filter::Filter;
use splitscan_core::schema::Schema;

use crate::connector::{
    bind_output_columns, ConnectorQueryCtx, DataSource, DataSourceState, NextBatch, RuntimeCounter,
};
use crate::error::{ConnectorError, Result};
use crate::handle::{ColumnHandle, TableHandle};
use crate::split::ConnectorSplit;
use crate::tpch::gen::TpchGenerator;
use crate::tpch::table::{table_schema, TpchTable};

/// Bytes assumed per value of a variable-width column when reserving budget.
const VARIABLE_WIDTH_ESTIMATE: usize = 24;

pub struct TpchDataSource<'a> {
    ctx: &'a ConnectorQueryCtx,
    generator: Arc<dyn TpchGenerator>,
    table: TpchTable,
    scale_factor: f64,
    row_count: u64,
    /// Table-schema index of each output column, in output order.
    columns: Vec<usize>,
    output_names: Vec<String>,
    row_bytes: usize,

    state: DataSourceState,
    split: Option<Arc<ConnectorSplit>>,
    cursor: u64,
    end: u64,

    completed_rows: u64,
    completed_bytes: u64,
    batches: u64,
    splits_processed: u64,
}

impl<'a> TpchDataSource<'a> {
    pub fn new(
        output_type: &Schema,
        table_handle: &TableHandle,
        column_handles: &HashMap<String, ColumnHandle>,
        generator: Arc<dyn TpchGenerator>,
        ctx: &'a ConnectorQueryCtx,
    ) -> Result<Self> {
        let handle = table_handle.as_tpch()?;
        let schema = table_schema(handle.table);

        let mut columns = Vec::with_capacity(output_type.len());
        let mut output_names = Vec::with_capacity(output_type.len());
        let mut row_bytes = 0;
        for (field, column) in bind_output_columns(output_type, column_handles)? {
            let column = column.as_tpch()?;
            let idx = schema.index_of(&column.name).ok_or_else(|| {
                ConnectorError::Lookup(format!(
                    "tpch table {} has no column '{}'",
                    handle.table, column.name
                ))
            })?;
            let generated = schema.fields[idx].data_type;
            if generated != field.data_type {
                return Err(ConnectorError::Validation(format!(
                    "output column '{}' declared {} but {} is {generated}",
                    field.name, field.data_type, column.name
                )));
            }
            row_bytes += generated.fixed_width().unwrap_or(VARIABLE_WIDTH_ESTIMATE);
            columns.push(idx);
            output_names.push(field.name.clone());
        }

        Ok(Self {
            ctx,
            generator,
            table: handle.table,
            scale_factor: handle.scale_factor,
            row_count: handle.row_count(),
            columns,
            output_names,
            row_bytes,
            state: DataSourceState::Unbound,
            split: None,
            cursor: 0,
            end: 0,
            completed_rows: 0,
            completed_bytes: 0,
            batches: 0,
            splits_processed: 0,
        })
    }

    pub fn table(&self) -> TpchTable {
        self.table
    }

    /// Rows the bound table has at the handle's scale factor.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn current_split(&self) -> Option<&ConnectorSplit> {
        self.split.as_deref()
    }

    fn finish_split(&mut self) {
        tracing::debug!(
            table = %self.table,
            rows = self.completed_rows,
            "tpch split exhausted"
        );
        self.split = None;
        self.state = DataSourceState::Exhausted;
    }
}

impl DataSource for TpchDataSource<'_> {
    fn add_split(&mut self, split: Arc<ConnectorSplit>) -> Result<()> {
        if !self.state.accepts_split() {
            return Err(ConnectorError::Invariant(format!(
                "add_split called in state {:?}; the previous split must be exhausted first",
                self.state
            )));
        }
        let range = split.as_tpch()?.row_range(self.row_count);
        tracing::debug!(
            table = %self.table,
            offset = range.start,
            end = range.end,
            "tpch split assigned"
        );
        self.cursor = range.start;
        self.end = range.end;
        self.split = Some(split);
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
        if self.cursor >= self.end {
            self.finish_split();
            return Ok(NextBatch::Exhausted);
        }

        let rows = max_rows.min(self.end - self.cursor);
        let reserve = usize::try_from(rows)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.row_bytes);
        let _guard = self.ctx.memory_budget().acquire(reserve, "tpch-generate")?;

        let mut batch = self.generator.generate_columns(
            self.table,
            self.scale_factor,
            self.cursor,
            rows,
            &self.columns,
        )?;
        for (col, name) in batch.columns.iter_mut().zip(&self.output_names) {
            if col.name != *name {
                col.name.clone_from(name);
            }
        }

        self.cursor += rows;
        self.completed_rows += rows;
        self.completed_bytes += batch.estimated_bytes() as u64;
        self.batches += 1;
        self.state = DataSourceState::Producing;
        tracing::trace!(table = %self.table, rows, cursor = self.cursor, "tpch batch");
        Ok(NextBatch::Ready(batch))
    }

    fn add_dynamic_filter(&mut self, _column_index: usize, _filter: Filter) -> Result<()> {
        Err(ConnectorError::NotSupported(
            "dynamic filters are not supported by the tpch connector".into(),
        ))
    }

    fn completed_rows(&self) -> u64 {
        self.completed_rows
    }

    fn completed_bytes(&self) -> u64 {
        self.completed_bytes
    }

    fn runtime_stats(&self) -> BTreeMap<String, RuntimeCounter> {
        BTreeMap::from([
            ("generatedRows".to_string(), RuntimeCounter::count(self.completed_rows)),
            ("generatedBatches".to_string(), RuntimeCounter::count(self.batches)),
            (
                "projectedColumns".to_string(),
                RuntimeCounter::count(self.columns.len() as u64),
            ),
            ("splitsProcessed".to_string(), RuntimeCounter::count(self.splits_processed)),
        ])
    }

    fn state(&self) -> DataSourceState {
        self.state
    }

    fn close(&mut self) {
        self.split = None;
        self.state = DataSourceState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpch::gen::DeterministicGenerator;
    use crate::tpch::split::TpchConnectorSplit;
    use crate::tpch::table::{TpchColumnHandle, TpchTableHandle};
    use splitscan_core::schema::{DataType, Field};
    use splitscan_core::types::Scalar;
    use splitscan_mem::MemoryBudgetImpl;

    fn handles(names: &[&str]) -> HashMap<String, ColumnHandle> {
        names
            .iter()
            .map(|n| (n.to_string(), ColumnHandle::Tpch(TpchColumnHandle::new(*n))))
            .collect()
    }

    fn source<'a>(
        ctx: &'a ConnectorQueryCtx,
        output: &Schema,
        table: TpchTable,
        cols: &HashMap<String, ColumnHandle>,
    ) -> Result<TpchDataSource<'a>> {
        let handle = TableHandle::Tpch(TpchTableHandle::new("tpch", table, 0.01).unwrap());
        TpchDataSource::new(output, &handle, cols, Arc::new(DeterministicGenerator), ctx)
    }

    fn split(total: u64, part: u64) -> Arc<ConnectorSplit> {
        Arc::new(ConnectorSplit::Tpch(
            TpchConnectorSplit::new("tpch", total, part).unwrap(),
        ))
    }

    #[test]
    fn reads_split_in_batches() {
        let ctx = ConnectorQueryCtx::new("q", "t", MemoryBudgetImpl::unlimited());
        let output = Schema::new(vec![Field::new("r_name", DataType::Utf8, false)]);
        let mut ds = source(&ctx, &output, TpchTable::Region, &handles(&["r_name"])).unwrap();
        assert_eq!(ds.state(), DataSourceState::Unbound);
        assert!(matches!(ds.next(2).unwrap(), NextBatch::Exhausted));

        ds.add_split(split(1, 0)).unwrap();
        let mut sizes = Vec::new();
        loop {
            match ds.next(2).unwrap() {
                NextBatch::Ready(b) => sizes.push(b.num_rows()),
                NextBatch::Exhausted => break,
                NextBatch::Pending(_) => unreachable!(),
            }
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(ds.completed_rows(), 5);
        assert_eq!(ds.state(), DataSourceState::Exhausted);
        let stats = ds.runtime_stats();
        assert_eq!(stats["generatedBatches"].value, 3);
        assert_eq!(stats["splitsProcessed"].value, 1);
    }

    #[test]
    fn aliases_rename_output_columns() {
        let ctx = ConnectorQueryCtx::new("q", "t", MemoryBudgetImpl::unlimited());
        let output = Schema::new(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("key", DataType::Int64, false),
        ]);
        let cols: HashMap<String, ColumnHandle> = [
            ("name".to_string(), ColumnHandle::Tpch(TpchColumnHandle::new("n_name"))),
            ("key".to_string(), ColumnHandle::Tpch(TpchColumnHandle::new("n_nationkey"))),
        ]
        .into_iter()
        .collect();
        let mut ds = source(&ctx, &output, TpchTable::Nation, &cols).unwrap();
        ds.add_split(split(1, 0)).unwrap();
        let NextBatch::Ready(b) = ds.next(100).unwrap() else {
            panic!("expected rows");
        };
        assert_eq!(b.column_names(), vec!["name", "key"]);
        assert_eq!(b.num_rows(), 25);
        assert_eq!(b.columns[1].values[3], Scalar::I64(3));
    }

    #[test]
    fn protocol_violations() {
        let ctx = ConnectorQueryCtx::new("q", "t", MemoryBudgetImpl::unlimited());
        let output = Schema::new(vec![Field::new("o_orderkey", DataType::Int64, false)]);
        let mut ds = source(&ctx, &output, TpchTable::Orders, &handles(&["o_orderkey"])).unwrap();
        ds.add_split(split(4, 0)).unwrap();
        assert!(matches!(
            ds.add_split(split(4, 1)),
            Err(ConnectorError::Invariant(_))
        ));
        assert!(matches!(ds.next(0), Err(ConnectorError::Validation(_))));
        assert!(matches!(
            ds.add_dynamic_filter(0, Filter::IsNotNull),
            Err(ConnectorError::NotSupported(_))
        ));
        ds.close();
        assert_eq!(ds.state(), DataSourceState::Closed);
        assert!(ds.add_split(split(4, 1)).is_err());
    }

    #[test]
    fn rejects_bad_output_types() {
        let ctx = ConnectorQueryCtx::new("q", "t", MemoryBudgetImpl::unlimited());
        let cols = handles(&["r_name", "r_regionkey"]);

        let wrong_type = Schema::new(vec![Field::new("r_name", DataType::Int64, false)]);
        assert!(matches!(
            source(&ctx, &wrong_type, TpchTable::Region, &cols),
            Err(ConnectorError::Validation(_))
        ));

        let missing = Schema::new(vec![Field::new("r_comment", DataType::Utf8, false)]);
        assert!(matches!(
            source(&ctx, &missing, TpchTable::Region, &cols),
            Err(ConnectorError::Lookup(_))
        ));

        let dup = Schema::new(vec![
            Field::new("r_name", DataType::Utf8, false),
            Field::new("r_name", DataType::Utf8, false),
        ]);
        assert!(matches!(
            source(&ctx, &dup, TpchTable::Region, &cols),
            Err(ConnectorError::Validation(_))
        ));

        assert!(matches!(
            source(&ctx, &Schema::default(), TpchTable::Region, &cols),
            Err(ConnectorError::Validation(_))
        ));
    }

    #[test]
    fn budget_exhaustion_is_budget_error() {
        let ctx = ConnectorQueryCtx::new("q", "t", MemoryBudgetImpl::new(64));
        let output = Schema::new(vec![Field::new("o_comment", DataType::Utf8, false)]);
        let mut ds = source(&ctx, &output, TpchTable::Orders, &handles(&["o_comment"])).unwrap();
        ds.add_split(split(1, 0)).unwrap();
        assert!(matches!(ds.next(1000), Err(ConnectorError::Budget(_))));
        assert!(matches!(ds.next(1), Ok(NextBatch::Ready(_))));
        assert_eq!(ctx.memory_budget().used_bytes(), 0);
    }
}
