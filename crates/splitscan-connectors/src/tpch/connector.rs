use std::collections::HashMap;
use std::sync::Arc;

use splitscan_core::schema::Schema;

use crate::config::ConnectorConfig;
use crate::connector::{
    CommitStrategy, Connector, ConnectorFactory, ConnectorQueryCtx, DataSink, DataSource, Executor,
    InsertTableHandle,
};
use crate::error::{ConnectorError, Result};
use crate::handle::{ColumnHandle, TableHandle};
use crate::split::ConnectorSplit;
use crate::tpch::data_source::TpchDataSource;
use crate::tpch::gen::{DeterministicGenerator, TpchGenerator};
use crate::tpch::split::TpchConnectorSplit;
use crate::tpch::table::{check_scale_factor, TpchTable, TpchTableHandle};

pub const TPCH_CONNECTOR_NAME: &str = "tpch";

/// Config key for the scale factor used by [`TpchConnector::table_handle`].
pub const DEFAULT_SCALE_FACTOR_KEY: &str = "tpch.default-scale-factor";

pub struct TpchConnector {
    id: String,
    config: ConnectorConfig,
    default_scale_factor: f64,
    generator: Arc<dyn TpchGenerator>,
    io_executor: Option<Arc<dyn Executor>>,
    cpu_executor: Option<Arc<dyn Executor>>,
}

impl TpchConnector {
    pub fn new(id: impl Into<String>, config: ConnectorConfig) -> Result<Self> {
        let default_scale_factor: f64 = config.get_or(DEFAULT_SCALE_FACTOR_KEY, 1.0)?;
        check_scale_factor(default_scale_factor)?;
        Ok(Self {
            id: id.into(),
            config,
            default_scale_factor,
            generator: Arc::new(DeterministicGenerator),
            io_executor: None,
            cpu_executor: None,
        })
    }

    /// Replace the row generator used by data sources created afterwards.
    pub fn with_generator(mut self, generator: Arc<dyn TpchGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_executors(
        mut self,
        io_executor: Option<Arc<dyn Executor>>,
        cpu_executor: Option<Arc<dyn Executor>>,
    ) -> Self {
        self.io_executor = io_executor;
        self.cpu_executor = cpu_executor;
        self
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn default_scale_factor(&self) -> f64 {
        self.default_scale_factor
    }

    pub fn io_executor(&self) -> Option<&Arc<dyn Executor>> {
        self.io_executor.as_ref()
    }

    pub fn cpu_executor(&self) -> Option<&Arc<dyn Executor>> {
        self.cpu_executor.as_ref()
    }

    /// Handle for `table` at the connector's default scale factor.
    pub fn table_handle(&self, table: TpchTable) -> Result<TpchTableHandle> {
        TpchTableHandle::new(self.id.clone(), table, self.default_scale_factor)
    }

    /// The `total_parts` splits that together cover `handle`'s table.
    pub fn split_table(&self, handle: &TpchTableHandle, total_parts: u64) -> Result<Vec<ConnectorSplit>> {
        if total_parts == 0 {
            return Err(ConnectorError::Validation(
                "a table must be cut into at least one split".into(),
            ));
        }
        let rows = handle.row_count();
        (0..total_parts)
            .map(|part| {
                let split = TpchConnectorSplit::new(handle.connector_id.clone(), total_parts, part)?;
                let weight = split.row_range(rows);
                let weight = i64::try_from(weight.end - weight.start).unwrap_or(i64::MAX);
                Ok(ConnectorSplit::Tpch(split.with_weight(weight)))
            })
            .collect()
    }
}

impl Connector for TpchConnector {
    fn connector_id(&self) -> &str {
        &self.id
    }

    fn create_data_source<'a>(
        &self,
        output_type: &Schema,
        table_handle: &TableHandle,
        column_handles: &HashMap<String, ColumnHandle>,
        ctx: &'a ConnectorQueryCtx,
    ) -> Result<Box<dyn DataSource + 'a>> {
        let source = TpchDataSource::new(
            output_type,
            table_handle,
            column_handles,
            Arc::clone(&self.generator),
            ctx,
        )?;
        tracing::debug!(
            connector = %self.id,
            query = ctx.query_id(),
            table = %source.table(),
            rows = source.row_count(),
            "created tpch data source"
        );
        Ok(Box::new(source))
    }

    fn create_data_sink(
        &self,
        _input_type: &Schema,
        _insert_handle: &InsertTableHandle,
        _ctx: &ConnectorQueryCtx,
        _commit_strategy: CommitStrategy,
    ) -> Result<Box<dyn DataSink>> {
        Err(ConnectorError::NotSupported(
            "the tpch connector does not support data sinks".into(),
        ))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TpchConnectorFactory;

impl ConnectorFactory for TpchConnectorFactory {
    fn connector_name(&self) -> &str {
        TPCH_CONNECTOR_NAME
    }

    fn new_connector(
        &self,
        id: &str,
        config: ConnectorConfig,
        io_executor: Option<Arc<dyn Executor>>,
        cpu_executor: Option<Arc<dyn Executor>>,
    ) -> Result<Arc<dyn Connector>> {
        let connector = TpchConnector::new(id, config)?.with_executors(io_executor, cpu_executor);
        Ok(Arc::new(connector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitscan_mem::MemoryBudgetImpl;

    #[test]
    fn sink_not_supported() {
        let conn = TpchConnector::new("tpch", ConnectorConfig::new()).unwrap();
        let ctx = ConnectorQueryCtx::new("q", "t", MemoryBudgetImpl::unlimited());
        let insert = InsertTableHandle {
            connector_id: "tpch".into(),
            table_name: "nation".into(),
        };
        assert!(matches!(
            conn.create_data_sink(&Schema::default(), &insert, &ctx, CommitStrategy::NoCommit),
            Err(ConnectorError::NotSupported(_))
        ));
    }

    #[test]
    fn config_scale_factor() {
        let cfg = ConnectorConfig::new().with(DEFAULT_SCALE_FACTOR_KEY, "0.1");
        let conn = TpchConnector::new("tpch", cfg).unwrap();
        assert_eq!(conn.default_scale_factor(), 0.1);
        assert_eq!(conn.table_handle(TpchTable::Orders).unwrap().row_count(), 150_000);

        let bad = ConnectorConfig::new().with(DEFAULT_SCALE_FACTOR_KEY, "-2");
        assert!(matches!(
            TpchConnector::new("tpch", bad),
            Err(ConnectorError::Validation(_))
        ));
    }

    #[test]
    fn split_table_weights_sum_to_rows() {
        let conn = TpchConnector::new("tpch", ConnectorConfig::new()).unwrap();
        let handle = TpchTableHandle::new("tpch", TpchTable::Nation, 1.0).unwrap();
        let splits = conn.split_table(&handle, 4).unwrap();
        assert_eq!(splits.len(), 4);
        let total: i64 = splits.iter().map(ConnectorSplit::split_weight).sum();
        assert_eq!(total, 25);
        assert!(conn.split_table(&handle, 0).is_err());
    }
}
