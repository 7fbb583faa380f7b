use std::collections::HashMap;
use std::sync::Arc;

use splitscan_core::schema::Schema;
use splitscan_io::{FsStorage, Storage};

use crate::config::ConnectorConfig;
use crate::connector::{
    CommitStrategy, Connector, ConnectorFactory, ConnectorQueryCtx, DataSink, DataSource, Executor,
    InsertTableHandle,
};
use crate::error::{ConnectorError, Result};
use crate::handle::{ColumnHandle, TableHandle};
use crate::hive::data_source::{HiveDataSource, HiveScanOptions};
use crate::hive::reader::{DefaultFileReaderFactory, FileReaderFactory};
use crate::hive::split::{FileFormat, FileProperties, HiveConnectorSplit};
use crate::split::ConnectorSplit;

pub const HIVE_CONNECTOR_NAME: &str = "hive";

/// Config key capping the rows asked of a file reader per `next` call.
pub const MAX_READ_ROWS_KEY: &str = "hive.max-read-rows";
pub const DEFAULT_MAX_READ_ROWS: u64 = 1024;

pub struct HiveConnector {
    id: String,
    config: ConnectorConfig,
    storage: Arc<dyn Storage>,
    readers: Arc<dyn FileReaderFactory>,
    max_read_rows: u64,
    io_executor: Option<Arc<dyn Executor>>,
    cpu_executor: Option<Arc<dyn Executor>>,
}

impl HiveConnector {
    /// Connector over the local filesystem.
    pub fn new(id: impl Into<String>, config: ConnectorConfig) -> Result<Self> {
        Self::with_storage(id, config, Arc::new(FsStorage::new()))
    }

    pub fn with_storage(
        id: impl Into<String>,
        config: ConnectorConfig,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        let max_read_rows: u64 = config.get_or(MAX_READ_ROWS_KEY, DEFAULT_MAX_READ_ROWS)?;
        if max_read_rows == 0 {
            return Err(ConnectorError::Validation(format!(
                "{MAX_READ_ROWS_KEY} must be positive"
            )));
        }
        Ok(Self {
            id: id.into(),
            config,
            readers: Arc::new(DefaultFileReaderFactory::new(Arc::clone(&storage))),
            storage,
            max_read_rows,
            io_executor: None,
            cpu_executor: None,
        })
    }

    /// Replace how data files are opened, e.g. to add a columnar format.
    pub fn with_reader_factory(mut self, readers: Arc<dyn FileReaderFactory>) -> Self {
        self.readers = readers;
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

    pub fn max_read_rows(&self) -> u64 {
        self.max_read_rows
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn io_executor(&self) -> Option<&Arc<dyn Executor>> {
        self.io_executor.as_ref()
    }

    pub fn cpu_executor(&self) -> Option<&Arc<dyn Executor>> {
        self.cpu_executor.as_ref()
    }

    /// Cut `path` into byte-range splits of at most `split_bytes` each.
    ///
    /// An empty file still yields one split so its partition keys are seen.
    pub fn split_file(
        &self,
        path: &str,
        format: FileFormat,
        split_bytes: u64,
    ) -> Result<Vec<HiveConnectorSplit>> {
        if split_bytes == 0 {
            return Err(ConnectorError::Validation("split size must be positive".into()));
        }
        let size = self.storage.size(path)?;
        let properties = FileProperties {
            file_size: Some(size),
            modification_time: None,
        };
        let mut splits = Vec::new();
        let mut start = 0;
        loop {
            let length = split_bytes.min(size - start);
            splits.push(
                HiveConnectorSplit::new(self.id.clone(), path, format)
                    .with_range(start, length)
                    .with_properties(properties)
                    .with_weight(i64::try_from(length).unwrap_or(i64::MAX)),
            );
            start += length;
            if start >= size {
                break;
            }
        }
        tracing::debug!(path, size, splits = splits.len(), "split hive file");
        Ok(splits)
    }
}

impl Connector for HiveConnector {
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
        let options = HiveScanOptions {
            readers: Arc::clone(&self.readers),
            io_executor: self.io_executor.clone(),
            max_read_rows: self.max_read_rows,
        };
        let source = HiveDataSource::new(output_type, table_handle, column_handles, options, ctx)?;
        tracing::debug!(
            connector = %self.id,
            query = ctx.query_id(),
            table = %table_handle.as_hive()?.table_name,
            async_reads = self.io_executor.is_some(),
            "created hive data source"
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
            "the hive connector does not write files".into(),
        ))
    }

    fn can_add_dynamic_filter(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HiveConnectorFactory;

impl ConnectorFactory for HiveConnectorFactory {
    fn connector_name(&self) -> &str {
        HIVE_CONNECTOR_NAME
    }

    fn new_connector(
        &self,
        id: &str,
        config: ConnectorConfig,
        io_executor: Option<Arc<dyn Executor>>,
        cpu_executor: Option<Arc<dyn Executor>>,
    ) -> Result<Arc<dyn Connector>> {
        let connector = HiveConnector::new(id, config)?.with_executors(io_executor, cpu_executor);
        Ok(Arc::new(connector))
    }
}

/// Wrap file splits for the engine-facing split queue.
pub fn into_connector_splits(splits: Vec<HiveConnectorSplit>) -> Vec<Arc<ConnectorSplit>> {
    splits
        .into_iter()
        .map(|s| Arc::new(ConnectorSplit::Hive(s)))
        .collect()
}
