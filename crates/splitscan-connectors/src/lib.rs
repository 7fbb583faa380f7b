#![forbid(unsafe_code)]
//! splitscan-connectors: the split/data-source scan protocol and its connectors.
//!
//! An engine asks a [`Connector`] for a [`DataSource`] bound to one table
//! handle and a column projection, feeds it one [`ConnectorSplit`] at a time,
//! and pulls [`NextBatch`]es until each split is exhausted.
//!
//! Two connectors ship here:
//! - [`tpch`]: synthetic TPC-H shaped tables generated from row indices, so
//!   any split partitioning reproduces an unsplit scan exactly.
//! - [`hive`]: file splits over delimited-text / JSON-lines files with
//!   partition keys and bucket-count reconciliation.
//!
//! Connectors are instantiated by name through the process-wide factory
//! registry in [`registry`]; persisted splits are revived through the
//! type-tag registry in [`split`].

pub mod config;
pub mod connector;
pub mod error;
pub mod handle;
pub mod hive;
pub mod registry;
pub mod split;
pub mod tpch;

pub use config::ConnectorConfig;
pub use connector::{
    CommitStrategy, Connector, ConnectorFactory, ConnectorQueryCtx, ContinueFuture, CounterUnit,
    DataSink, DataSource, DataSourceState, Executor, InsertTableHandle, NextBatch, RuntimeCounter,
    ThreadExecutor,
};
pub use error::{ConnectorError, Result};
pub use handle::{ColumnHandle, ConnectorKind, TableHandle};
pub use split::ConnectorSplit;
