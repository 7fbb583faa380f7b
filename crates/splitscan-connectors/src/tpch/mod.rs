//! Synthetic TPC-H connector.
//!
//! Tables are generated on the fly from row indices. A split names a row
//! range (directly, or as one part of an N-way partitioning) and the data
//! source produces exactly those rows, projected to the requested columns.

pub mod connector;
pub mod data_source;
pub mod gen;
pub mod split;
pub mod table;

pub use connector::{TpchConnector, TpchConnectorFactory, TPCH_CONNECTOR_NAME};
pub use data_source::TpchDataSource;
pub use gen::{DeterministicGenerator, TpchGenerator};
pub use split::{TpchConnectorSplit, TpchSplitRange, TPCH_SPLIT_TAG};
pub use table::{
    check_scale_factor, row_count, table_schema, TpchColumnHandle, TpchTable, TpchTableHandle,
    MAX_SCALE_FACTOR,
};
