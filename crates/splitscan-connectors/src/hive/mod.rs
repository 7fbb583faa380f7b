//! Hive file connector.
//!
//! A split is a byte range of one data file. The data source reads the range
//! with a format-specific reader, fills in partition keys and synthesized
//! columns from the split, and drops rows that belong to another table
//! bucket when the partition was written with fewer buckets.

pub mod bucket;
pub mod connector;
pub mod data_source;
pub mod handle;
pub mod partition;
pub mod reader;
pub mod split;

pub use bucket::{bucket_for, hive_hash, hive_row_hash, BucketConversionFilter};
pub use connector::{
    into_connector_splits, HiveConnector, HiveConnectorFactory, DEFAULT_MAX_READ_ROWS,
    HIVE_CONNECTOR_NAME, MAX_READ_ROWS_KEY,
};
pub use data_source::{HiveDataSource, HiveScanOptions};
pub use handle::{HiveColumnHandle, HiveColumnType, HiveTableHandle};
pub use partition::{
    partition_value, synthesized_value, BUCKET_COLUMN, FILE_MODIFIED_TIME_COLUMN,
    FILE_SIZE_COLUMN, PATH_COLUMN,
};
pub use reader::{DefaultFileReaderFactory, FileReaderFactory, FIELD_DELIM_PARAM, NULL_FORMAT_PARAM};
pub use split::{
    FileFormat, FileProperties, HiveBucketConversion, HiveConnectorSplit, RowIdProperties,
    HIVE_SPLIT_TAG,
};
