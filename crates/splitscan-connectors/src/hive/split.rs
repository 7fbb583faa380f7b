//! Hive file split: a byte range of one data file plus the metadata needed to
//! materialise partition keys, synthesized columns and bucket filters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConnectorError, Result};
use crate::hive::handle::HiveColumnHandle;
use crate::split::{register_split_serde, u64_string, ConnectorSplit};

pub const HIVE_SPLIT_TAG: &str = "HiveConnectorSplit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Dwrf,
    Rcfile,
    Orc,
    Parquet,
    Text,
    Json,
    Nimble,
}

impl FileFormat {
    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Dwrf => "dwrf",
            FileFormat::Rcfile => "rcfile",
            FileFormat::Orc => "orc",
            FileFormat::Parquet => "parquet",
            FileFormat::Text => "text",
            FileFormat::Json => "json",
            FileFormat::Nimble => "nimble",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reconciles a partition written with fewer buckets than the table has now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveBucketConversion {
    pub table_bucket_count: i32,
    pub partition_bucket_count: i32,
    pub bucket_column_handles: Vec<HiveColumnHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIdProperties {
    pub metadata_version: i64,
    pub partition_id: i64,
    pub table_guid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProperties {
    pub file_size: Option<u64>,
    /// Seconds since the Unix epoch.
    pub modification_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveConnectorSplit {
    pub connector_id: String,
    #[serde(default)]
    pub split_weight: i64,
    pub file_path: String,
    pub file_format: FileFormat,
    #[serde(with = "u64_string", default)]
    pub start: u64,
    #[serde(with = "u64_string", default = "full_length")]
    pub length: u64,
    #[serde(default)]
    pub partition_keys: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub table_bucket_number: Option<i32>,
    #[serde(default)]
    pub bucket_conversion: Option<HiveBucketConversion>,
    #[serde(default)]
    pub custom_split_info: BTreeMap<String, String>,
    #[serde(default)]
    pub extra_file_info: Option<String>,
    #[serde(default)]
    pub serde_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub info_columns: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: Option<FileProperties>,
    #[serde(default)]
    pub row_id_properties: Option<RowIdProperties>,
}

fn full_length() -> u64 {
    u64::MAX
}

impl HiveConnectorSplit {
    /// Whole-file split with no partition keys or bucketing.
    pub fn new(
        connector_id: impl Into<String>,
        file_path: impl Into<String>,
        file_format: FileFormat,
    ) -> Self {
        Self {
            connector_id: connector_id.into(),
            split_weight: 0,
            file_path: file_path.into(),
            file_format,
            start: 0,
            length: full_length(),
            partition_keys: BTreeMap::new(),
            table_bucket_number: None,
            bucket_conversion: None,
            custom_split_info: BTreeMap::new(),
            extra_file_info: None,
            serde_parameters: BTreeMap::new(),
            info_columns: BTreeMap::new(),
            properties: None,
            row_id_properties: None,
        }
    }

    pub fn with_range(mut self, start: u64, length: u64) -> Self {
        self.start = start;
        self.length = length;
        self
    }

    pub fn with_partition_key(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.partition_keys
            .insert(name.into(), value.map(str::to_string));
        self
    }

    pub fn with_bucket(mut self, table_bucket_number: i32) -> Self {
        self.table_bucket_number = Some(table_bucket_number);
        self
    }

    pub fn with_bucket_conversion(mut self, conversion: HiveBucketConversion) -> Self {
        self.bucket_conversion = Some(conversion);
        self
    }

    pub fn with_serde_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.serde_parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_info_column(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info_columns.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: FileProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_weight(mut self, split_weight: i64) -> Self {
        self.split_weight = split_weight;
        self
    }

    /// Last path component of `file_path`.
    pub fn file_name(&self) -> &str {
        self.file_path
            .rsplit('/')
            .next()
            .unwrap_or(self.file_path.as_str())
    }

    /// Check the bucket-conversion invariants.
    pub fn validate(&self) -> Result<()> {
        if self.file_path.is_empty() {
            return Err(ConnectorError::Validation("hive split has an empty file path".into()));
        }
        let Some(conv) = &self.bucket_conversion else {
            return Ok(());
        };
        if conv.partition_bucket_count <= 0 {
            return Err(ConnectorError::Validation(format!(
                "partition bucket count must be positive, got {}",
                conv.partition_bucket_count
            )));
        }
        if conv.table_bucket_count < conv.partition_bucket_count {
            return Err(ConnectorError::Validation(format!(
                "table bucket count {} is smaller than partition bucket count {}",
                conv.table_bucket_count, conv.partition_bucket_count
            )));
        }
        if conv.table_bucket_count % conv.partition_bucket_count != 0 {
            return Err(ConnectorError::Validation(format!(
                "table bucket count {} is not a multiple of partition bucket count {}",
                conv.table_bucket_count, conv.partition_bucket_count
            )));
        }
        if conv.bucket_column_handles.is_empty() {
            return Err(ConnectorError::Validation(
                "bucket conversion needs at least one bucket column".into(),
            ));
        }
        match self.table_bucket_number {
            Some(b) if (0..conv.table_bucket_count).contains(&b) => Ok(()),
            Some(b) => Err(ConnectorError::Validation(format!(
                "table bucket number {b} outside [0, {})",
                conv.table_bucket_count
            ))),
            None => Err(ConnectorError::Validation(
                "bucket conversion requires a table bucket number".into(),
            )),
        }
    }

    pub fn serialize(&self) -> Result<Value> {
        let mut doc = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut doc {
            map.insert("name".into(), Value::String(HIVE_SPLIT_TAG.into()));
        }
        Ok(doc)
    }

    pub fn create(doc: &Value) -> Result<Self> {
        match doc.get("name").and_then(Value::as_str) {
            Some(HIVE_SPLIT_TAG) | None => {}
            Some(other) => {
                return Err(ConnectorError::Serde(format!(
                    "expected a {HIVE_SPLIT_TAG} document, got '{other}'"
                )))
            }
        }
        Ok(serde_json::from_value(doc.clone())?)
    }

    pub fn register_serde() -> bool {
        register_split_serde(HIVE_SPLIT_TAG, |doc| {
            Ok(ConnectorSplit::Hive(HiveConnectorSplit::create(doc)?))
        })
    }
}

impl fmt::Display for HiveConnectorSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hive: {} {} - {}", self.file_path, self.start, self.length)?;
        if let Some(bucket) = self.table_bucket_number {
            write!(f, " {bucket}")?;
        }
        Ok(())
    }
}
