//! Hive table and column handles.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use splitscan_core::filter::Filter;
use splitscan_core::schema::{DataType, Schema};

/// Where a column's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HiveColumnType {
    /// Stored in the data file.
    Regular,
    /// Constant per split, taken from the split's partition keys.
    PartitionKey,
    /// Derived from split metadata (`$path`, `$file_size`, ...).
    Synthesized,
    /// Ordinal of the row within the split.
    RowIndex,
}

impl fmt::Display for HiveColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HiveColumnType::Regular => "regular",
            HiveColumnType::PartitionKey => "partition_key",
            HiveColumnType::Synthesized => "synthesized",
            HiveColumnType::RowIndex => "row_index",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveColumnHandle {
    pub name: String,
    pub column_type: HiveColumnType,
    pub data_type: DataType,
}

impl HiveColumnHandle {
    pub fn new(name: impl Into<String>, column_type: HiveColumnType, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            column_type,
            data_type,
        }
    }

    pub fn regular(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, HiveColumnType::Regular, data_type)
    }

    pub fn partition_key(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, HiveColumnType::PartitionKey, data_type)
    }

    pub fn synthesized(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, HiveColumnType::Synthesized, data_type)
    }

    pub fn row_index(name: impl Into<String>) -> Self {
        Self::new(name, HiveColumnType::RowIndex, DataType::Int64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveTableHandle {
    pub connector_id: String,
    pub table_name: String,
    #[serde(default)]
    pub filter_pushdown_enabled: bool,
    /// Per-column filters, keyed by file or partition column name.
    #[serde(default)]
    pub subfield_filters: BTreeMap<String, Filter>,
    /// Column layout of the data files. Required to read columns of
    /// delimited text files; JSON lines are read by key without it.
    #[serde(default)]
    pub data_columns: Option<Schema>,
    #[serde(default)]
    pub table_parameters: BTreeMap<String, String>,
}

impl HiveTableHandle {
    pub fn new(connector_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            connector_id: connector_id.into(),
            table_name: table_name.into(),
            filter_pushdown_enabled: true,
            subfield_filters: BTreeMap::new(),
            data_columns: None,
            table_parameters: BTreeMap::new(),
        }
    }

    pub fn with_data_columns(mut self, data_columns: Schema) -> Self {
        self.data_columns = Some(data_columns);
        self
    }

    pub fn with_filter(mut self, column: impl Into<String>, filter: Filter) -> Self {
        self.subfield_filters.insert(column.into(), filter);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.table_parameters.insert(key.into(), value.into());
        self
    }

    /// Subfield filters the data source applies; empty when pushdown is off.
    pub fn effective_filters(&self) -> impl Iterator<Item = (&String, &Filter)> {
        self.subfield_filters
            .iter()
            .filter(move |_| self.filter_pushdown_enabled)
    }
}
