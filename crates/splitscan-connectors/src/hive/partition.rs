//! Per-split constant columns: partition keys and synthesized `$` columns.

use splitscan_core::schema::DataType;
use splitscan_core::types::Scalar;

use crate::error::{ConnectorError, Result};
use crate::hive::split::HiveConnectorSplit;

pub const PATH_COLUMN: &str = "$path";
pub const FILE_SIZE_COLUMN: &str = "$file_size";
pub const FILE_MODIFIED_TIME_COLUMN: &str = "$file_modified_time";
pub const BUCKET_COLUMN: &str = "$bucket";

/// Value of partition key `name` for `split`, parsed as `data_type`.
///
/// A key missing from the split, or present with no value, reads as null
/// (Hive's `__HIVE_DEFAULT_PARTITION__`).
pub fn partition_value(split: &HiveConnectorSplit, name: &str, data_type: DataType) -> Result<Scalar> {
    match split.partition_keys.get(name) {
        None | Some(None) => Ok(Scalar::Null),
        Some(Some(text)) => Scalar::parse(text, data_type).map_err(|e| {
            ConnectorError::Validation(format!(
                "partition key '{name}' of {}: {e}",
                split.file_path
            ))
        }),
    }
}

/// Value of synthesized column `name` for `split`.
///
/// `info_columns` entries take precedence over values derived from the
/// split itself.
pub fn synthesized_value(split: &HiveConnectorSplit, name: &str, data_type: DataType) -> Result<Scalar> {
    let bad = |e: &dyn std::fmt::Display| {
        ConnectorError::Validation(format!("synthesized column '{name}': {e}"))
    };
    if let Some(text) = split.info_columns.get(name) {
        return Scalar::parse(text, data_type).map_err(|e| bad(&e));
    }
    let derived = match name {
        PATH_COLUMN => Some(Scalar::Str(split.file_path.clone())),
        FILE_SIZE_COLUMN => split
            .properties
            .and_then(|p| p.file_size)
            .map(|v| Scalar::I64(i64::try_from(v).unwrap_or(i64::MAX))),
        FILE_MODIFIED_TIME_COLUMN => split
            .properties
            .and_then(|p| p.modification_time)
            .map(|v| Scalar::I64(i64::try_from(v).unwrap_or(i64::MAX))),
        BUCKET_COLUMN => split.table_bucket_number.map(Scalar::I32),
        other => return Err(ConnectorError::Lookup(format!("unknown synthesized column '{other}'"))),
    };
    let Some(value) = derived else {
        return Ok(Scalar::Null);
    };
    coerce(value, data_type).ok_or_else(|| bad(&format!("cannot be read as {data_type}")))
}

fn coerce(value: Scalar, data_type: DataType) -> Option<Scalar> {
    match (value, data_type) {
        (v @ Scalar::Str(_), DataType::Utf8) => Some(v),
        (v @ Scalar::I64(_), DataType::Int64) => Some(v),
        (v @ Scalar::I32(_), DataType::Int32) => Some(v),
        (Scalar::I32(v), DataType::Int64) => Some(Scalar::I64(v.into())),
        (Scalar::I64(v), DataType::Int32) => i32::try_from(v).ok().map(Scalar::I32),
        (Scalar::Str(s), DataType::Binary) => Some(Scalar::Bin(s.into_bytes())),
        _ => None,
    }
}
