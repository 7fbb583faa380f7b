//! Hive bucketing hash and the bucket-conversion row filter.
//!
//! The hash reproduces Hive's `ObjectInspectorUtils.hashCode` so rows land in
//! the same buckets Hive (and Velox) would put them in.

use splitscan_core::types::{Column, Scalar};

use crate::error::{ConnectorError, Result};
use crate::hive::split::HiveBucketConversion;

/// Hive hash of one value.
pub fn hive_hash(value: &Scalar) -> i32 {
    match value {
        Scalar::Null => 0,
        Scalar::Bool(b) => i32::from(*b),
        Scalar::I32(v) | Scalar::Date(v) => *v,
        Scalar::I64(v) => fold_i64(*v),
        Scalar::F32(v) => v.to_bits() as i32,
        Scalar::F64(v) => fold_i64(v.to_bits() as i64),
        Scalar::Str(s) => hash_bytes(s.as_bytes()),
        Scalar::Bin(b) => hash_bytes(b),
    }
}

fn fold_i64(v: i64) -> i32 {
    (v ^ ((v as u64) >> 32) as i64) as i32
}

fn hash_bytes(bytes: &[u8]) -> i32 {
    bytes
        .iter()
        .fold(0i32, |h, b| h.wrapping_mul(31).wrapping_add(*b as i8 as i32))
}

/// Hive hash of a row's bucket-column values.
pub fn hive_row_hash<'v>(values: impl IntoIterator<Item = &'v Scalar>) -> i32 {
    values
        .into_iter()
        .fold(0i32, |h, v| h.wrapping_mul(31).wrapping_add(hive_hash(v)))
}

/// Bucket a row hash falls into out of `bucket_count` buckets.
pub fn bucket_for(hash: i32, bucket_count: i32) -> i32 {
    (hash & i32::MAX) % bucket_count
}

/// Keeps the rows of a partition file that belong to one table bucket.
///
/// A partition written with `partition_bucket_count` buckets holds, in each
/// file, the rows of `table_bucket_count / partition_bucket_count` current
/// table buckets. Each split reads the file for one table bucket and drops
/// the rows that rehash elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConversionFilter {
    table_bucket_count: i32,
    table_bucket_number: i32,
    /// Names of the bucket columns, in hash order.
    columns: Vec<String>,
}

impl BucketConversionFilter {
    pub fn new(conversion: &HiveBucketConversion, table_bucket_number: i32) -> Result<Self> {
        if conversion.table_bucket_count <= 0 {
            return Err(ConnectorError::Validation(format!(
                "table bucket count must be positive, got {}",
                conversion.table_bucket_count
            )));
        }
        if !(0..conversion.table_bucket_count).contains(&table_bucket_number) {
            return Err(ConnectorError::Validation(format!(
                "table bucket number {table_bucket_number} outside [0, {})",
                conversion.table_bucket_count
            )));
        }
        Ok(Self {
            table_bucket_count: conversion.table_bucket_count,
            table_bucket_number,
            columns: conversion
                .bucket_column_handles
                .iter()
                .map(|h| h.name.clone())
                .collect(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn table_bucket_number(&self) -> i32 {
        self.table_bucket_number
    }

    /// Keep-mask over `num_rows` rows given the bucket columns in hash order.
    pub fn mask(&self, bucket_columns: &[&Column], num_rows: usize) -> Vec<bool> {
        (0..num_rows)
            .map(|row| {
                let hash = hive_row_hash(bucket_columns.iter().map(|c| &c.values[row]));
                bucket_for(hash, self.table_bucket_count) == self.table_bucket_number
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hive::handle::HiveColumnHandle;
    use splitscan_core::schema::DataType;

    #[test]
    fn value_hashes_match_hive() {
        assert_eq!(hive_hash(&Scalar::Null), 0);
        assert_eq!(hive_hash(&Scalar::Bool(true)), 1);
        assert_eq!(hive_hash(&Scalar::I32(-7)), -7);
        assert_eq!(hive_hash(&Scalar::I64(1)), 1);
        assert_eq!(hive_hash(&Scalar::I64(1 << 32)), 1);
        assert_eq!(hive_hash(&Scalar::I64(-1)), 0);
        // java.lang.String#hashCode for ASCII input
        assert_eq!(hive_hash(&Scalar::Str("a".into())), 97);
        assert_eq!(hive_hash(&Scalar::Str("hello".into())), 99_162_322);
        assert_eq!(hive_hash(&Scalar::Bin(vec![0xff])), -1);
        assert_eq!(hive_hash(&Scalar::F32(1.0)), 1_065_353_216);
        assert_eq!(hive_hash(&Scalar::F64(1.0)), 1_072_693_248);
    }

    #[test]
    fn row_hash_combines_left_to_right() {
        let row = [Scalar::I32(1), Scalar::I32(2)];
        assert_eq!(hive_row_hash(&row), 31 + 2);
        assert_eq!(bucket_for(-1, 8), 7);
        assert_eq!(bucket_for(i32::MIN, 8), 0);
    }

    #[test]
    fn keeps_only_target_bucket() {
        let conv = HiveBucketConversion {
            table_bucket_count: 8,
            partition_bucket_count: 4,
            bucket_column_handles: vec![HiveColumnHandle::regular("k", DataType::Int32)],
        };
        let filter = BucketConversionFilter::new(&conv, 5).unwrap();
        // 1, 9 and 5 share bucket 1 of 4; only 5 and 13 are bucket 5 of 8.
        let col = Column::new(
            "k",
            [1, 5, 9, 13, 21].into_iter().map(Scalar::I32).collect(),
        );
        assert_eq!(
            filter.mask(&[&col], 5),
            vec![false, true, false, true, true]
        );
        assert!(BucketConversionFilter::new(&conv, 8).is_err());
    }
}
