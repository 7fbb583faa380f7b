//! Lightweight logical value/column containers to avoid bringing Arrow into core.
//!
//! Connectors emit `RowBatch`es of named columns; engines can convert them to
//! Arrow arrays downstream. Keeping these simple keeps the protocol crates
//! independent of any columnar library.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    /// Days since 1970-01-01.
    Date(i32),
}

impl Scalar {
    /// Type of a non-null value; `None` for `Null`.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
            Scalar::Bin(_) => Some(DataType::Binary),
            Scalar::Date(_) => Some(DataType::Date32),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Approximate in-memory size, used for `completed_bytes` and budgeting.
    pub fn estimated_bytes(&self) -> usize {
        match self {
            Scalar::Null | Scalar::Bool(_) => 1,
            Scalar::I32(_) | Scalar::F32(_) | Scalar::Date(_) => 4,
            Scalar::I64(_) | Scalar::F64(_) => 8,
            Scalar::Str(s) => s.len(),
            Scalar::Bin(b) => b.len(),
        }
    }

    /// Parse the textual form of a value into `data_type`.
    ///
    /// This is the format used by partition-key values and delimited text
    /// files: the same text `CAST(x AS VARCHAR)` would produce, dates as
    /// `YYYY-MM-DD`.
    pub fn parse(text: &str, data_type: DataType) -> Result<Scalar> {
        let bad = |e: &dyn std::fmt::Display| {
            Error::Type(format!("cannot parse '{text}' as {data_type}: {e}"))
        };
        let t = text.trim();
        Ok(match data_type {
            DataType::Boolean => match t.to_ascii_lowercase().as_str() {
                "true" | "1" => Scalar::Bool(true),
                "false" | "0" => Scalar::Bool(false),
                _ => return Err(bad(&"expected true/false")),
            },
            DataType::Int32 => Scalar::I32(t.parse().map_err(|e| bad(&e))?),
            DataType::Int64 => Scalar::I64(t.parse().map_err(|e| bad(&e))?),
            DataType::Float32 => Scalar::F32(t.parse().map_err(|e| bad(&e))?),
            DataType::Float64 => Scalar::F64(t.parse().map_err(|e| bad(&e))?),
            DataType::Utf8 => Scalar::Str(text.to_string()),
            DataType::Binary => Scalar::Bin(text.as_bytes().to_vec()),
            DataType::Date32 => Scalar::Date(parse_date(t).ok_or_else(|| bad(&"expected YYYY-MM-DD"))?),
        })
    }

    /// Compare two values for filtering.
    ///
    /// Integers compare across widths, floats against integers through `f64`.
    /// Returns `None` for nulls and for values of unrelated types.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        use Scalar::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Str(a), Str(b)) => Some(a.cmp(b)),
            (Bin(a), Bin(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => {
                    let a = self.as_f64()?;
                    let b = other.as_f64()?;
                    a.partial_cmp(&b)
                }
            },
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I32(v) => Some(*v as i64),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I32(v) => Some(*v as f64),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }
}

/// Days since epoch for a `YYYY-MM-DD` string (proleptic Gregorian).
pub fn parse_date(s: &str) -> Option<i32> {
    let mut parts = s.splitn(3, '-');
    let y: i64 = parts.next()?.parse().ok()?;
    let m: i64 = parts.next()?.parse().ok()?;
    let d: i64 = parts.next()?.parse().ok()?;
    if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
        return None;
    }
    // Howard Hinnant's days_from_civil.
    let y = if m <= 2 { y - 1 } else { y };
    let era = (if y >= 0 { y } else { y - 399 }) / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    i32::try_from(era * 146_097 + doe - 719_468).ok()
}

/// Inverse of [`parse_date`].
pub fn format_date(days: i32) -> String {
    let z = days as i64 + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + if m <= 2 { 1 } else { 0 };
    format!("{y:04}-{m:02}-{d:02}")
}

/// Minimal column representation. Replace with Arrow arrays downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn estimated_bytes(&self) -> usize {
        self.values.iter().map(Scalar::estimated_bytes).sum()
    }
}

/// Row batch handed from a data source to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowBatch {
    pub columns: Vec<Column>,
}

impl RowBatch {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn estimated_bytes(&self) -> usize {
        self.columns.iter().map(Column::estimated_bytes).sum()
    }

    /// Values of row `idx`, in column order.
    pub fn row(&self, idx: usize) -> Option<Vec<Scalar>> {
        self.columns
            .iter()
            .map(|c| c.values.get(idx).cloned())
            .collect()
    }

    /// Consume the batch, keeping only `indices` in that order.
    ///
    /// Columns are moved, never cloned. Indices must be in range and must not
    /// repeat.
    pub fn select(self, indices: &[usize]) -> Result<RowBatch> {
        let mut slots: Vec<Option<Column>> = self.columns.into_iter().map(Some).collect();
        let mut columns = Vec::with_capacity(indices.len());
        for &idx in indices {
            let col = slots
                .get_mut(idx)
                .ok_or_else(|| Error::Schema(format!("column index {idx} out of range")))?
                .take()
                .ok_or_else(|| Error::Schema(format!("column index {idx} selected twice")))?;
            columns.push(col);
        }
        Ok(RowBatch { columns })
    }

    /// Keep the rows whose `mask` entry is true.
    pub fn filter(&self, mask: &[bool]) -> Result<RowBatch> {
        if mask.len() != self.num_rows() {
            return Err(Error::Invariant(format!(
                "filter mask has {} entries for {} rows",
                mask.len(),
                self.num_rows()
            )));
        }
        let kept = mask.iter().filter(|k| **k).count();
        let columns = self
            .columns
            .iter()
            .map(|col| {
                let mut values = Vec::with_capacity(kept);
                for (v, keep) in col.values.iter().zip(mask) {
                    if *keep {
                        values.push(v.clone());
                    }
                }
                Column {
                    name: col.name.clone(),
                    values,
                }
            })
            .collect();
        Ok(RowBatch { columns })
    }
}

/// Stable per-variant tag, hashed ahead of the value.
pub(crate) fn scalar_type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F32(_) => 4,
        F64(_) => 5,
        Str(_) => 6,
        Bin(_) => 7,
        Date(_) => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> RowBatch {
        RowBatch::new(vec![
            Column::new("a", vec![Scalar::I64(1), Scalar::I64(2), Scalar::I64(3)]),
            Column::new(
                "b",
                vec![
                    Scalar::Str("x".into()),
                    Scalar::Str("y".into()),
                    Scalar::Str("z".into()),
                ],
            ),
            Column::new("c", vec![Scalar::Null, Scalar::Bool(true), Scalar::Bool(false)]),
        ])
    }

    #[test]
    fn select_reorders_and_drops() {
        let out = batch().select(&[2, 0]).unwrap();
        assert_eq!(out.column_names(), vec!["c", "a"]);
        assert_eq!(out.num_rows(), 3);
        assert_eq!(out.columns[1].values[2], Scalar::I64(3));
    }

    #[test]
    fn select_rejects_repeats_and_out_of_range() {
        assert!(batch().select(&[0, 0]).is_err());
        assert!(batch().select(&[3]).is_err());
    }

    #[test]
    fn filter_keeps_masked_rows() {
        let out = batch().filter(&[true, false, true]).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.columns[0].values, vec![Scalar::I64(1), Scalar::I64(3)]);
        assert!(batch().filter(&[true]).is_err());
    }

    #[test]
    fn dates_roundtrip() {
        assert_eq!(parse_date("1970-01-01"), Some(0));
        assert_eq!(parse_date("1992-01-01"), Some(8035));
        assert_eq!(parse_date("1969-12-31"), Some(-1));
        for days in [-1000, -1, 0, 8035, 10_957, 20_000] {
            assert_eq!(parse_date(&format_date(days)), Some(days));
        }
        assert_eq!(parse_date("1992-13-01"), None);
    }

    #[test]
    fn parse_by_type() {
        assert_eq!(Scalar::parse("42", DataType::Int32).unwrap(), Scalar::I32(42));
        assert_eq!(Scalar::parse("true", DataType::Boolean).unwrap(), Scalar::Bool(true));
        assert_eq!(
            Scalar::parse("2020-02-29", DataType::Date32).unwrap(),
            Scalar::Date(18_321)
        );
        assert!(Scalar::parse("x", DataType::Int64).is_err());
    }

    #[test]
    fn compare_widens_numbers() {
        assert_eq!(Scalar::I32(3).compare(&Scalar::I64(3)), Some(Ordering::Equal));
        assert_eq!(Scalar::I64(2).compare(&Scalar::F64(2.5)), Some(Ordering::Less));
        assert_eq!(Scalar::Str("a".into()).compare(&Scalar::I32(1)), None);
        assert_eq!(Scalar::Null.compare(&Scalar::Null), None);
    }
}
