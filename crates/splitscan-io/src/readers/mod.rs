//! Byte-range readers that produce small `RowBatch` chunks.
//!
//! Both readers take the file's column layout (`file_schema`) and a
//! projection of indices into it; output columns come back in projection
//! order and carry the file schema's names.

pub mod csv;
pub mod jsonl;
pub mod lines;

pub use self::csv::CsvRangeReader;
pub use self::jsonl::JsonlRangeReader;
pub use self::lines::LineRangeReader;

use splitscan_core::schema::{Field, Schema};
use splitscan_core::types::{Column, RowBatch, Scalar};

use crate::error::{Error, Result};

/// Pull-based reader over one byte range.
pub trait BatchReader: Send {
    /// Up to `max_rows` rows, or `None` once the range is exhausted.
    fn next_batch(&mut self, max_rows: usize) -> Result<Option<RowBatch>>;

    /// Bytes fetched from storage so far.
    fn bytes_read(&self) -> u64;
}

fn projected_fields(file_schema: &Schema, projection: &[usize]) -> Result<Vec<Field>> {
    projection
        .iter()
        .map(|&i| {
            file_schema
                .field(i)
                .cloned()
                .ok_or_else(|| Error::Decode(format!("projection index {i} outside file schema")))
        })
        .collect()
}

/// Column-major accumulator for row-at-a-time decoders.
struct ColumnsBuilder {
    columns: Vec<Column>,
}

impl ColumnsBuilder {
    fn new(fields: &[Field], capacity: usize) -> Self {
        Self {
            columns: fields
                .iter()
                .map(|f| Column::new(f.name.clone(), Vec::with_capacity(capacity)))
                .collect(),
        }
    }

    fn push(&mut self, idx: usize, value: Scalar) {
        self.columns[idx].values.push(value);
    }

    fn rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    fn finish(self) -> RowBatch {
        RowBatch::new(self.columns)
    }
}
