//! Delimited text reader (Hive `TEXTFILE` layout: positional, header-less).

use std::sync::Arc;

use csv::{ByteRecord, ReaderBuilder};

use splitscan_core::schema::{DataType, Field, Schema};
use splitscan_core::types::{RowBatch, Scalar};

use super::{projected_fields, BatchReader, ColumnsBuilder, LineRangeReader};
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Hive's default null marker in text files.
pub const DEFAULT_NULL_MARKER: &str = "\\N";

pub struct CsvRangeReader {
    lines: LineRangeReader,
    file_schema: Schema,
    projection: Vec<usize>,
    fields: Vec<Field>,
    delimiter: u8,
    null_marker: String,
}

impl CsvRangeReader {
    pub fn new(
        storage: Arc<dyn Storage>,
        path: &str,
        start: u64,
        length: u64,
        file_schema: Schema,
        projection: Vec<usize>,
    ) -> Result<Self> {
        let fields = projected_fields(&file_schema, &projection)?;
        Ok(Self {
            lines: LineRangeReader::new(storage, path, start, length)?,
            file_schema,
            projection,
            fields,
            delimiter: b',',
            null_marker: DEFAULT_NULL_MARKER.to_string(),
        })
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_null_marker(mut self, marker: impl Into<String>) -> Self {
        self.null_marker = marker.into();
        self
    }

    pub fn file_schema(&self) -> &Schema {
        &self.file_schema
    }

    fn decode(&self, raw: Option<&[u8]>, data_type: DataType) -> Result<Scalar> {
        let Some(raw) = raw else {
            return Ok(Scalar::Null);
        };
        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::Decode(format!("{}: invalid utf-8: {e}", self.lines.path())))?;
        if text == self.null_marker || (text.is_empty() && data_type != DataType::Utf8) {
            return Ok(Scalar::Null);
        }
        Ok(Scalar::parse(text, data_type)?)
    }
}

impl BatchReader for CsvRangeReader {
    fn next_batch(&mut self, max_rows: usize) -> Result<Option<RowBatch>> {
        let mut chunk = Vec::new();
        let mut n = 0;
        while n < max_rows {
            let Some(line) = self.lines.next_line()? else {
                break;
            };
            if line.is_empty() {
                continue;
            }
            chunk.extend_from_slice(&line);
            chunk.push(b'\n');
            n += 1;
        }
        if n == 0 {
            return Ok(None);
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(chunk.as_slice());
        let mut record = ByteRecord::new();
        let mut out = ColumnsBuilder::new(&self.fields, n);
        while rdr.read_byte_record(&mut record)? {
            for (col, (&file_idx, field)) in self.projection.iter().zip(&self.fields).enumerate() {
                let value = self.decode(record.get(file_idx), field.data_type)?;
                out.push(col, value);
            }
        }
        if self.fields.is_empty() || out.rows() == n {
            Ok(Some(out.finish()))
        } else {
            Err(Error::Decode(format!(
                "{}: decoded {} of {} lines",
                self.lines.path(),
                out.rows(),
                n
            )))
        }
    }

    fn bytes_read(&self) -> u64 {
        self.lines.bytes_read()
    }
}
