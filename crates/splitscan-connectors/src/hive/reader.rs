//! Reader creation for hive splits.

use std::sync::Arc;

use splitscan_core::schema::Schema;
use splitscan_io::readers::BatchReader;
use splitscan_io::{CsvRangeReader, JsonlRangeReader, Storage};

use crate::error::{ConnectorError, Result};
use crate::hive::split::{FileFormat, HiveConnectorSplit};

/// Serde parameter naming the text field delimiter.
pub const FIELD_DELIM_PARAM: &str = "field.delim";
/// Serde parameter naming the text null marker.
pub const NULL_FORMAT_PARAM: &str = "serialization.null.format";

/// Opens a reader over a split's byte range.
pub trait FileReaderFactory: Send + Sync {
    /// `projection` indexes into `file_schema`; the reader returns those
    /// columns in projection order.
    fn create_reader(
        &self,
        split: &HiveConnectorSplit,
        file_schema: &Schema,
        projection: &[usize],
    ) -> Result<Box<dyn BatchReader>>;
}

/// Reads text (delimited) and JSON-lines files through a [`Storage`].
pub struct DefaultFileReaderFactory {
    storage: Arc<dyn Storage>,
}

impl DefaultFileReaderFactory {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

impl FileReaderFactory for DefaultFileReaderFactory {
    fn create_reader(
        &self,
        split: &HiveConnectorSplit,
        file_schema: &Schema,
        projection: &[usize],
    ) -> Result<Box<dyn BatchReader>> {
        let storage = Arc::clone(&self.storage);
        match split.file_format {
            FileFormat::Text => {
                let mut reader = CsvRangeReader::new(
                    storage,
                    &split.file_path,
                    split.start,
                    split.length,
                    file_schema.clone(),
                    projection.to_vec(),
                )?
                .with_delimiter(field_delimiter(split)?);
                if let Some(marker) = split.serde_parameters.get(NULL_FORMAT_PARAM) {
                    reader = reader.with_null_marker(marker.clone());
                }
                Ok(Box::new(reader))
            }
            FileFormat::Json => Ok(Box::new(JsonlRangeReader::new(
                storage,
                &split.file_path,
                split.start,
                split.length,
                file_schema,
                projection,
            )?)),
            other => Err(ConnectorError::NotSupported(format!(
                "no reader for {other} files ({})",
                split.file_path
            ))),
        }
    }
}

/// Delimiter byte from `field.delim`, default `,`.
///
/// Hive writes non-printable delimiters either raw or as a decimal byte
/// value (`"1"` for `\x01`); both are accepted.
fn field_delimiter(split: &HiveConnectorSplit) -> Result<u8> {
    let Some(raw) = split.serde_parameters.get(FIELD_DELIM_PARAM) else {
        return Ok(b',');
    };
    match raw.as_bytes() {
        [b] if !b.is_ascii_digit() => Ok(*b),
        _ => raw.parse::<u8>().map_err(|_| {
            ConnectorError::Validation(format!("invalid {FIELD_DELIM_PARAM} '{raw}'"))
        }),
    }
}
