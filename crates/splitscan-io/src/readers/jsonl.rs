//! Streaming NDJSON reader. Columns are matched by name, not position.

use std::sync::Arc;

use serde_json::{Map, Value};

use splitscan_core::schema::{DataType, Field, Schema};
use splitscan_core::types::{RowBatch, Scalar};

use super::{projected_fields, BatchReader, ColumnsBuilder, LineRangeReader};
use crate::error::{Error, Result};
use crate::storage::Storage;

pub struct JsonlRangeReader {
    lines: LineRangeReader,
    fields: Vec<Field>,
}

impl JsonlRangeReader {
    pub fn new(
        storage: Arc<dyn Storage>,
        path: &str,
        start: u64,
        length: u64,
        file_schema: &Schema,
        projection: &[usize],
    ) -> Result<Self> {
        Ok(Self {
            lines: LineRangeReader::new(storage, path, start, length)?,
            fields: projected_fields(file_schema, projection)?,
        })
    }
}

impl BatchReader for JsonlRangeReader {
    fn next_batch(&mut self, max_rows: usize) -> Result<Option<RowBatch>> {
        let mut out = ColumnsBuilder::new(&self.fields, max_rows.min(1024));
        let mut n = 0;
        while n < max_rows {
            let Some(line) = self.lines.next_line()? else {
                break;
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let obj: Map<String, Value> = serde_json::from_slice(&line)?;
            for (col, field) in self.fields.iter().enumerate() {
                out.push(col, json_to_scalar(obj.get(&field.name), field)?);
            }
            n += 1;
        }
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(out.finish()))
        }
    }

    fn bytes_read(&self) -> u64 {
        self.lines.bytes_read()
    }
}

fn json_to_scalar(v: Option<&Value>, field: &Field) -> Result<Scalar> {
    let mismatch = |v: &Value| {
        Error::Decode(format!(
            "column '{}': cannot read {v} as {}",
            field.name, field.data_type
        ))
    };
    let v = match v {
        None | Some(Value::Null) => return Ok(Scalar::Null),
        Some(v) => v,
    };
    Ok(match (field.data_type, v) {
        (DataType::Boolean, Value::Bool(b)) => Scalar::Bool(*b),
        (DataType::Int32, Value::Number(n)) => Scalar::I32(
            n.as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .ok_or_else(|| mismatch(v))?,
        ),
        (DataType::Int64, Value::Number(n)) => Scalar::I64(n.as_i64().ok_or_else(|| mismatch(v))?),
        (DataType::Float32, Value::Number(n)) => {
            Scalar::F32(n.as_f64().ok_or_else(|| mismatch(v))? as f32)
        }
        (DataType::Float64, Value::Number(n)) => Scalar::F64(n.as_f64().ok_or_else(|| mismatch(v))?),
        (DataType::Utf8, Value::String(s)) => Scalar::Str(s.clone()),
        (DataType::Utf8, Value::Number(n)) => Scalar::Str(n.to_string()),
        (DataType::Utf8, Value::Bool(b)) => Scalar::Str(b.to_string()),
        (DataType::Binary, Value::String(s)) => Scalar::Bin(s.as_bytes().to_vec()),
        (_, Value::String(s)) => Scalar::parse(s, field.data_type)?,
        _ => return Err(mismatch(v)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn reads_by_name_with_missing_fields() {
        let s = MemoryStorage::new();
        s.write(
            "t.jsonl",
            b"{\"id\": 1, \"name\": \"a\"}\n\n{\"name\": \"b\", \"id\": 2, \"extra\": true}\n{\"id\": 3}\n",
        )
        .unwrap();
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]);
        let mut r =
            JsonlRangeReader::new(Arc::new(s), "t.jsonl", 0, u64::MAX, &schema, &[1, 0]).unwrap();
        let batch = r.next_batch(100).unwrap().unwrap();
        assert_eq!(batch.column_names(), vec!["name", "id"]);
        assert_eq!(
            batch.columns[1].values,
            vec![Scalar::I64(1), Scalar::I64(2), Scalar::I64(3)]
        );
        assert_eq!(batch.columns[0].values[2], Scalar::Null);
        assert!(r.next_batch(100).unwrap().is_none());
        assert!(r.bytes_read() > 0);
    }

    #[test]
    fn type_mismatch_is_decode_error() {
        let field = Field::new("id", DataType::Int32, false);
        let err = json_to_scalar(Some(&Value::Bool(true)), &field).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        let big = serde_json::json!(1u64 << 40);
        assert!(json_to_scalar(Some(&big), &field).is_err());
    }
}
