//! TPC-H splits: a part of an N-way partitioning, or an explicit row range.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConnectorError, Result};
use crate::split::{register_split_serde, ConnectorSplit};

pub const TPCH_SPLIT_TAG: &str = "TpchConnectorSplit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum TpchSplitRange {
    /// Part `part_number` of `total_parts` equal-sized (last one shorter) parts.
    #[serde(rename_all = "camelCase")]
    Part { total_parts: u64, part_number: u64 },
    /// Rows `[offset, end)`, clamped to the table.
    Rows { offset: u64, end: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpchConnectorSplit {
    pub connector_id: String,
    #[serde(default)]
    pub split_weight: i64,
    pub range: TpchSplitRange,
}

impl TpchConnectorSplit {
    /// Part `part_number` of a `total_parts`-way split.
    pub fn new(connector_id: impl Into<String>, total_parts: u64, part_number: u64) -> Result<Self> {
        let split = Self {
            connector_id: connector_id.into(),
            split_weight: 0,
            range: TpchSplitRange::Part {
                total_parts,
                part_number,
            },
        };
        split.validate()?;
        Ok(split)
    }

    /// A split covering exactly `rows`.
    pub fn with_row_range(connector_id: impl Into<String>, rows: Range<u64>) -> Result<Self> {
        let split = Self {
            connector_id: connector_id.into(),
            split_weight: 0,
            range: TpchSplitRange::Rows {
                offset: rows.start,
                end: rows.end,
            },
        };
        split.validate()?;
        Ok(split)
    }

    pub fn with_weight(mut self, split_weight: i64) -> Self {
        self.split_weight = split_weight;
        self
    }

    pub fn validate(&self) -> Result<()> {
        match self.range {
            TpchSplitRange::Part {
                total_parts,
                part_number,
            } => {
                if total_parts == 0 {
                    return Err(ConnectorError::Validation(
                        "tpch split needs at least one part".into(),
                    ));
                }
                if part_number >= total_parts {
                    return Err(ConnectorError::Validation(format!(
                        "tpch split part {part_number} out of range for {total_parts} parts"
                    )));
                }
            }
            TpchSplitRange::Rows { offset, end } => {
                if offset > end {
                    return Err(ConnectorError::Validation(format!(
                        "tpch split row range {offset}..{end} is reversed"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Rows this split covers in a table of `total_rows` rows.
    ///
    /// Parts are `ceil(total_rows / total_parts)` rows each; trailing parts
    /// may be short or empty. Both ends are clamped to `total_rows`.
    pub fn row_range(&self, total_rows: u64) -> Range<u64> {
        match self.range {
            TpchSplitRange::Part {
                total_parts,
                part_number,
            } => {
                let parts = total_parts.max(1);
                let part_size = total_rows.div_ceil(parts);
                let offset = part_size.saturating_mul(part_number).min(total_rows);
                let end = offset.saturating_add(part_size).min(total_rows);
                offset..end
            }
            TpchSplitRange::Rows { offset, end } => {
                let end = end.min(total_rows);
                offset.min(end)..end
            }
        }
    }

    pub fn serialize(&self) -> Result<Value> {
        let mut doc = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut doc {
            map.insert("name".into(), Value::String(TPCH_SPLIT_TAG.into()));
        }
        Ok(doc)
    }

    pub fn create(doc: &Value) -> Result<Self> {
        let split: Self = serde_json::from_value(doc.clone())?;
        split.validate()?;
        Ok(split)
    }

    pub fn register_serde() -> bool {
        register_split_serde(TPCH_SPLIT_TAG, |doc| {
            Ok(ConnectorSplit::Tpch(TpchConnectorSplit::create(doc)?))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_cover_without_overlap() {
        for total in [0u64, 1, 7, 25, 100] {
            for parts in 1..=9u64 {
                let mut next = 0;
                for p in 0..parts {
                    let r = TpchConnectorSplit::new("t", parts, p).unwrap().row_range(total);
                    assert_eq!(r.start, next.min(total), "total {total} parts {parts}");
                    next = r.end;
                }
                assert_eq!(next, total);
            }
        }
    }

    #[test]
    fn ceil_part_size() {
        let s = TpchConnectorSplit::new("t", 4, 3).unwrap();
        assert_eq!(s.row_range(25), 21..25);
        let s = TpchConnectorSplit::new("t", 4, 0).unwrap();
        assert_eq!(s.row_range(25), 0..7);
        // 3 rows, 5 parts: sizes 1,1,1,0,0
        let s = TpchConnectorSplit::new("t", 5, 4).unwrap();
        assert_eq!(s.row_range(3), 3..3);
    }

    #[test]
    fn invalid_parts_rejected() {
        assert!(matches!(
            TpchConnectorSplit::new("t", 0, 0),
            Err(ConnectorError::Validation(_))
        ));
        assert!(TpchConnectorSplit::new("t", 3, 3).is_err());
        assert!(TpchConnectorSplit::with_row_range("t", 5..2).is_err());
    }

    #[test]
    fn explicit_range_clamps() {
        let s = TpchConnectorSplit::with_row_range("t", 20..40).unwrap();
        assert_eq!(s.row_range(25), 20..25);
        assert_eq!(s.row_range(10), 10..10);
    }

    #[test]
    fn document_round_trip() {
        let s = TpchConnectorSplit::new("tpch", 8, 3).unwrap().with_weight(2);
        let doc = s.serialize().unwrap();
        assert_eq!(doc["name"], TPCH_SPLIT_TAG);
        assert_eq!(doc["connectorId"], "tpch");
        assert_eq!(doc["range"]["totalParts"], 8);
        assert_eq!(TpchConnectorSplit::create(&doc).unwrap(), s);

        let bad = serde_json::json!({
            "name": TPCH_SPLIT_TAG,
            "connectorId": "tpch",
            "range": { "mode": "part", "totalParts": 2, "partNumber": 2 }
        });
        assert!(TpchConnectorSplit::create(&bad).is_err());
    }
}
