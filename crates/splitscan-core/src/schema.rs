//! Logical row types. Pure data; no Arrow dependency here.
//!
//! A `Schema` doubles as the "output type" a caller hands to a connector when
//! it asks for a data source: field order is the order columns come back in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
    /// Days since the Unix epoch.
    Date32,
}

impl DataType {
    /// Rough per-value width used for byte accounting of fixed-size types.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            DataType::Boolean => Some(1),
            DataType::Int32 | DataType::Float32 | DataType::Date32 => Some(4),
            DataType::Int64 | DataType::Float64 => Some(8),
            DataType::Utf8 | DataType::Binary => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Boolean => "boolean",
            DataType::Int32 => "integer",
            DataType::Int64 => "bigint",
            DataType::Float32 => "real",
            DataType::Float64 => "double",
            DataType::Utf8 => "varchar",
            DataType::Binary => "varbinary",
            DataType::Date32 => "date",
        };
        f.write_str(s)
    }
}

impl FromStr for DataType {
    type Err = Error;

    /// Accepts SQL-style names (`bigint`, `varchar`, ...) and a few aliases.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Ok(DataType::Boolean),
            "integer" | "int" | "int32" => Ok(DataType::Int32),
            "bigint" | "long" | "int64" => Ok(DataType::Int64),
            "real" | "float" | "float32" => Ok(DataType::Float32),
            "double" | "float64" => Ok(DataType::Float64),
            "varchar" | "string" | "utf8" => Ok(DataType::Utf8),
            "varbinary" | "binary" => Ok(DataType::Binary),
            "date" => Ok(DataType::Date32),
            other => Err(Error::Schema(format!("unknown data type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Fail if two fields share a name.
    pub fn ensure_unique_names(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::with_capacity(self.fields.len());
        for f in &self.fields {
            if !seen.insert(f.name.as_str()) {
                return Err(Error::Schema(format!("duplicate column name '{}'", f.name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_names_parse_back() {
        for dt in [
            DataType::Boolean,
            DataType::Int32,
            DataType::Int64,
            DataType::Float32,
            DataType::Float64,
            DataType::Utf8,
            DataType::Binary,
            DataType::Date32,
        ] {
            assert_eq!(dt.to_string().parse::<DataType>().unwrap(), dt);
        }
        assert!("decimal(10,2)".parse::<DataType>().is_err());
    }

    #[test]
    fn duplicate_names_rejected() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("a", DataType::Utf8, true),
        ]);
        assert!(schema.ensure_unique_names().is_err());
    }
}
