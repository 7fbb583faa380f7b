//! Closed table/column handle enums, one variant per bundled connector kind.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};
use crate::hive::handle::{HiveColumnHandle, HiveTableHandle};
use crate::tpch::table::{TpchColumnHandle, TpchTableHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    Tpch,
    Hive,
}

impl ConnectorKind {
    pub fn name(self) -> &'static str {
        match self {
            ConnectorKind::Tpch => "tpch",
            ConnectorKind::Hive => "hive",
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) fn mismatch(expected: ConnectorKind, actual: ConnectorKind) -> ConnectorError {
    ConnectorError::TypeMismatch {
        expected: expected.name(),
        actual: actual.name(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TableHandle {
    Tpch(TpchTableHandle),
    Hive(HiveTableHandle),
}

impl TableHandle {
    pub fn kind(&self) -> ConnectorKind {
        match self {
            TableHandle::Tpch(_) => ConnectorKind::Tpch,
            TableHandle::Hive(_) => ConnectorKind::Hive,
        }
    }

    pub fn connector_id(&self) -> &str {
        match self {
            TableHandle::Tpch(h) => &h.connector_id,
            TableHandle::Hive(h) => &h.connector_id,
        }
    }

    pub fn as_tpch(&self) -> Result<&TpchTableHandle> {
        match self {
            TableHandle::Tpch(h) => Ok(h),
            other => Err(mismatch(ConnectorKind::Tpch, other.kind())),
        }
    }

    pub fn as_hive(&self) -> Result<&HiveTableHandle> {
        match self {
            TableHandle::Hive(h) => Ok(h),
            other => Err(mismatch(ConnectorKind::Hive, other.kind())),
        }
    }
}

impl From<TpchTableHandle> for TableHandle {
    fn from(h: TpchTableHandle) -> Self {
        TableHandle::Tpch(h)
    }
}

impl From<HiveTableHandle> for TableHandle {
    fn from(h: HiveTableHandle) -> Self {
        TableHandle::Hive(h)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnHandle {
    Tpch(TpchColumnHandle),
    Hive(HiveColumnHandle),
}

impl ColumnHandle {
    pub fn kind(&self) -> ConnectorKind {
        match self {
            ColumnHandle::Tpch(_) => ConnectorKind::Tpch,
            ColumnHandle::Hive(_) => ConnectorKind::Hive,
        }
    }

    /// Name of the underlying generated or file column.
    pub fn name(&self) -> &str {
        match self {
            ColumnHandle::Tpch(h) => &h.name,
            ColumnHandle::Hive(h) => &h.name,
        }
    }

    pub fn as_tpch(&self) -> Result<&TpchColumnHandle> {
        match self {
            ColumnHandle::Tpch(h) => Ok(h),
            other => Err(mismatch(ConnectorKind::Tpch, other.kind())),
        }
    }

    pub fn as_hive(&self) -> Result<&HiveColumnHandle> {
        match self {
            ColumnHandle::Hive(h) => Ok(h),
            other => Err(mismatch(ConnectorKind::Hive, other.kind())),
        }
    }
}

impl From<TpchColumnHandle> for ColumnHandle {
    fn from(h: TpchColumnHandle) -> Self {
        ColumnHandle::Tpch(h)
    }
}

impl From<HiveColumnHandle> for ColumnHandle {
    fn from(h: HiveColumnHandle) -> Self {
        ColumnHandle::Hive(h)
    }
}
