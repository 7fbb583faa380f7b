//! TPC-H table catalogue: names, row counts, column layouts, handles.

use std::fmt;

use serde::{Deserialize, Serialize};

use splitscan_core::schema::{DataType, Field, Schema};

use crate::error::{ConnectorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TpchTable {
    Part,
    Supplier,
    PartSupp,
    Customer,
    Orders,
    LineItem,
    Nation,
    Region,
}

impl TpchTable {
    pub const ALL: [TpchTable; 8] = [
        TpchTable::Part,
        TpchTable::Supplier,
        TpchTable::PartSupp,
        TpchTable::Customer,
        TpchTable::Orders,
        TpchTable::LineItem,
        TpchTable::Nation,
        TpchTable::Region,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TpchTable::Part => "part",
            TpchTable::Supplier => "supplier",
            TpchTable::PartSupp => "partsupp",
            TpchTable::Customer => "customer",
            TpchTable::Orders => "orders",
            TpchTable::LineItem => "lineitem",
            TpchTable::Nation => "nation",
            TpchTable::Region => "region",
        }
    }

    pub fn from_name(name: &str) -> Result<TpchTable> {
        let lower = name.trim().to_ascii_lowercase();
        TpchTable::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .ok_or_else(|| ConnectorError::Lookup(format!("unknown tpch table '{name}'")))
    }

    /// Row count at scale factor 1, or the fixed count for nation/region.
    fn base_rows(self) -> u64 {
        match self {
            TpchTable::Part => 200_000,
            TpchTable::Supplier => 10_000,
            TpchTable::PartSupp => 800_000,
            TpchTable::Customer => 150_000,
            TpchTable::Orders => 1_500_000,
            TpchTable::LineItem => 6_000_000,
            TpchTable::Nation => 25,
            TpchTable::Region => 5,
        }
    }
}

impl fmt::Display for TpchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of rows `table` has at `scale_factor`.
///
/// Nation and region are fixed size; the other tables scale linearly and
/// round down.
/// Largest accepted scale factor. Keeps every generated key, including the
/// sparse order keys (about `4 * row_count(Orders)`), inside `i64`.
pub const MAX_SCALE_FACTOR: f64 = 1_000_000_000.0;

/// Reject scale factors that are negative, non-finite or above
/// [`MAX_SCALE_FACTOR`].
pub fn check_scale_factor(scale_factor: f64) -> Result<()> {
    if !scale_factor.is_finite() || !(0.0..=MAX_SCALE_FACTOR).contains(&scale_factor) {
        return Err(ConnectorError::Validation(format!(
            "tpch scale factor must be in [0, {MAX_SCALE_FACTOR}], got {scale_factor}"
        )));
    }
    Ok(())
}

pub fn row_count(table: TpchTable, scale_factor: f64) -> u64 {
    match table {
        TpchTable::Nation | TpchTable::Region => table.base_rows(),
        // Float-to-int `as` saturates, so unchecked huge factors clamp to u64::MAX.
        _ => (table.base_rows() as f64 * scale_factor).floor() as u64,
    }
}

/// Generated column layout of `table`, in generation order.
pub fn table_schema(table: TpchTable) -> Schema {
    use DataType::*;
    let cols: &[(&str, DataType)] = match table {
        TpchTable::Part => &[
            ("p_partkey", Int64),
            ("p_name", Utf8),
            ("p_mfgr", Utf8),
            ("p_brand", Utf8),
            ("p_type", Utf8),
            ("p_size", Int32),
            ("p_container", Utf8),
            ("p_retailprice", Float64),
            ("p_comment", Utf8),
        ],
        TpchTable::Supplier => &[
            ("s_suppkey", Int64),
            ("s_name", Utf8),
            ("s_address", Utf8),
            ("s_nationkey", Int64),
            ("s_phone", Utf8),
            ("s_acctbal", Float64),
            ("s_comment", Utf8),
        ],
        TpchTable::PartSupp => &[
            ("ps_partkey", Int64),
            ("ps_suppkey", Int64),
            ("ps_availqty", Int32),
            ("ps_supplycost", Float64),
            ("ps_comment", Utf8),
        ],
        TpchTable::Customer => &[
            ("c_custkey", Int64),
            ("c_name", Utf8),
            ("c_address", Utf8),
            ("c_nationkey", Int64),
            ("c_phone", Utf8),
            ("c_acctbal", Float64),
            ("c_mktsegment", Utf8),
            ("c_comment", Utf8),
        ],
        TpchTable::Orders => &[
            ("o_orderkey", Int64),
            ("o_custkey", Int64),
            ("o_orderstatus", Utf8),
            ("o_totalprice", Float64),
            ("o_orderdate", Date32),
            ("o_orderpriority", Utf8),
            ("o_clerk", Utf8),
            ("o_shippriority", Int32),
            ("o_comment", Utf8),
        ],
        TpchTable::LineItem => &[
            ("l_orderkey", Int64),
            ("l_partkey", Int64),
            ("l_suppkey", Int64),
            ("l_linenumber", Int32),
            ("l_quantity", Float64),
            ("l_extendedprice", Float64),
            ("l_discount", Float64),
            ("l_tax", Float64),
            ("l_returnflag", Utf8),
            ("l_linestatus", Utf8),
            ("l_shipdate", Date32),
            ("l_commitdate", Date32),
            ("l_receiptdate", Date32),
            ("l_shipinstruct", Utf8),
            ("l_shipmode", Utf8),
            ("l_comment", Utf8),
        ],
        TpchTable::Nation => &[
            ("n_nationkey", Int64),
            ("n_name", Utf8),
            ("n_regionkey", Int64),
            ("n_comment", Utf8),
        ],
        TpchTable::Region => &[
            ("r_regionkey", Int64),
            ("r_name", Utf8),
            ("r_comment", Utf8),
        ],
    };
    Schema::new(
        cols.iter()
            .map(|(name, ty)| Field::new(*name, *ty, false))
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpchTableHandle {
    pub connector_id: String,
    pub table: TpchTable,
    pub scale_factor: f64,
}

impl TpchTableHandle {
    /// Fails with `Validation` for a negative or non-finite scale factor.
    pub fn new(connector_id: impl Into<String>, table: TpchTable, scale_factor: f64) -> Result<Self> {
        check_scale_factor(scale_factor)?;
        Ok(Self {
            connector_id: connector_id.into(),
            table,
            scale_factor,
        })
    }

    pub fn row_count(&self) -> u64 {
        row_count(self.table, self.scale_factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TpchColumnHandle {
    pub name: String,
}

impl TpchColumnHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
