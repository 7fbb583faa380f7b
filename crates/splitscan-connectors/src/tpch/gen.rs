//! Deterministic TPC-H shaped row generation.
//!
//! Every value is a pure function of `(table, scale_factor, row index)`, so
//! any row range can be generated independently and any partitioning of a
//! table reproduces the unsplit table exactly. Values follow the TPC-H
//! column domains (key layout, date window, price formulas) but are drawn
//! from a splitmix64 stream instead of dbgen's seeded generators.

use splitscan_core::types::{Column, RowBatch, Scalar};

use crate::error::{ConnectorError, Result};
use crate::tpch::table::{check_scale_factor, row_count, table_schema, TpchTable};

/// Produces rows of a TPC-H table.
pub trait TpchGenerator: Send + Sync {
    /// Rows `[offset, min(offset + max_rows, row_count))` with every column
    /// of `table`, in `table_schema` order.
    fn generate(&self, table: TpchTable, scale_factor: f64, offset: u64, max_rows: u64)
        -> Result<RowBatch>;

    /// Like `generate`, keeping only `columns` (indices into the table
    /// schema) in the given order.
    fn generate_columns(
        &self,
        table: TpchTable,
        scale_factor: f64,
        offset: u64,
        max_rows: u64,
        columns: &[usize],
    ) -> Result<RowBatch> {
        let batch = self.generate(table, scale_factor, offset, max_rows)?;
        Ok(batch.select(columns)?)
    }
}

/// Bundled generator. Builds only the columns it is asked for.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicGenerator;

impl TpchGenerator for DeterministicGenerator {
    fn generate(
        &self,
        table: TpchTable,
        scale_factor: f64,
        offset: u64,
        max_rows: u64,
    ) -> Result<RowBatch> {
        let all: Vec<usize> = (0..table_schema(table).len()).collect();
        self.generate_columns(table, scale_factor, offset, max_rows, &all)
    }

    fn generate_columns(
        &self,
        table: TpchTable,
        scale_factor: f64,
        offset: u64,
        max_rows: u64,
        columns: &[usize],
    ) -> Result<RowBatch> {
        check_scale_factor(scale_factor)?;
        let schema = table_schema(table);
        let total = row_count(table, scale_factor);
        let start = offset.min(total);
        let end = offset.saturating_add(max_rows).min(total);
        let scale = Scale::new(scale_factor);

        let mut out = Vec::with_capacity(columns.len());
        for &idx in columns {
            let field = schema.field(idx).ok_or_else(|| {
                ConnectorError::Validation(format!("{table} has no column index {idx}"))
            })?;
            let f = column_fn(table, idx);
            let values = (start..end).map(|row| f(row, &scale)).collect();
            out.push(Column::new(field.name.clone(), values));
        }
        Ok(RowBatch::new(out))
    }
}

/// Cardinalities of the tables other tables reference.
struct Scale {
    parts: u64,
    suppliers: u64,
    customers: u64,
    clerks: u64,
}

impl Scale {
    fn new(sf: f64) -> Self {
        Self {
            parts: row_count(TpchTable::Part, sf).max(1),
            suppliers: row_count(TpchTable::Supplier, sf).max(1),
            customers: row_count(TpchTable::Customer, sf).max(1),
            clerks: ((sf * 1000.0).floor() as u64).max(1),
        }
    }
}

type ColumnFn = fn(u64, &Scale) -> Scalar;

const START_DATE: i32 = 8035; // 1992-01-01
const LAST_ORDER_DATE: i32 = 10440; // 1998-08-02
const CURRENT_DATE: i32 = 9298; // 1995-06-17

const NATIONS: [(&str, i64); 25] = [
    ("ALGERIA", 0),
    ("ARGENTINA", 1),
    ("BRAZIL", 1),
    ("CANADA", 1),
    ("EGYPT", 4),
    ("ETHIOPIA", 0),
    ("FRANCE", 3),
    ("GERMANY", 3),
    ("INDIA", 2),
    ("INDONESIA", 2),
    ("IRAN", 4),
    ("IRAQ", 4),
    ("JAPAN", 2),
    ("JORDAN", 4),
    ("KENYA", 0),
    ("MOROCCO", 0),
    ("MOZAMBIQUE", 0),
    ("PERU", 1),
    ("CHINA", 2),
    ("ROMANIA", 3),
    ("SAUDI ARABIA", 4),
    ("VIETNAM", 2),
    ("RUSSIA", 3),
    ("UNITED KINGDOM", 3),
    ("UNITED STATES", 1),
];

const REGIONS: [&str; 5] = ["AFRICA", "AMERICA", "ASIA", "EUROPE", "MIDDLE EAST"];

const COLORS: [&str; 16] = [
    "almond", "azure", "blush", "chiffon", "coral", "cream", "forest", "ghost", "honeydew",
    "lavender", "linen", "misty", "navy", "olive", "peach", "sienna",
];
const TYPE_SIZE: [&str; 6] = ["STANDARD", "SMALL", "MEDIUM", "LARGE", "ECONOMY", "PROMO"];
const TYPE_FINISH: [&str; 5] = ["ANODIZED", "BURNISHED", "PLATED", "POLISHED", "BRUSHED"];
const TYPE_METAL: [&str; 5] = ["TIN", "NICKEL", "BRASS", "STEEL", "COPPER"];
const CONTAINER_SIZE: [&str; 5] = ["SM", "LG", "MED", "JUMBO", "WRAP"];
const CONTAINER_KIND: [&str; 8] = ["CASE", "BOX", "BAG", "JAR", "PKG", "PACK", "CAN", "DRUM"];
const SEGMENTS: [&str; 5] = ["AUTOMOBILE", "BUILDING", "FURNITURE", "MACHINERY", "HOUSEHOLD"];
const PRIORITIES: [&str; 5] = ["1-URGENT", "2-HIGH", "3-MEDIUM", "4-NOT SPECIFIED", "5-LOW"];
const INSTRUCTIONS: [&str; 4] = ["DELIVER IN PERSON", "COLLECT COD", "NONE", "TAKE BACK RETURN"];
const MODES: [&str; 7] = ["REG AIR", "AIR", "RAIL", "SHIP", "TRUCK", "MAIL", "FOB"];
const WORDS: [&str; 24] = [
    "furiously", "quickly", "carefully", "blithely", "slyly", "final", "pending", "regular",
    "express", "ironic", "bold", "even", "special", "silent", "packages", "requests",
    "accounts", "deposits", "theodolites", "pinto", "beans", "foxes", "ideas", "instructions",
];

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Uniform draw in `[0, n)` for `(row, salt)`; `n` must be positive.
fn pick(row: u64, salt: u64, n: u64) -> u64 {
    splitmix64(row ^ salt.wrapping_mul(0xD6E8_FEB8_6659_FD93)) % n
}

fn pick_in(row: u64, salt: u64, lo: i64, hi: i64) -> i64 {
    lo + pick(row, salt, (hi - lo + 1) as u64) as i64
}

fn word<'a>(row: u64, salt: u64, list: &[&'a str]) -> &'a str {
    list[pick(row, salt, list.len() as u64) as usize]
}

fn cents(row: u64, salt: u64, lo: i64, hi: i64) -> f64 {
    pick_in(row, salt, lo, hi) as f64 / 100.0
}

fn text(row: u64, salt: u64) -> Scalar {
    let n = 3 + pick(row, salt, 4);
    let words: Vec<&str> = (0..n).map(|i| word(row, salt + 1 + i, &WORDS)).collect();
    Scalar::Str(words.join(" "))
}

fn address(row: u64, salt: u64) -> Scalar {
    let len = 10 + pick(row, salt, 21) as usize;
    let s: String = (0..len)
        .map(|i| {
            let c = pick(row, salt + 1 + i as u64, 36) as u8;
            if c < 10 {
                (b'0' + c) as char
            } else {
                (b'a' + c - 10) as char
            }
        })
        .collect();
    Scalar::Str(s)
}

fn phone(nation: i64, row: u64, salt: u64) -> Scalar {
    Scalar::Str(format!(
        "{}-{}-{}-{}",
        nation + 10,
        pick_in(row, salt, 100, 999),
        pick_in(row, salt + 1, 100, 999),
        pick_in(row, salt + 2, 1000, 9999)
    ))
}

fn key(row: u64) -> i64 {
    row as i64 + 1
}

fn part_retail_price(partkey: i64) -> f64 {
    (90_000 + (partkey / 10) % 20_001 + 100 * (partkey % 1000)) as f64 / 100.0
}

fn supplier_nation(row: u64) -> i64 {
    pick(row, 31, 25) as i64
}

fn customer_nation(row: u64) -> i64 {
    pick(row, 41, 25) as i64
}

/// Orders keys are sparse: 8 used keys out of every 32.
fn order_key(order_row: u64) -> i64 {
    ((order_row / 8) * 32 + order_row % 8) as i64 + 1
}

fn order_date(order_row: u64) -> i32 {
    pick_in(order_row, 51, START_DATE as i64, LAST_ORDER_DATE as i64) as i32
}

fn ship_date(row: u64) -> i32 {
    order_date(row / 4) + pick_in(row, 61, 1, 121) as i32
}

fn receipt_date(row: u64) -> i32 {
    ship_date(row) + pick_in(row, 62, 1, 30) as i32
}

fn line_partkey(row: u64, s: &Scale) -> i64 {
    pick(row, 63, s.parts) as i64 + 1
}

fn line_quantity(row: u64) -> i64 {
    pick_in(row, 64, 1, 50)
}

static PART_COLUMNS: [ColumnFn; 9] = [
    |r, _| Scalar::I64(key(r)),
    |r, _| {
        let words: Vec<&str> = (0..5).map(|i| word(r, 11 + i, &COLORS)).collect();
        Scalar::Str(words.join(" "))
    },
    |r, _| Scalar::Str(format!("Manufacturer#{}", 1 + pick(r, 17, 5))),
    |r, _| Scalar::Str(format!("Brand#{}{}", 1 + pick(r, 17, 5), 1 + pick(r, 18, 5))),
    |r, _| {
        Scalar::Str(format!(
            "{} {} {}",
            word(r, 19, &TYPE_SIZE),
            word(r, 20, &TYPE_FINISH),
            word(r, 21, &TYPE_METAL)
        ))
    },
    |r, _| Scalar::I32(pick_in(r, 22, 1, 50) as i32),
    |r, _| {
        Scalar::Str(format!(
            "{} {}",
            word(r, 23, &CONTAINER_SIZE),
            word(r, 24, &CONTAINER_KIND)
        ))
    },
    |r, _| Scalar::F64(part_retail_price(key(r))),
    |r, _| text(r, 25),
];

static SUPPLIER_COLUMNS: [ColumnFn; 7] = [
    |r, _| Scalar::I64(key(r)),
    |r, _| Scalar::Str(format!("Supplier#{:09}", key(r))),
    |r, _| address(r, 32),
    |r, _| Scalar::I64(supplier_nation(r)),
    |r, _| phone(supplier_nation(r), r, 33),
    |r, _| Scalar::F64(cents(r, 34, -99_999, 999_999)),
    |r, _| text(r, 35),
];

static PARTSUPP_COLUMNS: [ColumnFn; 5] = [
    |r, _| Scalar::I64((r / 4) as i64 + 1),
    |r, s| {
        let partkey = r / 4 + 1;
        let n = s.suppliers;
        let supp = (partkey + (r % 4) * (n / 4 + (partkey - 1) / n)) % n + 1;
        Scalar::I64(supp as i64)
    },
    |r, _| Scalar::I32(pick_in(r, 36, 1, 9999) as i32),
    |r, _| Scalar::F64(cents(r, 37, 100, 100_000)),
    |r, _| text(r, 38),
];

static CUSTOMER_COLUMNS: [ColumnFn; 8] = [
    |r, _| Scalar::I64(key(r)),
    |r, _| Scalar::Str(format!("Customer#{:09}", key(r))),
    |r, _| address(r, 42),
    |r, _| Scalar::I64(customer_nation(r)),
    |r, _| phone(customer_nation(r), r, 43),
    |r, _| Scalar::F64(cents(r, 44, -99_999, 999_999)),
    |r, _| Scalar::Str(word(r, 45, &SEGMENTS).to_string()),
    |r, _| text(r, 46),
];

static ORDERS_COLUMNS: [ColumnFn; 9] = [
    |r, _| Scalar::I64(order_key(r)),
    |r, s| Scalar::I64(pick(r, 52, s.customers) as i64 + 1),
    |r, _| {
        let status = if order_date(r) + 151 <= CURRENT_DATE {
            "F"
        } else if order_date(r) > CURRENT_DATE {
            "O"
        } else {
            "P"
        };
        Scalar::Str(status.to_string())
    },
    |r, _| Scalar::F64(cents(r, 53, 85_771, 55_528_516)),
    |r, _| Scalar::Date(order_date(r)),
    |r, _| Scalar::Str(word(r, 54, &PRIORITIES).to_string()),
    |r, s| Scalar::Str(format!("Clerk#{:09}", pick(r, 55, s.clerks) + 1)),
    |_, _| Scalar::I32(0),
    |r, _| text(r, 56),
];

static LINEITEM_COLUMNS: [ColumnFn; 16] = [
    |r, _| Scalar::I64(order_key(r / 4)),
    |r, s| Scalar::I64(line_partkey(r, s)),
    |r, s| Scalar::I64(pick(r, 65, s.suppliers) as i64 + 1),
    |r, _| Scalar::I32((r % 4) as i32 + 1),
    |r, _| Scalar::F64(line_quantity(r) as f64),
    |r, s| {
        let price = part_retail_price(line_partkey(r, s));
        Scalar::F64((line_quantity(r) as f64 * price * 100.0).round() / 100.0)
    },
    |r, _| Scalar::F64(cents(r, 66, 0, 10)),
    |r, _| Scalar::F64(cents(r, 67, 0, 8)),
    |r, _| {
        let flag = if receipt_date(r) <= CURRENT_DATE {
            if pick(r, 68, 2) == 0 {
                "R"
            } else {
                "A"
            }
        } else {
            "N"
        };
        Scalar::Str(flag.to_string())
    },
    |r, _| {
        let status = if ship_date(r) > CURRENT_DATE { "O" } else { "F" };
        Scalar::Str(status.to_string())
    },
    |r, _| Scalar::Date(ship_date(r)),
    |r, _| Scalar::Date(order_date(r / 4) + pick_in(r, 69, 30, 90) as i32),
    |r, _| Scalar::Date(receipt_date(r)),
    |r, _| Scalar::Str(word(r, 70, &INSTRUCTIONS).to_string()),
    |r, _| Scalar::Str(word(r, 71, &MODES).to_string()),
    |r, _| text(r, 72),
];

static NATION_COLUMNS: [ColumnFn; 4] = [
    |r, _| Scalar::I64(r as i64),
    |r, _| Scalar::Str(NATIONS[r as usize % 25].0.to_string()),
    |r, _| Scalar::I64(NATIONS[r as usize % 25].1),
    |r, _| text(r, 81),
];

static REGION_COLUMNS: [ColumnFn; 3] = [
    |r, _| Scalar::I64(r as i64),
    |r, _| Scalar::Str(REGIONS[r as usize % 5].to_string()),
    |r, _| text(r, 91),
];

fn column_fn(table: TpchTable, idx: usize) -> ColumnFn {
    let fns: &[ColumnFn] = match table {
        TpchTable::Part => &PART_COLUMNS,
        TpchTable::Supplier => &SUPPLIER_COLUMNS,
        TpchTable::PartSupp => &PARTSUPP_COLUMNS,
        TpchTable::Customer => &CUSTOMER_COLUMNS,
        TpchTable::Orders => &ORDERS_COLUMNS,
        TpchTable::LineItem => &LINEITEM_COLUMNS,
        TpchTable::Nation => &NATION_COLUMNS,
        TpchTable::Region => &REGION_COLUMNS,
    };
    fns[idx]
}
