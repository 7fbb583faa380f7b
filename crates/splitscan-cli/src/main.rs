//! splitscan CLI: scan tpch tables and hive file splits from the command line.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

use splitscan_connectors::config::ConnectorConfig;
use splitscan_connectors::hive::{
    HiveColumnHandle, HiveColumnType, HiveTableHandle, HIVE_CONNECTOR_NAME,
};
use splitscan_connectors::registry::{new_connector, register_builtin_factories};
use splitscan_connectors::tpch::connector::DEFAULT_SCALE_FACTOR_KEY;
use splitscan_connectors::tpch::{
    table_schema, TpchColumnHandle, TpchConnectorSplit, TpchTable, TpchTableHandle,
    TPCH_CONNECTOR_NAME,
};
use splitscan_connectors::{
    ColumnHandle, ConnectorQueryCtx, ConnectorSplit, Executor, TableHandle, ThreadExecutor,
};
use splitscan_core::config::ScanConfig;
use splitscan_core::schema::{DataType, Field, Schema};
use splitscan_core::types::{format_date, RowBatch, Scalar};
use splitscan_exec::{parallel_scan, ScanRequest, SplitQueue, TableScan};
use splitscan_mem::MemoryBudgetImpl;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "splitscan")]
#[command(version = splitscan_core::VERSION)]
#[command(about = "Split-based table scans over synthetic tpch tables and hive files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a generated tpch table across splits and print a row digest
    Tpch {
        /// Table name (nation, lineitem, ...)
        #[arg(short, long)]
        table: String,

        #[arg(long, default_value_t = 0.01)]
        scale_factor: f64,

        /// Number of splits (overrides SPLITSCAN_SPLIT_PARTS)
        #[arg(long)]
        splits: Option<u64>,

        /// Parallel workers (overrides SPLITSCAN_MAX_PARALLEL_TASKS)
        #[arg(long)]
        workers: Option<usize>,

        /// Rows per batch (overrides SPLITSCAN_MAX_BATCH_ROWS)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Comma-separated column names; all columns when omitted
        #[arg(long)]
        columns: Option<String>,

        /// Memory cap in bytes (overrides SPLITSCAN_MEM_CAP_BYTES)
        #[arg(long)]
        memory_cap: Option<usize>,
    },

    /// Decode a persisted split document and print it
    Split {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Scan one persisted hive split and print its rows as JSON lines
    Hive {
        /// Path to a HiveConnectorSplit document
        #[arg(short, long)]
        split: PathBuf,

        /// Comma-separated `name:type[:kind]`, kind one of regular,
        /// partition, synthesized, rowindex
        #[arg(long)]
        columns: String,

        /// Comma-separated `name:type` layout of the file, in file order;
        /// needed to read columns of text files
        #[arg(long)]
        data_columns: Option<String>,

        #[arg(long)]
        batch_size: Option<usize>,

        /// Run file reads on a background thread
        #[arg(long)]
        async_io: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    register_builtin_factories();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Tpch {
            table,
            scale_factor,
            splits,
            workers,
            batch_size,
            columns,
            memory_cap,
        } => {
            let mut config = ScanConfig::from_env();
            if let Some(parts) = splits {
                config.split_parts = parts;
            }
            if let Some(workers) = workers {
                config.max_parallel_tasks = workers;
            }
            if let Some(rows) = batch_size {
                config.max_batch_rows = rows;
            }
            if let Some(cap) = memory_cap {
                config.mem_cap_bytes = cap;
            }
            scan_tpch(&table, scale_factor, columns.as_deref(), &config)
        }
        Commands::Split { file } => show_split(&file),
        Commands::Hive {
            split,
            columns,
            data_columns,
            batch_size,
            async_io,
        } => {
            let mut config = ScanConfig::from_env();
            if let Some(rows) = batch_size {
                config.max_batch_rows = rows;
            }
            scan_hive(&split, &columns, data_columns.as_deref(), async_io, &config)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn scan_tpch(table: &str, scale_factor: f64, columns: Option<&str>, config: &ScanConfig) -> CliResult<()> {
    config.validate()?;
    let table = TpchTable::from_name(table)?;
    let schema = table_schema(table);
    let output = match columns {
        None => schema,
        Some(list) => Schema::new(
            list.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(|name| {
                    schema
                        .index_of(name)
                        .map(|i| schema.fields[i].clone())
                        .ok_or_else(|| format!("{table} has no column '{name}'"))
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    let handles: HashMap<String, ColumnHandle> = output
        .fields
        .iter()
        .map(|f| (f.name.clone(), ColumnHandle::Tpch(TpchColumnHandle::new(f.name.clone()))))
        .collect();

    let connector_config = ConnectorConfig::new().with(DEFAULT_SCALE_FACTOR_KEY, scale_factor.to_string());
    let connector = new_connector(TPCH_CONNECTOR_NAME, TPCH_CONNECTOR_NAME, connector_config, None, None)?;
    let handle = TpchTableHandle::new(TPCH_CONNECTOR_NAME, table, scale_factor)?;
    let splits = (0..config.split_parts)
        .map(|part| {
            TpchConnectorSplit::new(TPCH_CONNECTOR_NAME, config.split_parts, part)
                .map(|s| Arc::new(ConnectorSplit::Tpch(s)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        table = table.name(),
        scale_factor,
        splits = config.split_parts,
        workers = config.max_parallel_tasks,
        "scanning tpch table"
    );
    let request = ScanRequest::new(connector, output, TableHandle::Tpch(handle), handles)
        .with_batch_rows(config.max_batch_rows as u64);
    let ctx = ConnectorQueryCtx::new("cli", "tpch", MemoryBudgetImpl::new(config.mem_cap_bytes));
    let metrics = parallel_scan(&request, &ctx, splits, config.max_parallel_tasks)?;
    metrics.emit(table.name());

    println!(
        "table={} scale_factor={} splits={} rows={} bytes={} batches={} digest={}",
        table,
        scale_factor,
        metrics.splits,
        metrics.rows,
        metrics.completed_bytes,
        metrics.batches,
        metrics.digest_hex()
    );
    println!("peak_memory_bytes={}", ctx.memory_budget().peak_bytes());
    Ok(())
}

fn read_split(path: &Path) -> CliResult<ConnectorSplit> {
    let doc: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    Ok(ConnectorSplit::create(&doc)?)
}

fn show_split(path: &Path) -> CliResult<()> {
    let split = read_split(path)?;
    println!(
        "kind={} connector={} weight={}",
        split.kind(),
        split.connector_id(),
        split.split_weight()
    );
    if let Ok(hive) = split.as_hive() {
        println!("{hive}");
    }
    println!("{}", serde_json::to_string_pretty(&split.serialize()?)?);
    Ok(())
}

fn scan_hive(
    path: &Path,
    columns: &str,
    data_columns: Option<&str>,
    async_io: bool,
    config: &ScanConfig,
) -> CliResult<()> {
    config.validate()?;
    let split = read_split(path)?;
    let hive = split.as_hive()?;

    let mut fields = Vec::new();
    let mut handles = HashMap::new();
    for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let handle = parse_column(column)?;
        fields.push(Field::new(handle.name.clone(), handle.data_type, true));
        handles.insert(handle.name.clone(), ColumnHandle::Hive(handle));
    }
    let mut table = HiveTableHandle::new(hive.connector_id.clone(), hive.file_name());
    if let Some(layout) = data_columns {
        table = table.with_data_columns(parse_layout(layout)?);
    }

    let io: Option<Arc<dyn Executor>> = if async_io {
        Some(Arc::new(ThreadExecutor))
    } else {
        None
    };
    let connector = new_connector(
        HIVE_CONNECTOR_NAME,
        &hive.connector_id,
        ConnectorConfig::new(),
        io,
        None,
    )?;
    let request = ScanRequest::new(connector, Schema::new(fields), TableHandle::Hive(table), handles)
        .with_batch_rows(config.max_batch_rows as u64);
    let ctx = ConnectorQueryCtx::new("cli", "hive", MemoryBudgetImpl::new(config.mem_cap_bytes));
    let queue = SplitQueue::new([Arc::new(split.clone())]);

    let metrics = TableScan::new(&request, &ctx, &queue)?.drain(|batch| {
        print_rows(&batch);
        Ok(())
    })?;
    metrics.emit(hive.file_name());
    eprintln!("{}", serde_json::to_string(&metrics)?);
    Ok(())
}

/// `name:type,...` in file order.
fn parse_layout(layout: &str) -> CliResult<Schema> {
    let mut fields = Vec::new();
    for column in layout.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let Some((name, data_type)) = column.split_once(':') else {
            return Err(format!("data column '{column}' must be name:type").into());
        };
        fields.push(Field::new(name, data_type.parse::<DataType>()?, true));
    }
    Ok(Schema::new(fields))
}

/// `name:type[:kind]`; kind defaults to a regular file column.
fn parse_column(column: &str) -> CliResult<HiveColumnHandle> {
    let mut parts = column.split(':');
    let (Some(name), Some(data_type)) = (parts.next(), parts.next()) else {
        return Err(format!("column '{column}' must be name:type[:kind]").into());
    };
    let data_type: DataType = data_type.parse()?;
    let column_type = match parts.next().unwrap_or("regular") {
        "regular" => HiveColumnType::Regular,
        "partition" => HiveColumnType::PartitionKey,
        "synthesized" => HiveColumnType::Synthesized,
        "rowindex" => HiveColumnType::RowIndex,
        other => return Err(format!("unknown column kind '{other}'").into()),
    };
    Ok(HiveColumnHandle::new(name, column_type, data_type))
}

fn print_rows(batch: &RowBatch) {
    for row in 0..batch.num_rows() {
        let obj: Map<String, Value> = batch
            .columns
            .iter()
            .map(|c| (c.name.clone(), scalar_json(&c.values[row])))
            .collect();
        println!("{}", Value::Object(obj));
    }
}

fn scalar_json(value: &Scalar) -> Value {
    match value {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => json!(b),
        Scalar::I32(v) => json!(v),
        Scalar::I64(v) => json!(v),
        Scalar::F32(v) => json!(v),
        Scalar::F64(v) => json!(v),
        Scalar::Str(s) => json!(s),
        Scalar::Bin(b) => json!(b),
        Scalar::Date(d) => json!(format_date(*d)),
    }
}
