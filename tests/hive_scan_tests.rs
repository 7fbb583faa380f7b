//! File-split scans through the hive connector.

mod common;

use std::sync::Arc;

use futures::FutureExt;
use proptest::prelude::*;

use splitscan_connectors::config::ConnectorConfig;
use splitscan_connectors::hive::{
    bucket_for, hive_row_hash, into_connector_splits, BucketConversionFilter, FileFormat,
    HiveBucketConversion, HiveColumnHandle, HiveConnector, HiveConnectorSplit, HiveTableHandle,
    BUCKET_COLUMN, FIELD_DELIM_PARAM, PATH_COLUMN,
};
use splitscan_connectors::{
    CommitStrategy, Connector, ConnectorError, ConnectorQueryCtx, ConnectorSplit, DataSourceState,
    Executor, InsertTableHandle, NextBatch, TableHandle,
};
use splitscan_core::filter::Filter;
use splitscan_core::schema::{DataType, Field, Schema};
use splitscan_core::types::{Column, Scalar};
use splitscan_exec::{ScanRequest, SplitQueue, TableScan};
use splitscan_io::{FsStorage, Storage};
use splitscan_mem::MemoryBudgetImpl;

use common::{ctx, drain_split, hive_handles, scan_all, sorted_rows, ManualExecutor};

fn write_rows(dir: &tempfile::TempDir, name: &str, rows: usize) -> String {
    let path = dir.path().join(name);
    let body: String = (0..rows).map(|i| format!("{i}|name-{i}|{}\n", i % 7)).collect();
    let path = path.to_string_lossy().to_string();
    FsStorage::new().write(&path, body.as_bytes()).unwrap();
    path
}

fn data_columns() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("name", DataType::Utf8, true),
        Field::new("grp", DataType::Int32, true),
    ])
}

fn table() -> TableHandle {
    TableHandle::Hive(HiveTableHandle::new("hive", "t").with_data_columns(data_columns()))
}

fn pipe_delimited(splits: Vec<HiveConnectorSplit>) -> Vec<Arc<ConnectorSplit>> {
    into_connector_splits(
        splits
            .into_iter()
            .map(|s| s.with_serde_parameter(FIELD_DELIM_PARAM, "|"))
            .collect(),
    )
}

#[test]
fn byte_range_splits_cover_file_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rows(&dir, "part-0.txt", 500);
    let conn = HiveConnector::new("hive", ConnectorConfig::new()).unwrap();
    let (output, handles) = hive_handles(&[
        HiveColumnHandle::regular("id", DataType::Int64),
        HiveColumnHandle::regular("name", DataType::Utf8),
    ]);
    let ctx = ctx();

    let whole_split = pipe_delimited(conn.split_file(&path, FileFormat::Text, u64::MAX).unwrap());
    assert_eq!(whole_split.len(), 1);
    let mut source = conn.create_data_source(&output, &table(), &handles, &ctx).unwrap();
    let whole = sorted_rows(&scan_all(source.as_mut(), &whole_split, 64));
    assert_eq!(whole.len(), 500);

    for split_bytes in [3, 7, 100, 1000, 4096] {
        let splits = pipe_delimited(conn.split_file(&path, FileFormat::Text, split_bytes).unwrap());
        let mut source = conn.create_data_source(&output, &table(), &handles, &ctx).unwrap();
        let rows = sorted_rows(&scan_all(source.as_mut(), &splits, 33));
        assert_eq!(rows, whole, "split size {split_bytes}");
        let size = std::fs::metadata(&path).unwrap().len();
        assert!(source.completed_bytes() >= size);
    }
}

#[test]
fn json_lines_with_partition_and_synthesized_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ds=2024-03-01").join("f.json");
    let path = path.to_string_lossy().to_string();
    FsStorage::new()
        .write(&path, b"{\"id\": 1, \"name\": \"a\"}\n{\"id\": 2}\n")
        .unwrap();

    let conn = HiveConnector::new("hive", ConnectorConfig::new()).unwrap();
    let (output, handles) = hive_handles(&[
        HiveColumnHandle::regular("name", DataType::Utf8),
        HiveColumnHandle::partition_key("ds", DataType::Date32),
        HiveColumnHandle::synthesized(PATH_COLUMN, DataType::Utf8),
        HiveColumnHandle::synthesized(BUCKET_COLUMN, DataType::Int32),
        HiveColumnHandle::row_index("$row_index"),
    ]);
    let split = HiveConnectorSplit::new("hive", path.clone(), FileFormat::Json)
        .with_partition_key("ds", Some("2024-03-01"))
        .with_bucket(2);
    let ctx = ctx();
    let mut source = conn.create_data_source(&output, &table(), &handles, &ctx).unwrap();
    let batches = scan_all(source.as_mut(), &into_connector_splits(vec![split]), 10);
    assert_eq!(batches.len(), 1);
    let b = &batches[0];
    assert_eq!(b.columns[0].values, vec![Scalar::Str("a".into()), Scalar::Null]);
    assert_eq!(b.columns[1].values, vec![Scalar::Date(19_783); 2]);
    assert_eq!(b.columns[2].values, vec![Scalar::Str(path); 2]);
    assert_eq!(b.columns[3].values, vec![Scalar::I32(2); 2]);
    assert_eq!(b.columns[4].values, vec![Scalar::I64(0), Scalar::I64(1)]);
}

#[test]
fn bucket_conversion_keeps_only_target_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rows(&dir, "bucket-1.txt", 200);
    let conn = HiveConnector::new("hive", ConnectorConfig::new()).unwrap();
    let (output, handles) = hive_handles(&[HiveColumnHandle::regular("name", DataType::Utf8)]);
    let conversion = HiveBucketConversion {
        table_bucket_count: 8,
        partition_bucket_count: 4,
        bucket_column_handles: vec![HiveColumnHandle::regular("id", DataType::Int64)],
    };
    let split = HiveConnectorSplit::new("hive", path, FileFormat::Text)
        .with_serde_parameter(FIELD_DELIM_PARAM, "|")
        .with_bucket_conversion(conversion)
        .with_bucket(5);
    let ctx = ctx();
    let mut source = conn.create_data_source(&output, &table(), &handles, &ctx).unwrap();
    let batches = scan_all(source.as_mut(), &into_connector_splits(vec![split]), 64);

    let expected: Vec<String> = (0..200i64)
        .filter(|i| bucket_for(hive_row_hash(&[Scalar::I64(*i)]), 8) == 5)
        .map(|i| format!("[Str(\"name-{i}\")]"))
        .collect();
    let mut expected = expected;
    expected.sort();
    assert_eq!(sorted_rows(&batches), expected);
    // Ids 1 and 9 land in partition bucket 1 of 4 but table bucket 1 of 8.
    assert!(!expected.contains(&"[Str(\"name-1\")]".to_string()));
    assert!(expected.contains(&"[Str(\"name-5\")]".to_string()));
    assert_eq!(source.completed_rows(), 200);
}

#[test]
fn trailing_text_column_with_leading_bucket_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("b.txt").to_string_lossy().to_string();
    FsStorage::new()
        .write(&path, b"1,100\n5,200\n9,300\n13,400\n21,500\n")
        .unwrap();
    let conn = HiveConnector::new("hive", ConnectorConfig::new()).unwrap();
    let (output, handles) = hive_handles(&[HiveColumnHandle::regular("v", DataType::Int64)]);
    let split = HiveConnectorSplit::new("hive", path, FileFormat::Text)
        .with_bucket_conversion(HiveBucketConversion {
            table_bucket_count: 8,
            partition_bucket_count: 4,
            bucket_column_handles: vec![HiveColumnHandle::regular("k", DataType::Int64)],
        })
        .with_bucket(5);
    let splits = into_connector_splits(vec![split]);
    let ctx = ctx();

    let declared = TableHandle::Hive(HiveTableHandle::new("hive", "kv").with_data_columns(Schema::new(vec![
        Field::new("k", DataType::Int64, true),
        Field::new("v", DataType::Int64, true),
    ])));
    let mut source = conn.create_data_source(&output, &declared, &handles, &ctx).unwrap();
    let values: Vec<Scalar> = scan_all(source.as_mut(), &splits, 16)
        .into_iter()
        .flat_map(|b| b.columns.into_iter().flat_map(|c| c.values))
        .collect();
    assert_eq!(values, vec![Scalar::I64(200), Scalar::I64(400), Scalar::I64(500)]);

    // Without a declared layout the file's columns cannot be located.
    let undeclared = TableHandle::Hive(HiveTableHandle::new("hive", "kv"));
    let mut source = conn.create_data_source(&output, &undeclared, &handles, &ctx).unwrap();
    assert!(matches!(
        source.add_split(Arc::clone(&splits[0])),
        Err(ConnectorError::Validation(_))
    ));
    assert_eq!(source.state(), DataSourceState::Unbound);
}

proptest! {
    #[test]
    fn bucket_filter_agrees_with_hash(keys in proptest::collection::vec(any::<i64>(), 1..64), bucket in 0i32..8) {
        let conversion = HiveBucketConversion {
            table_bucket_count: 8,
            partition_bucket_count: 4,
            bucket_column_handles: vec![HiveColumnHandle::regular("k", DataType::Int64)],
        };
        let filter = BucketConversionFilter::new(&conversion, bucket).unwrap();
        let column = Column::new("k", keys.iter().copied().map(Scalar::I64).collect());
        let mask = filter.mask(&[&column], keys.len());
        for (key, keep) in keys.iter().zip(mask) {
            let hash = hive_row_hash(&[Scalar::I64(*key)]);
            prop_assert_eq!(keep, bucket_for(hash, 8) == bucket);
            prop_assert!(bucket_for(hash, 8) % 4 == bucket_for(hash, 4));
        }
    }
}

#[test]
fn subfield_and_dynamic_filters() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rows(&dir, "f.txt", 50);
    let conn = HiveConnector::new("hive", ConnectorConfig::new()).unwrap();
    let table = TableHandle::Hive(
        HiveTableHandle::new("hive", "t")
            .with_data_columns(data_columns())
            .with_filter("grp", Filter::equal(Scalar::I32(3))),
    );
    let (output, handles) = hive_handles(&[HiveColumnHandle::regular("id", DataType::Int64)]);
    let request = ScanRequest::new(Arc::new(conn), output, table, handles)
        .with_batch_rows(8)
        .with_dynamic_filter(0, Filter::between(Scalar::I64(0), Scalar::I64(30)));
    let ctx = ctx();
    let split = HiveConnectorSplit::new("hive", path, FileFormat::Text)
        .with_serde_parameter(FIELD_DELIM_PARAM, "|");
    let queue = SplitQueue::new(into_connector_splits(vec![split]));
    let mut ids = Vec::new();
    let metrics = TableScan::new(&request, &ctx, &queue)
        .unwrap()
        .drain(|b| {
            ids.extend(b.columns[0].values.iter().cloned());
            Ok(())
        })
        .unwrap();
    assert_eq!(ids, vec![Scalar::I64(3), Scalar::I64(10), Scalar::I64(17), Scalar::I64(24)]);
    assert_eq!(metrics.completed_rows, 50);
    assert_eq!(metrics.source_stats["rowsFilteredByPredicate"].value, 46);
}

#[test]
fn pending_read_completes_on_executor() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rows(&dir, "f.txt", 10);
    let executor = Arc::new(ManualExecutor::default());
    let io: Arc<dyn Executor> = executor.clone();
    let conn = HiveConnector::new("hive", ConnectorConfig::new())
        .unwrap()
        .with_executors(Some(io), None);
    let (output, handles) = hive_handles(&[HiveColumnHandle::regular("id", DataType::Int64)]);
    let ctx = ctx();
    let mut source = conn.create_data_source(&output, &table(), &handles, &ctx).unwrap();
    let split = HiveConnectorSplit::new("hive", path, FileFormat::Text)
        .with_serde_parameter(FIELD_DELIM_PARAM, "|");
    source.add_split(Arc::new(ConnectorSplit::Hive(split))).unwrap();

    let NextBatch::Pending(ready) = source.next(100).unwrap() else {
        panic!("expected a pending read");
    };
    assert!(ready.now_or_never().is_none());
    let NextBatch::Pending(again) = source.next(100).unwrap() else {
        panic!("read has not run yet");
    };
    assert_eq!(executor.run_all(), 1);
    futures::executor::block_on(again);

    let NextBatch::Ready(batch) = source.next(100).unwrap() else {
        panic!("expected rows after the read completed");
    };
    assert_eq!(batch.num_rows(), 10);
    assert!(matches!(source.next(100).unwrap(), NextBatch::Pending(_)));
    executor.run_all();
    let rest = drain_split(source.as_mut(), 100);
    assert!(rest.is_empty());
    assert_eq!(source.state(), DataSourceState::Exhausted);
    assert_eq!(executor.pending(), 0);
}

#[test]
fn dropping_mid_split_returns_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rows(&dir, "f.txt", 10);
    let executor = Arc::new(ManualExecutor::default());
    let io: Arc<dyn Executor> = executor.clone();
    let conn = HiveConnector::new("hive", ConnectorConfig::new())
        .unwrap()
        .with_executors(Some(io), None);
    let (output, handles) = hive_handles(&[HiveColumnHandle::regular("name", DataType::Utf8)]);
    let ctx = ConnectorQueryCtx::new("q", "t", MemoryBudgetImpl::new(1 << 20));
    let split = Arc::new(ConnectorSplit::Hive(
        HiveConnectorSplit::new("hive", path, FileFormat::Text)
            .with_serde_parameter(FIELD_DELIM_PARAM, "|"),
    ));

    let mut source = conn.create_data_source(&output, &table(), &handles, &ctx).unwrap();
    source.add_split(Arc::clone(&split)).unwrap();
    assert!(matches!(source.next(64).unwrap(), NextBatch::Pending(_)));
    assert!(ctx.memory_budget().used_bytes() > 0);
    drop(source);
    assert_eq!(ctx.memory_budget().used_bytes(), 0);

    let mut source = conn.create_data_source(&output, &table(), &handles, &ctx).unwrap();
    source.add_split(split).unwrap();
    assert!(matches!(source.next(64).unwrap(), NextBatch::Pending(_)));
    source.close();
    assert_eq!(source.state(), DataSourceState::Closed);
    assert_eq!(ctx.memory_budget().used_bytes(), 0);
    // The abandoned reads still run to completion harmlessly.
    executor.run_all();
}

#[test]
fn write_path_unsupported_and_columnar_formats_rejected() {
    let ctx = ctx();
    let conn = HiveConnector::new("hive", ConnectorConfig::new()).unwrap();
    let insert = InsertTableHandle {
        connector_id: "hive".into(),
        table_name: "t".into(),
    };
    assert!(matches!(
        conn.create_data_sink(&Schema::default(), &insert, &ctx, CommitStrategy::NoCommit),
        Err(ConnectorError::NotSupported(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = write_rows(&dir, "f.orc", 1);
    let (output, handles) = hive_handles(&[HiveColumnHandle::regular("id", DataType::Int64)]);
    let mut source = conn.create_data_source(&output, &table(), &handles, &ctx).unwrap();
    let split = HiveConnectorSplit::new("hive", path, FileFormat::Orc);
    assert!(matches!(
        source.add_split(Arc::new(ConnectorSplit::Hive(split))),
        Err(ConnectorError::NotSupported(_))
    ));
}

#[test]
fn invalid_bucket_conversion_rejected_on_add_split() {
    let ctx = ctx();
    let conn = HiveConnector::new("hive", ConnectorConfig::new()).unwrap();
    let (output, handles) = hive_handles(&[HiveColumnHandle::regular("id", DataType::Int64)]);
    let mut source = conn.create_data_source(&output, &table(), &handles, &ctx).unwrap();
    let split = HiveConnectorSplit::new("hive", "/nonexistent/f.txt", FileFormat::Text)
        .with_bucket_conversion(HiveBucketConversion {
            table_bucket_count: 6,
            partition_bucket_count: 4,
            bucket_column_handles: vec![HiveColumnHandle::regular("id", DataType::Int64)],
        })
        .with_bucket(1);
    assert!(matches!(
        source.add_split(Arc::new(ConnectorSplit::Hive(split))),
        Err(ConnectorError::Validation(_))
    ));
}
