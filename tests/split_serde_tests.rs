//! Split documents and the process-wide registries.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use splitscan_connectors::config::ConnectorConfig;
use splitscan_connectors::hive::{
    FileFormat, FileProperties, HiveBucketConversion, HiveColumnHandle, HiveConnectorFactory,
    HiveConnectorSplit, RowIdProperties, HIVE_SPLIT_TAG,
};
use splitscan_connectors::registry::{
    get_connector, has_connector_factory, new_connector, register_builtin_factories,
    register_connector, register_connector_factory, unregister_connector,
    unregister_connector_factory,
};
use splitscan_connectors::split::{has_split_serde, register_split_serde, unregister_split_serde};
use splitscan_connectors::tpch::{TpchConnectorSplit, TPCH_SPLIT_TAG};
use splitscan_connectors::{ConnectorError, ConnectorKind, ConnectorSplit};
use splitscan_core::schema::DataType;

fn full_hive_split() -> HiveConnectorSplit {
    let mut split = HiveConnectorSplit::new("hive-1", "s3a://warehouse/t/ds=2024-01-01/b-3.orc", FileFormat::Orc)
        .with_range(0, u64::MAX)
        .with_partition_key("ds", Some("2024-01-01"))
        .with_partition_key("region", None)
        .with_bucket(3)
        .with_bucket_conversion(HiveBucketConversion {
            table_bucket_count: 16,
            partition_bucket_count: 8,
            bucket_column_handles: vec![
                HiveColumnHandle::regular("id", DataType::Int64),
                HiveColumnHandle::regular("tag", DataType::Utf8),
            ],
        })
        .with_serde_parameter("field.delim", "\u{1}")
        .with_info_column("$path", "s3://warehouse/t/ds=2024-01-01/b-3.orc")
        .with_properties(FileProperties {
            file_size: Some(9_007_199_254_740_993),
            modification_time: Some(1_700_000_000),
        })
        .with_weight(42);
    split.custom_split_info = BTreeMap::from([("table_format".to_string(), "hive".to_string())]);
    split.extra_file_info = Some("opaque".into());
    split.row_id_properties = Some(RowIdProperties {
        metadata_version: 2,
        partition_id: 11,
        table_guid: "0c4a".into(),
    });
    split
}

#[test]
fn hive_document_round_trips_every_field() {
    register_builtin_factories();
    let split = full_hive_split();
    let doc = split.serialize().unwrap();
    assert_eq!(doc["name"], HIVE_SPLIT_TAG);
    assert_eq!(doc["length"], json!("18446744073709551615"));
    assert_eq!(doc["bucketConversion"]["tableBucketCount"], 16);
    assert_eq!(doc["rowIdProperties"]["tableGuid"], "0c4a");
    assert_eq!(doc["partitionKeys"]["region"], serde_json::Value::Null);

    let text = serde_json::to_string(&doc).unwrap();
    let reparsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    let revived = ConnectorSplit::create(&reparsed).unwrap();
    assert_eq!(revived, ConnectorSplit::Hive(split));
    assert_eq!(revived.kind(), ConnectorKind::Hive);
    assert_eq!(revived.split_weight(), 42);
}

#[test]
fn tpch_document_round_trips() {
    register_builtin_factories();
    for split in [
        TpchConnectorSplit::new("tpch", 8, 3).unwrap().with_weight(7),
        TpchConnectorSplit::with_row_range("tpch", 10..25).unwrap(),
    ] {
        let doc = split.serialize().unwrap();
        assert_eq!(doc["name"], TPCH_SPLIT_TAG);
        assert_eq!(ConnectorSplit::create(&doc).unwrap(), ConnectorSplit::Tpch(split));
    }
}

#[test]
fn unknown_and_malformed_documents() {
    register_builtin_factories();
    assert!(matches!(
        ConnectorSplit::create(&json!({ "name": "IcebergSplit" })),
        Err(ConnectorError::Lookup(_))
    ));
    assert!(matches!(
        ConnectorSplit::create(&json!({ "connectorId": "hive" })),
        Err(ConnectorError::Serde(_))
    ));
    assert!(matches!(
        ConnectorSplit::create(&json!({ "name": HIVE_SPLIT_TAG, "filePath": 3 })),
        Err(ConnectorError::Serde(_))
    ));
    assert!(matches!(
        ConnectorSplit::create(&json!({
            "name": TPCH_SPLIT_TAG,
            "connectorId": "tpch",
            "range": { "mode": "part", "totalParts": 2, "partNumber": 5 }
        })),
        Err(ConnectorError::Validation(_))
    ));
}

#[test]
fn custom_split_decoder_registration() {
    fn decode(doc: &serde_json::Value) -> splitscan_connectors::Result<ConnectorSplit> {
        let path = doc["path"].as_str().unwrap_or_default();
        Ok(ConnectorSplit::Hive(HiveConnectorSplit::new("custom", path, FileFormat::Json)))
    }
    assert!(register_split_serde("CustomSplit", decode));
    assert!(!register_split_serde("CustomSplit", decode));
    assert!(has_split_serde("CustomSplit"));
    let split = ConnectorSplit::create(&json!({ "name": "CustomSplit", "path": "/x.json" })).unwrap();
    assert_eq!(split.as_hive().unwrap().file_path, "/x.json");
    assert!(unregister_split_serde("CustomSplit"));
    assert!(!has_split_serde("CustomSplit"));
}

#[test]
fn factory_registry_lookup_and_duplicates() {
    register_builtin_factories();
    assert!(has_connector_factory("tpch"));
    assert!(!register_connector_factory(Arc::new(HiveConnectorFactory)));
    assert!(matches!(
        new_connector("no-such-connector", "x", ConnectorConfig::new(), None, None),
        Err(ConnectorError::Lookup(_))
    ));

    let conn = new_connector("tpch", "tpch-registry-test", ConnectorConfig::new(), None, None).unwrap();
    assert_eq!(conn.connector_id(), "tpch-registry-test");
    assert!(!conn.can_add_dynamic_filter());

    assert!(register_connector(Arc::clone(&conn)));
    assert!(!register_connector(conn));
    assert_eq!(get_connector("tpch-registry-test").unwrap().connector_id(), "tpch-registry-test");
    assert!(unregister_connector("tpch-registry-test"));
    assert!(matches!(get_connector("tpch-registry-test"), Err(ConnectorError::Lookup(_))));
    assert!(!unregister_connector_factory("never-registered"));
}

#[test]
fn hive_factory_passes_config() {
    register_builtin_factories();
    let bad = ConnectorConfig::new().with("hive.max-read-rows", "lots");
    assert!(matches!(
        new_connector("hive", "hive-bad", bad, None, None),
        Err(ConnectorError::Validation(_))
    ));
    let conn = new_connector("hive", "hive-ok", ConnectorConfig::new(), None, None).unwrap();
    assert!(conn.can_add_dynamic_filter());
}
