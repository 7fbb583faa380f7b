//! `ConnectorSplit` and the process-wide split-document registry.
//!
//! Persisted splits are JSON objects whose `name` field is a type tag. Each
//! split type registers a decoder for its tag; `ConnectorSplit::create` looks
//! the tag up and dispatches.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::{ConnectorError, Result};
use crate::handle::{mismatch, ConnectorKind};
use crate::hive::split::HiveConnectorSplit;
use crate::tpch::split::TpchConnectorSplit;

/// Decodes a persisted split document.
pub type SplitDecoder = fn(&Value) -> Result<ConnectorSplit>;

static SPLIT_DECODERS: Lazy<RwLock<HashMap<String, SplitDecoder>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register `decoder` for documents tagged `tag`. Returns false if the tag
/// was already registered (the existing decoder is kept).
pub fn register_split_serde(tag: &str, decoder: SplitDecoder) -> bool {
    let mut map = SPLIT_DECODERS
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if map.contains_key(tag) {
        return false;
    }
    map.insert(tag.to_string(), decoder);
    true
}

pub fn unregister_split_serde(tag: &str) -> bool {
    SPLIT_DECODERS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(tag)
        .is_some()
}

pub fn has_split_serde(tag: &str) -> bool {
    SPLIT_DECODERS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(tag)
}

/// A unit of scan work for one connector kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorSplit {
    Tpch(TpchConnectorSplit),
    Hive(HiveConnectorSplit),
}

impl ConnectorSplit {
    pub fn kind(&self) -> ConnectorKind {
        match self {
            ConnectorSplit::Tpch(_) => ConnectorKind::Tpch,
            ConnectorSplit::Hive(_) => ConnectorKind::Hive,
        }
    }

    pub fn connector_id(&self) -> &str {
        match self {
            ConnectorSplit::Tpch(s) => &s.connector_id,
            ConnectorSplit::Hive(s) => &s.connector_id,
        }
    }

    /// Relative scheduling cost.
    pub fn split_weight(&self) -> i64 {
        match self {
            ConnectorSplit::Tpch(s) => s.split_weight,
            ConnectorSplit::Hive(s) => s.split_weight,
        }
    }

    pub fn as_tpch(&self) -> Result<&TpchConnectorSplit> {
        match self {
            ConnectorSplit::Tpch(s) => Ok(s),
            other => Err(mismatch(ConnectorKind::Tpch, other.kind())),
        }
    }

    pub fn as_hive(&self) -> Result<&HiveConnectorSplit> {
        match self {
            ConnectorSplit::Hive(s) => Ok(s),
            other => Err(mismatch(ConnectorKind::Hive, other.kind())),
        }
    }

    pub fn serialize(&self) -> Result<Value> {
        match self {
            ConnectorSplit::Tpch(s) => s.serialize(),
            ConnectorSplit::Hive(s) => s.serialize(),
        }
    }

    /// Revive a persisted split through the decoder registered for its tag.
    pub fn create(doc: &Value) -> Result<ConnectorSplit> {
        let tag = doc
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectorError::Serde("split document has no 'name' tag".into()))?;
        let decoder = SPLIT_DECODERS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
            .copied()
            .ok_or_else(|| {
                ConnectorError::Lookup(format!("no split decoder registered for '{tag}'"))
            })?;
        decoder(doc)
    }
}

impl From<TpchConnectorSplit> for ConnectorSplit {
    fn from(s: TpchConnectorSplit) -> Self {
        ConnectorSplit::Tpch(s)
    }
}

impl From<HiveConnectorSplit> for ConnectorSplit {
    fn from(s: HiveConnectorSplit) -> Self {
        ConnectorSplit::Hive(s)
    }
}

/// Serde helper persisting `u64` as a decimal string, so values beyond
/// 2^53 survive JSON consumers that read numbers as doubles.
pub(crate) mod u64_string {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }
        match Repr::deserialize(d)? {
            Repr::Text(s) => s.parse().map_err(D::Error::custom),
            Repr::Number(n) => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_nothing(_: &Value) -> Result<ConnectorSplit> {
        Err(ConnectorError::Serde("test decoder".into()))
    }

    #[test]
    fn unknown_tag_is_lookup_error() {
        let doc = serde_json::json!({ "name": "NoSuchSplit-split-test" });
        assert!(matches!(
            ConnectorSplit::create(&doc),
            Err(ConnectorError::Lookup(_))
        ));
        assert!(matches!(
            ConnectorSplit::create(&serde_json::json!({})),
            Err(ConnectorError::Serde(_))
        ));
    }

    #[test]
    fn register_twice_keeps_first() {
        let tag = "split-test-register-twice";
        assert!(register_split_serde(tag, decode_nothing));
        assert!(!register_split_serde(tag, decode_nothing));
        assert!(has_split_serde(tag));
        assert!(unregister_split_serde(tag));
        assert!(!has_split_serde(tag));
    }
}
