//! Process-wide connector factory and connector instance registries.
//!
//! Both are plain `RwLock<HashMap>` tables created on first use. They are
//! written at startup (or test setup) and read from many scan threads.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::config::ConnectorConfig;
use crate::connector::{Connector, ConnectorFactory, Executor};
use crate::error::{ConnectorError, Result};
use crate::hive::connector::HiveConnectorFactory;
use crate::hive::split::HiveConnectorSplit;
use crate::tpch::connector::TpchConnectorFactory;
use crate::tpch::split::TpchConnectorSplit;

static FACTORIES: Lazy<RwLock<HashMap<String, Arc<dyn ConnectorFactory>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static CONNECTORS: Lazy<RwLock<HashMap<String, Arc<dyn Connector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns false if a factory with the same name is already registered.
pub fn register_connector_factory(factory: Arc<dyn ConnectorFactory>) -> bool {
    let mut map = FACTORIES.write().unwrap_or_else(PoisonError::into_inner);
    let name = factory.connector_name().to_string();
    if map.contains_key(&name) {
        return false;
    }
    tracing::debug!(connector = %name, "registered connector factory");
    map.insert(name, factory);
    true
}

pub fn unregister_connector_factory(name: &str) -> bool {
    FACTORIES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(name)
        .is_some()
}

pub fn has_connector_factory(name: &str) -> bool {
    FACTORIES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(name)
}

pub fn get_connector_factory(name: &str) -> Result<Arc<dyn ConnectorFactory>> {
    FACTORIES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
        .ok_or_else(|| ConnectorError::Lookup(format!("no connector factory named '{name}'")))
}

/// Instantiate a connector through the factory registered under `name`.
pub fn new_connector(
    name: &str,
    id: &str,
    config: ConnectorConfig,
    io_executor: Option<Arc<dyn Executor>>,
    cpu_executor: Option<Arc<dyn Executor>>,
) -> Result<Arc<dyn Connector>> {
    // Clone out of the lock so factories may touch the registry themselves.
    let factory = get_connector_factory(name)?;
    factory.new_connector(id, config, io_executor, cpu_executor)
}

/// Returns false if a connector with the same id is already registered.
pub fn register_connector(connector: Arc<dyn Connector>) -> bool {
    let mut map = CONNECTORS.write().unwrap_or_else(PoisonError::into_inner);
    let id = connector.connector_id().to_string();
    if map.contains_key(&id) {
        return false;
    }
    map.insert(id, connector);
    true
}

pub fn get_connector(id: &str) -> Result<Arc<dyn Connector>> {
    CONNECTORS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(id)
        .cloned()
        .ok_or_else(|| ConnectorError::Lookup(format!("no connector with id '{id}'")))
}

pub fn unregister_connector(id: &str) -> bool {
    CONNECTORS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(id)
        .is_some()
}

/// Register the bundled `tpch` and `hive` factories and their split decoders.
/// Safe to call more than once.
pub fn register_builtin_factories() {
    register_connector_factory(Arc::new(TpchConnectorFactory));
    register_connector_factory(Arc::new(HiveConnectorFactory));
    TpchConnectorSplit::register_serde();
    HiveConnectorSplit::register_serde();
}
