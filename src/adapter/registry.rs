use lazy_static::lazy_static;
use std::collections::BTreeMap;

use super::{Adapter, ConnectionParams, SqliteAdapter};
use crate::error::{MigrationError, Result};

/// How to build one backend, and which revision files it reads
pub struct AdapterFactory {
    pub extension: &'static str,
    pub connect: fn(&ConnectionParams) -> Result<Box<dyn Adapter>>,
}

lazy_static! {
    pub static ref ADAPTERS: BTreeMap<&'static str, AdapterFactory> = {
        let mut registry = BTreeMap::new();

        register_sqlite(&mut registry);

        registry
    };
}

fn register_sqlite(registry: &mut BTreeMap<&'static str, AdapterFactory>) {
    registry.insert("sqlite", AdapterFactory {
        extension: "sql",
        connect: connect_sqlite,
    });
}

fn connect_sqlite(params: &ConnectionParams) -> Result<Box<dyn Adapter>> {
    Ok(Box::new(SqliteAdapter::connect(params)?))
}

/// Look up a backend by its identifier (case-insensitive).
pub fn factory(name: &str) -> Result<&'static AdapterFactory> {
    ADAPTERS
        .get(name.to_ascii_lowercase().as_str())
        .ok_or_else(|| {
            MigrationError::Config(format!(
                "Unknown adapter '{}', available: {}",
                name,
                ADAPTERS.keys().copied().collect::<Vec<_>>().join(", ")
            ))
        })
}

/// Connect to the backend registered under `name`.
pub fn connect(name: &str, params: &ConnectionParams) -> Result<Box<dyn Adapter>> {
    (factory(name)?.connect)(params)
}
