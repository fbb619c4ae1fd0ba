//! Process-wide database facade.
//!
//! At the outermost composition boundary an application may want one shared
//! registry instead of threading a [`ConnectionManager`] through every call
//! site. This module holds that single process-lifetime singleton; everything
//! else in the crate takes an explicit manager or adapter.

use crate::config::{ConnectionConfig, DEFAULT_CONNECTION_NAME};
use crate::db::adapter::Adapter;
use crate::db::manager::{ConnectionManager, ConnectionStatus};
use crate::error::{StoreError, StoreResult};
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::OnceLock;

/// Loads a connection config by name for lazy initialization.
pub type ConfigLoader =
    Arc<dyn Fn(&str) -> BoxFuture<'static, StoreResult<ConnectionConfig>> + Send + Sync>;

struct GlobalRegistry {
    manager: ConnectionManager,
    loader: RwLock<Option<ConfigLoader>>,
}

static GLOBAL: OnceLock<GlobalRegistry> = OnceLock::new();

fn registry() -> &'static GlobalRegistry {
    GLOBAL.get_or_init(|| GlobalRegistry {
        manager: ConnectionManager::new(),
        loader: RwLock::new(None),
    })
}

/// The manager behind the facade, for callers that outgrow it.
pub fn global_manager() -> ConnectionManager {
    registry().manager.clone()
}

/// Register the loader used by [`get_database_async`] to initialize
/// connections on first use.
pub fn set_config_loader(loader: ConfigLoader) {
    *registry().loader.write() = Some(loader);
}

/// Connect and register under `name` (default `"default"`).
pub async fn init_database(
    config: ConnectionConfig,
    name: Option<&str>,
) -> StoreResult<ConnectionStatus> {
    registry().manager.connect(name, config).await
}

/// Synchronous accessor. Fails when the named connection was never
/// initialized; the error points at [`get_database_async`], which can
/// initialize lazily.
pub fn get_database(name: Option<&str>) -> StoreResult<Arc<Adapter>> {
    let name = name.unwrap_or(DEFAULT_CONNECTION_NAME);
    registry().manager.get_connection(Some(name)).map_err(|_| {
        StoreError::connection_not_found_with(
            name,
            "initialize with init_database(), or use get_database_async() with a config loader",
        )
    })
}

/// Asynchronous accessor. Falls back to the registered config loader when the
/// named connection does not exist yet; fails with a loader-not-set error
/// when no loader was registered and no prior init occurred.
pub async fn get_database_async(name: Option<&str>) -> StoreResult<Arc<Adapter>> {
    let name = name.unwrap_or(DEFAULT_CONNECTION_NAME);
    if let Ok(adapter) = registry().manager.get_connection(Some(name)) {
        return Ok(adapter);
    }

    let loader = registry().loader.read().clone();
    match loader {
        Some(loader) => {
            let config = loader(name).await?;
            registry().manager.connect(Some(name), config).await?;
            registry().manager.get_connection(Some(name))
        }
        None => Err(StoreError::ConfigLoaderNotSet),
    }
}
