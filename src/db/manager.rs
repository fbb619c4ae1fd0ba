//! Connection registry.
//!
//! The manager owns named [`Adapter`] instances and the per-backend adapter
//! factories. The registry lock is held only for map access - adapters are
//! built and closed outside it - so concurrent `connect` calls under one name
//! race with last-writer-wins and readers always see a consistent snapshot.

use crate::config::{BackendType, ConnectionConfig, DEFAULT_CONNECTION_NAME};
use crate::db::adapter::Adapter;
use crate::error::{StoreError, StoreResult};
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Builds an adapter for a connection config. Registered per backend type;
/// the default factory is [`Adapter::connect`].
pub type AdapterFactory =
    Arc<dyn Fn(ConnectionConfig) -> BoxFuture<'static, StoreResult<Adapter>> + Send + Sync>;

/// Outcome of a successful `connect`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionStatus {
    pub name: String,
    pub backend: BackendType,
    pub server_version: Option<String>,
}

struct ManagerInner {
    connections: RwLock<HashMap<String, Arc<Adapter>>>,
    factories: RwLock<HashMap<BackendType, AdapterFactory>>,
}

#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                connections: RwLock::new(HashMap::new()),
                factories: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Override the adapter factory used for a backend type.
    pub fn set_adapter_factory(&self, backend: BackendType, factory: AdapterFactory) {
        self.inner.factories.write().insert(backend, factory);
    }

    /// Connect under `name` (default `"default"`). An existing entry under
    /// the same name is overwritten; the displaced adapter is closed after
    /// the registry is updated.
    pub async fn connect(
        &self,
        name: Option<&str>,
        config: ConnectionConfig,
    ) -> StoreResult<ConnectionStatus> {
        let name = name.unwrap_or(DEFAULT_CONNECTION_NAME).to_string();
        let backend = config.backend;

        info!(name = %name, backend = %backend, "Connecting");

        let factory = self.inner.factories.read().get(&backend).cloned();
        let adapter = match factory {
            Some(factory) => factory(config).await?,
            None => Adapter::connect(config).await?,
        };
        let server_version = adapter.server_version().await;

        let displaced = self
            .inner
            .connections
            .write()
            .insert(name.clone(), Arc::new(adapter));

        if let Some(old) = displaced {
            info!(name = %name, "Closing displaced connection");
            old.close().await;
        }

        info!(
            name = %name,
            backend = %backend,
            server_version = ?server_version,
            "Connected"
        );

        Ok(ConnectionStatus {
            name,
            backend,
            server_version,
        })
    }

    /// Look up a connection by name (default `"default"`).
    pub fn get_connection(&self, name: Option<&str>) -> StoreResult<Arc<Adapter>> {
        let name = name.unwrap_or(DEFAULT_CONNECTION_NAME);
        self.inner
            .connections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::connection_not_found(name))
    }

    /// Check if a connection exists under `name` (default `"default"`).
    pub fn has_connection(&self, name: Option<&str>) -> bool {
        let name = name.unwrap_or(DEFAULT_CONNECTION_NAME);
        self.inner.connections.read().contains_key(name)
    }

    /// Names of all registered connections.
    pub fn connection_names(&self) -> Vec<String> {
        self.inner.connections.read().keys().cloned().collect()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.inner.connections.read().len()
    }

    /// Close and remove a connection. Closing a nonexistent name is a no-op.
    pub async fn close(&self, name: &str) {
        let removed = self.inner.connections.write().remove(name);
        if let Some(adapter) = removed {
            info!(name = %name, "Closing connection");
            adapter.close().await;
        }
    }

    /// Close and remove every connection.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Arc<Adapter>)> =
            self.inner.connections.write().drain().collect();
        for (name, adapter) in drained {
            info!(name = %name, "Closing connection");
            adapter.close().await;
        }
        info!("All connections closed");
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connection_names())
            .finish()
    }
}
