//! Polystore: a cross-backend persistence layer.
//!
//! One uniform contract over heterogeneous database engines - MongoDB,
//! PostgreSQL, MySQL, and SQLite - plus a declarative validation engine that
//! vets records before they are persisted. Application code can switch
//! between document and relational stores without rewriting query,
//! validation, or transaction logic.
//!
//! # Layers
//!
//! - [`db`]: adapter lifecycle (connect/retry/close), the query/execute
//!   primitives, session-scoped transactions, the connection registry, and a
//!   process-wide facade.
//! - [`validate`]: schema-driven rule pipeline with cross-field,
//!   cross-collection, asynchronous, and conditional rules.
//! - [`model`]: binds a schema and a collection name to an adapter and
//!   enforces validate-before-write.
//! - [`migrate`]: the persisted migration history record.
//!
//! ```no_run
//! use polystore::{ConnectionConfig, ConnectionManager, Model, Schema};
//! use polystore::validate::{FieldRules, Format};
//!
//! # async fn demo() -> polystore::StoreResult<()> {
//! let manager = ConnectionManager::new();
//! manager
//!     .connect(None, ConnectionConfig::from_url("sqlite:app.db")?)
//!     .await?;
//!
//! let users = Model::builder("users")
//!     .schema(Schema::new().field(
//!         "email",
//!         FieldRules::new().required().trim().to_lowercase().format(Format::Email).unique(),
//!     ))
//!     .build(manager.get_connection(None)?);
//!
//! let mut record = polystore::Record::new();
//! record.insert("email".into(), "Ada@Example.com ".into());
//! users.create(record).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod migrate;
pub mod model;
pub mod validate;

pub use config::{
    BackendOptions, BackendType, ConnectionConfig, ConnectionParams, MongoOptions, PoolOptions,
    RetryOptions,
};
pub use db::{
    Adapter, AdapterFactory, Comparison, ConnectionManager, ConnectionStatus, ExecResult, Filter,
    HealthReport, Operation, ParamValue, PoolStatus, Query, Record, Session,
};
pub use error::{StoreError, StoreResult, Violation};
pub use migrate::{MigrationEntry, MigrationHistory};
pub use model::{Model, ModelBuilder, ModelConfig};
pub use validate::{Schema, ValidationContext, Validator};
