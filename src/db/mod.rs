//! Database abstraction layer.
//!
//! This module provides the uniform backend contract:
//! - Adapter lifecycle (connect/retry, query, execute, transaction, close)
//! - Session-scoped views for atomic multi-operation work
//! - Connection registry with per-backend adapter factories
//! - A process-wide facade for the outermost composition boundary
//! - Shared record/filter/operation data model and row decoding

pub mod adapter;
pub mod document;
pub mod global;
pub mod manager;
pub mod session;
pub mod sql;
pub mod types;

pub use adapter::Adapter;
pub use global::{
    ConfigLoader, get_database, get_database_async, global_manager, init_database,
    set_config_loader,
};
pub use manager::{AdapterFactory, ConnectionManager, ConnectionStatus};
pub use session::Session;
pub use types::{
    Comparison, ExecResult, Filter, FilterClause, HealthReport, Operation, ParamValue, PoolStatus,
    Query, Record,
};
