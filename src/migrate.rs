//! Migration history.
//!
//! One persisted entry per applied migration, written through the adapter's
//! `execute` under the same transaction semantics as any other write. File
//! scaffolding and ordering policy belong to callers; this module only owns
//! the history record.

use crate::config::BackendType;
use crate::db::adapter::Adapter;
use crate::db::session::Session;
use crate::db::sql::quote_ident;
use crate::db::types::{Filter, Operation, Query, Record, SqlFlavor};
use crate::error::StoreResult;
use futures_util::future::BoxFuture;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

/// Default history store name.
pub const DEFAULT_HISTORY_STORE: &str = "_migrations";

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MigrationEntry {
    pub name: String,
    /// RFC 3339 timestamp.
    pub applied_at: String,
}

/// History of applied migrations in a configurable store.
pub struct MigrationHistory {
    adapter: Arc<Adapter>,
    store: String,
}

impl MigrationHistory {
    pub fn new(adapter: Arc<Adapter>) -> Self {
        Self::with_store(adapter, DEFAULT_HISTORY_STORE)
    }

    pub fn with_store(adapter: Arc<Adapter>, store: impl Into<String>) -> Self {
        Self {
            adapter,
            store: store.into(),
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    /// Create the history table on SQL backends. Document collections are
    /// created on first write, so this is a no-op there. Idempotent.
    pub async fn ensure_store(&self) -> StoreResult<()> {
        let flavor = match self.adapter.backend_type() {
            BackendType::MongoDB => return Ok(()),
            BackendType::MySQL => SqlFlavor::MySql,
            BackendType::PostgreSQL => SqlFlavor::Postgres,
            BackendType::SQLite => SqlFlavor::Sqlite,
        };
        let table = quote_ident(&self.store, flavor)?;
        let columns = match flavor {
            SqlFlavor::MySql => "name VARCHAR(255) PRIMARY KEY, applied_at VARCHAR(64) NOT NULL",
            SqlFlavor::Postgres | SqlFlavor::Sqlite => {
                "name TEXT PRIMARY KEY, applied_at TEXT NOT NULL"
            }
        };
        let ddl = format!("CREATE TABLE IF NOT EXISTS {} ({})", table, columns);
        self.adapter
            .execute(
                &self.store,
                Operation::Sql {
                    sql: ddl,
                    params: vec![],
                },
            )
            .await?;
        Ok(())
    }

    /// All applied migrations, oldest first.
    pub async fn applied(&self) -> StoreResult<Vec<MigrationEntry>> {
        let rows = self
            .adapter
            .query(&self.store, Query::filter(Filter::new()))
            .await?;
        let mut entries: Vec<MigrationEntry> = rows.iter().map(entry_from_record).collect();
        entries.sort_by(|a, b| a.applied_at.cmp(&b.applied_at));
        Ok(entries)
    }

    pub async fn is_applied(&self, name: &str) -> StoreResult<bool> {
        let rows = self
            .adapter
            .query(
                &self.store,
                Query::filter_limit(Filter::where_eq("name", name), 1),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Record a migration as applied.
    pub async fn record(&self, name: &str) -> StoreResult<()> {
        self.adapter
            .execute(
                &self.store,
                Operation::Insert {
                    record: history_record(name),
                },
            )
            .await?;
        Ok(())
    }

    /// Session variant of [`MigrationHistory::record`].
    pub async fn record_in(&self, session: &mut Session, name: &str) -> StoreResult<()> {
        session
            .execute(
                &self.store,
                Operation::Insert {
                    record: history_record(name),
                },
            )
            .await?;
        Ok(())
    }

    /// Forget a migration (e.g. after a manual down migration).
    pub async fn remove(&self, name: &str) -> StoreResult<u64> {
        let result = self
            .adapter
            .execute(
                &self.store,
                Operation::Delete {
                    filter: Filter::where_eq("name", name),
                },
            )
            .await?;
        Ok(result.rows_affected)
    }

    /// Run `migration` and record it in one transaction; a failing migration
    /// rolls back both. Returns false without running when the name is
    /// already recorded.
    pub async fn apply<F>(&self, name: &str, migration: F) -> StoreResult<bool>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, StoreResult<()>> + Send + 'static,
    {
        if self.is_applied(name).await? {
            debug!(migration = %name, "Already applied, skipping");
            return Ok(false);
        }

        let store = self.store.clone();
        let entry = history_record(name);
        self.adapter
            .transaction(move |session| {
                Box::pin(async move {
                    migration(&mut *session).await?;
                    session
                        .execute(&store, Operation::Insert { record: entry })
                        .await?;
                    Ok(())
                })
            })
            .await?;

        info!(migration = %name, "Migration applied");
        Ok(true)
    }
}

fn history_record(name: &str) -> Record {
    let mut record = Record::new();
    record.insert("name".to_string(), JsonValue::String(name.to_string()));
    record.insert(
        "applied_at".to_string(),
        JsonValue::String(chrono::Utc::now().to_rfc3339()),
    );
    record
}

fn entry_from_record(record: &Record) -> MigrationEntry {
    MigrationEntry {
        name: record
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        applied_at: record
            .get("applied_at")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_record_shape() {
        let record = history_record("0001_create_users");
        assert_eq!(
            record.get("name").and_then(|v| v.as_str()),
            Some("0001_create_users")
        );
        let applied_at = record.get("applied_at").and_then(|v| v.as_str()).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(applied_at).is_ok());
    }

    #[test]
    fn test_entry_from_partial_record() {
        let entry = entry_from_record(&Record::new());
        assert!(entry.name.is_empty());
        assert!(entry.applied_at.is_empty());
    }
}
