//! Session-scoped adapter view.
//!
//! A [`Session`] is the unit of atomicity: a SQL transaction or a MongoDB
//! multi-statement session with an open transaction. Operations issued
//! through a session are causally ordered and either all commit or all roll
//! back. Commit and rollback are crate-internal - they belong to
//! [`crate::db::Adapter::transaction`], which owns the session's lifecycle.

use crate::db::document::{self, DocExecOutcome};
use crate::db::sql::{self, SqlTx};
use crate::db::types::{ExecResult, Operation, Query, Record};
use crate::error::StoreResult;
use futures_util::future::BoxFuture;
use mongodb::{ClientSession, Database};
use serde_json::Value as JsonValue;
use std::time::Instant;
use tracing::debug;

/// An open backend-native session.
pub enum Session {
    Sql {
        tx: SqlTx,
    },
    Document {
        database: Database,
        session: ClientSession,
    },
}

impl Session {
    /// Run a read through this session. The read observes writes already
    /// issued through the session, committed or not.
    pub async fn query(&mut self, target: &str, query: Query) -> StoreResult<Vec<Record>> {
        match self {
            Session::Sql { tx } => {
                let (sql, params) = sql::render_query(target, &query, tx.flavor())?;
                sql::query_tx(tx, &sql, &params).await
            }
            Session::Document { database, session } => {
                document::query_in_session(database, session, target, &query).await
            }
        }
    }

    /// Run a mutating operation through this session.
    pub async fn execute(&mut self, target: &str, operation: Operation) -> StoreResult<ExecResult> {
        let start = Instant::now();
        let wants_insert_id = matches!(operation, Operation::Insert { .. });

        let result = match self {
            Session::Sql { tx } => {
                let (sql, params) = sql::render_operation(target, &operation, tx.flavor())?;
                let outcome = sql::execute_tx(tx, &sql, &params).await?;
                ExecResult {
                    rows_affected: outcome.rows_affected,
                    inserted_id: if wants_insert_id {
                        outcome.last_insert_id.map(JsonValue::from)
                    } else {
                        None
                    },
                    execution_time_ms: start.elapsed().as_millis() as u64,
                }
            }
            Session::Document { database, session } => {
                let DocExecOutcome {
                    rows_affected,
                    inserted_id,
                } = document::execute_in_session(database, session, target, &operation).await?;
                ExecResult {
                    rows_affected,
                    inserted_id,
                    execution_time_ms: start.elapsed().as_millis() as u64,
                }
            }
        };

        debug!(
            target = %target,
            rows_affected = result.rows_affected,
            "Executed in session"
        );
        Ok(result)
    }

    /// Run `f` against this already-open session. Nested transactions join
    /// the enclosing one rather than opening a second native transaction;
    /// commit and rollback happen only at the outermost level.
    pub async fn transaction<T, F>(&mut self, f: F) -> StoreResult<T>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, StoreResult<T>> + Send,
    {
        f(self).await
    }

    pub(crate) async fn commit(self) -> StoreResult<()> {
        match self {
            Session::Sql { tx } => tx.commit().await,
            Session::Document { mut session, .. } => {
                session.commit_transaction().await.map_err(Into::into)
            }
        }
    }

    pub(crate) async fn rollback(self) -> StoreResult<()> {
        match self {
            Session::Sql { tx } => tx.rollback().await,
            Session::Document { mut session, .. } => {
                session.abort_transaction().await.map_err(Into::into)
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Session::Sql { tx } => f.debug_struct("Session::Sql").field("flavor", &tx.flavor()).finish(),
            Session::Document { database, .. } => f
                .debug_struct("Session::Document")
                .field("database", &database.name())
                .finish(),
        }
    }
}
