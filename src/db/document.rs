//! Document backend over the MongoDB driver.
//!
//! Filters and operations translate to BSON; records round-trip through
//! `serde_json`. Session variants mirror the pool paths so transactional
//! reads observe pending writes.

use crate::config::ConnectionConfig;
use crate::db::types::{Comparison, Filter, Operation, Query, Record};
use crate::error::{StoreError, StoreResult};
use futures_util::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, ClientSession, Database};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

/// A connected document store: client handle plus the target database.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pub(crate) client: Client,
    pub(crate) database: Database,
}

/// Connect to a MongoDB deployment and verify it with a ping. On ping failure
/// the client is shut down before the error propagates, so no monitoring
/// tasks or sockets leak.
pub async fn connect(config: &ConnectionConfig) -> StoreResult<DocumentStore> {
    let url = config.connection_url()?;
    let mut options = ClientOptions::parse(&url).await.map_err(StoreError::from)?;

    options.server_selection_timeout = Some(Duration::from_secs(
        config.retry.connect_timeout_or_default(),
    ));
    options.max_pool_size = Some(config.pool.max_connections_or_default(config.backend));
    options.min_pool_size = Some(config.pool.min_connections_or_default());

    if let Some(mongo) = config.options.mongo() {
        if let Some(replica_set) = &mongo.replica_set {
            options.repl_set_name = Some(replica_set.clone());
        }
        if let Some(direct) = mongo.direct_connection {
            options.direct_connection = Some(direct);
        }
        if let Some(app_name) = &mongo.app_name {
            options.app_name = Some(app_name.clone());
        }
    }

    let database_name = config
        .connection
        .database
        .clone()
        .or_else(|| options.default_database.clone())
        .ok_or_else(|| {
            StoreError::invalid_input("MongoDB connections require a database name")
        })?;

    let client = Client::with_options(options).map_err(StoreError::from)?;
    let database = client.database(&database_name);

    if let Err(e) = database.run_command(doc! { "ping": 1 }).await {
        client.clone().shutdown().await;
        return Err(StoreError::from(e));
    }

    debug!(database = %database_name, "Document store connected");
    Ok(DocumentStore { client, database })
}

/// Cheapest round trip for health probes.
pub async fn ping(database: &Database) -> StoreResult<()> {
    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(StoreError::from)?;
    Ok(())
}

/// Best-effort server version lookup.
pub async fn server_version(database: &Database) -> Option<String> {
    let info = database.run_command(doc! { "buildInfo": 1 }).await.ok()?;
    info.get_str("version").ok().map(String::from)
}

// =============================================================================
// BSON Conversion
// =============================================================================

pub(crate) fn record_to_document(record: &Record) -> StoreResult<Document> {
    mongodb::bson::to_document(record)
        .map_err(|e| StoreError::invalid_input(format!("Record is not BSON-encodable: {}", e)))
}

pub(crate) fn document_to_record(doc: Document) -> Record {
    doc.into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect()
}

fn bson_to_json(value: Bson) -> JsonValue {
    match value {
        Bson::Null | Bson::Undefined => JsonValue::Null,
        Bson::Boolean(b) => JsonValue::Bool(b),
        Bson::Int32(i) => JsonValue::Number(i.into()),
        Bson::Int64(i) => JsonValue::Number(i.into()),
        Bson::Double(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(f.to_string())),
        Bson::String(s) => JsonValue::String(s),
        Bson::Array(items) => JsonValue::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(doc) => JsonValue::Object(document_to_record(doc)),
        Bson::ObjectId(oid) => JsonValue::String(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
        other => other.into_relaxed_extjson(),
    }
}

pub(crate) fn filter_to_document(filter: &Filter) -> StoreResult<Document> {
    let mut doc = Document::new();
    for clause in &filter.clauses {
        let value = mongodb::bson::to_bson(&clause.value).map_err(|e| {
            StoreError::invalid_input(format!("Filter value is not BSON-encodable: {}", e))
        })?;
        match clause.cmp {
            Comparison::Eq => {
                doc.insert(clause.field.clone(), value);
            }
            cmp => {
                let mut inner = Document::new();
                inner.insert(cmp.mongo_op(), value);
                doc.insert(clause.field.clone(), inner);
            }
        }
    }
    Ok(doc)
}

// =============================================================================
// Reads
// =============================================================================

/// Run a read against the database. Raw SQL requests are rejected - the
/// document backend only understands filters.
pub async fn query(database: &Database, target: &str, query: &Query) -> StoreResult<Vec<Record>> {
    let (filter, limit) = match query {
        Query::Filter { filter, limit } => (filter, *limit),
        Query::Sql { .. } => {
            return Err(StoreError::invalid_input(
                "Raw SQL queries are not supported on the document backend",
            ));
        }
    };

    let coll = database.collection::<Document>(target);
    let mut find = coll.find(filter_to_document(filter)?);
    if let Some(limit) = limit {
        find = find.limit(limit as i64);
    }
    let cursor = find.await.map_err(StoreError::from)?;
    let docs: Vec<Document> = cursor.try_collect().await.map_err(StoreError::from)?;
    Ok(docs.into_iter().map(document_to_record).collect())
}

/// Session variant of [`query`]; reads observe the session's pending writes.
pub async fn query_in_session(
    database: &Database,
    session: &mut ClientSession,
    target: &str,
    query: &Query,
) -> StoreResult<Vec<Record>> {
    let (filter, limit) = match query {
        Query::Filter { filter, limit } => (filter, *limit),
        Query::Sql { .. } => {
            return Err(StoreError::invalid_input(
                "Raw SQL queries are not supported on the document backend",
            ));
        }
    };

    let coll = database.collection::<Document>(target);
    let mut find = coll.find(filter_to_document(filter)?);
    if let Some(limit) = limit {
        find = find.limit(limit as i64);
    }
    let mut cursor = find.session(&mut *session).await.map_err(StoreError::from)?;
    let mut records = Vec::new();
    while let Some(doc) = cursor.next(&mut *session).await {
        records.push(document_to_record(doc.map_err(StoreError::from)?));
    }
    Ok(records)
}

// =============================================================================
// Writes
// =============================================================================

/// Outcome of a mutating document operation.
pub struct DocExecOutcome {
    pub rows_affected: u64,
    pub inserted_id: Option<JsonValue>,
}

/// Run a mutating operation against the database.
pub async fn execute(
    database: &Database,
    target: &str,
    operation: &Operation,
) -> StoreResult<DocExecOutcome> {
    let coll = database.collection::<Document>(target);
    match operation {
        Operation::Insert { record } => {
            let result = coll
                .insert_one(record_to_document(record)?)
                .await
                .map_err(StoreError::from)?;
            Ok(DocExecOutcome {
                rows_affected: 1,
                inserted_id: Some(bson_to_json(result.inserted_id)),
            })
        }
        Operation::Update { filter, changes } => {
            let update = doc! { "$set": record_to_document(changes)? };
            let result = coll
                .update_many(filter_to_document(filter)?, update)
                .await
                .map_err(StoreError::from)?;
            Ok(DocExecOutcome {
                rows_affected: result.modified_count,
                inserted_id: None,
            })
        }
        Operation::Delete { filter } => {
            let result = coll
                .delete_many(filter_to_document(filter)?)
                .await
                .map_err(StoreError::from)?;
            Ok(DocExecOutcome {
                rows_affected: result.deleted_count,
                inserted_id: None,
            })
        }
        Operation::Sql { .. } => Err(StoreError::invalid_input(
            "Raw SQL operations are not supported on the document backend",
        )),
    }
}

/// Session variant of [`execute`].
pub async fn execute_in_session(
    database: &Database,
    session: &mut ClientSession,
    target: &str,
    operation: &Operation,
) -> StoreResult<DocExecOutcome> {
    let coll = database.collection::<Document>(target);
    match operation {
        Operation::Insert { record } => {
            let result = coll
                .insert_one(record_to_document(record)?)
                .session(&mut *session)
                .await
                .map_err(StoreError::from)?;
            Ok(DocExecOutcome {
                rows_affected: 1,
                inserted_id: Some(bson_to_json(result.inserted_id)),
            })
        }
        Operation::Update { filter, changes } => {
            let update = doc! { "$set": record_to_document(changes)? };
            let result = coll
                .update_many(filter_to_document(filter)?, update)
                .session(&mut *session)
                .await
                .map_err(StoreError::from)?;
            Ok(DocExecOutcome {
                rows_affected: result.modified_count,
                inserted_id: None,
            })
        }
        Operation::Delete { filter } => {
            let result = coll
                .delete_many(filter_to_document(filter)?)
                .session(&mut *session)
                .await
                .map_err(StoreError::from)?;
            Ok(DocExecOutcome {
                rows_affected: result.deleted_count,
                inserted_id: None,
            })
        }
        Operation::Sql { .. } => Err(StoreError::invalid_input(
            "Raw SQL operations are not supported on the document backend",
        )),
    }
}
