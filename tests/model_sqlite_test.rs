//! Model-layer tests against on-disk SQLite: validate-before-write, store-
//! backed rules, session flows, virtuals and scopes.

use polystore::db::{Comparison, Filter, Operation, Query, Record};
use polystore::validate::{CheckOutcome, CompareValueRule, FieldRules, Format, RelatedLookup, Schema};
use polystore::{Adapter, ConnectionConfig, Model, StoreError};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

async fn connect_temp() -> (tempfile::TempDir, Arc<Adapter>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite:{}/test.db", dir.path().display());
    let adapter = Adapter::connect(ConnectionConfig::from_url(&url).unwrap())
        .await
        .expect("connect sqlite");
    (dir, Arc::new(adapter))
}

async fn run_ddl(adapter: &Adapter, sql: &str) {
    adapter
        .execute(
            "schema",
            Operation::Sql {
                sql: sql.to_string(),
                params: vec![],
            },
        )
        .await
        .expect("ddl");
}

fn record(pairs: &[(&str, JsonValue)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn users_model(adapter: Arc<Adapter>) -> Model {
    Model::builder("users")
        .schema(
            Schema::new()
                .field(
                    "email",
                    FieldRules::new()
                        .required()
                        .for_groups(&["create"])
                        .trim()
                        .to_lowercase()
                        .format(Format::Email)
                        .unique(),
                )
                .field("name", FieldRules::new().min(2.0)),
        )
        .build(adapter)
}

#[tokio::test]
async fn failing_validation_issues_no_write() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(&adapter, "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, name TEXT)").await;
    let users = users_model(adapter.clone());

    let err = users
        .create(record(&[("email", json!("not-an-email"))]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation { .. }));

    let rows = adapter
        .query("users", Query::filter(Filter::new()))
        .await
        .unwrap();
    assert!(rows.is_empty(), "a rejected record must never be written");
}

#[tokio::test]
async fn create_applies_coercions_and_returns_generated_id() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(&adapter, "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, name TEXT)").await;
    let users = users_model(adapter.clone());

    let created = users
        .create(record(&[("email", json!("  Ada@Example.com ")), ("name", json!("Ada"))]))
        .await
        .unwrap();
    assert_eq!(created.get("email"), Some(&json!("ada@example.com")));
    assert_eq!(created.get("id"), Some(&json!(1)));

    let rows = users.find(Filter::where_eq("email", "ada@example.com")).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn unique_rejects_duplicates_but_not_self() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(&adapter, "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, name TEXT)").await;
    let users = users_model(adapter.clone());

    users
        .create(record(&[("email", json!("ada@example.com"))]))
        .await
        .unwrap();
    users
        .create(record(&[("email", json!("grace@example.com"))]))
        .await
        .unwrap();

    // A second record with the same value fails.
    let err = users
        .create(record(&[("email", json!("ada@example.com"))]))
        .await
        .unwrap_err();
    assert_eq!(err.violations().unwrap()[0].rule, "unique");

    // Updating record 1 with its own unchanged value passes.
    let result = users
        .update(1, record(&[("email", json!("ada@example.com"))]))
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 1);

    // Updating record 2 to record 1's value fails.
    let err = users
        .update(2, record(&[("email", json!("ada@example.com"))]))
        .await
        .unwrap_err();
    assert_eq!(err.violations().unwrap()[0].rule, "unique");
}

#[tokio::test]
async fn exists_and_not_exists_lookups() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(&adapter, "CREATE TABLE teams (id INTEGER PRIMARY KEY, name TEXT)").await;
    run_ddl(
        &adapter,
        "CREATE TABLE members (id INTEGER PRIMARY KEY, team_id INTEGER, handle TEXT)",
    )
    .await;
    run_ddl(&adapter, "CREATE TABLE banned (id INTEGER PRIMARY KEY, handle TEXT)").await;

    adapter
        .execute("teams", Operation::Insert { record: record(&[("id", json!(7)), ("name", json!("core"))]) })
        .await
        .unwrap();
    adapter
        .execute("banned", Operation::Insert { record: record(&[("handle", json!("spammer"))]) })
        .await
        .unwrap();

    let members = Model::builder("members")
        .schema(
            Schema::new()
                .field(
                    "team_id",
                    FieldRules::new().required().exists(RelatedLookup::new("teams", "id")),
                )
                .field(
                    "handle",
                    FieldRules::new().not_exists(RelatedLookup::new("banned", "handle")),
                ),
        )
        .build(adapter.clone());

    // Referenced team exists, handle is clean.
    members
        .create(record(&[("team_id", json!(7)), ("handle", json!("ada"))]))
        .await
        .unwrap();

    // Missing foreign row.
    let err = members
        .create(record(&[("team_id", json!(99)), ("handle", json!("ada"))]))
        .await
        .unwrap_err();
    assert_eq!(err.violations().unwrap()[0].rule, "exists");

    // Banned handle.
    let err = members
        .create(record(&[("team_id", json!(7)), ("handle", json!("spammer"))]))
        .await
        .unwrap_err();
    assert_eq!(err.violations().unwrap()[0].rule, "not_exists");
}

#[tokio::test]
async fn compare_value_against_another_model() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(
        &adapter,
        "CREATE TABLE auctions (id INTEGER PRIMARY KEY, min_bid INTEGER)",
    )
    .await;
    run_ddl(&adapter, "CREATE TABLE bids (id INTEGER PRIMARY KEY, amount INTEGER)").await;
    adapter
        .execute(
            "auctions",
            Operation::Insert { record: record(&[("id", json!(1)), ("min_bid", json!(100))]) },
        )
        .await
        .unwrap();

    let bids = Model::builder("bids")
        .schema(Schema::new().field(
            "amount",
            FieldRules::new().required().compare_value(
                CompareValueRule::against_model("auctions", "min_bid", Comparison::Gte)
                    .with_filter(Filter::where_eq("id", 1)),
            ),
        ))
        .build(adapter.clone());

    let err = bids
        .create(record(&[("amount", json!(50))]))
        .await
        .unwrap_err();
    assert_eq!(err.violations().unwrap()[0].rule, "compare_value");

    bids.create(record(&[("amount", json!(150))])).await.unwrap();
}

#[tokio::test]
async fn async_custom_rule_queries_through_the_context() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(&adapter, "CREATE TABLE teams (id INTEGER PRIMARY KEY, open INTEGER)").await;
    run_ddl(&adapter, "CREATE TABLE members (id INTEGER PRIMARY KEY, team_id INTEGER)").await;
    adapter
        .execute(
            "teams",
            Operation::Insert { record: record(&[("id", json!(1)), ("open", json!(0))]) },
        )
        .await
        .unwrap();

    let members = Model::builder("members")
        .schema(Schema::new().field(
            "team_id",
            FieldRules::new().async_custom("team_open", |value, _all, mut io| {
                let team_id = value.clone();
                Box::pin(async move {
                    let rows = io
                        .query("teams", Query::filter(Filter::where_eq("id", team_id)))
                        .await;
                    match rows {
                        Ok(Some(rows)) => {
                            let open = rows
                                .first()
                                .and_then(|r| r.get("open"))
                                .and_then(|v| v.as_i64())
                                .unwrap_or(0);
                            if open == 1 {
                                CheckOutcome::Pass
                            } else {
                                CheckOutcome::fail("team is not accepting members")
                            }
                        }
                        _ => CheckOutcome::Pass,
                    }
                })
            }),
        ))
        .build(adapter.clone());

    let err = members
        .create(record(&[("team_id", json!(1))]))
        .await
        .unwrap_err();
    assert_eq!(err.violations().unwrap()[0].rule, "async_custom");

    adapter
        .execute(
            "teams",
            Operation::Update {
                filter: Filter::where_eq("id", 1),
                changes: record(&[("open", json!(1))]),
            },
        )
        .await
        .unwrap();
    members.create(record(&[("team_id", json!(1))])).await.unwrap();
}

#[tokio::test]
async fn session_validation_observes_pending_writes() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(&adapter, "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, name TEXT)").await;
    let users = users_model(adapter.clone());

    // Two creates with the same email inside one session: the second one's
    // uniqueness read runs through the session and sees the first, still
    // uncommitted, insert.
    let model = users.clone();
    let err = adapter
        .transaction::<(), _>(move |session| {
            Box::pin(async move {
                model
                    .create_in(session, record(&[("email", json!("ada@example.com"))]))
                    .await?;
                model
                    .create_in(session, record(&[("email", json!("ada@example.com"))]))
                    .await?;
                Ok(())
            })
        })
        .await
        .unwrap_err();

    match err {
        StoreError::Transaction { source: Some(source), .. } => {
            assert_eq!(source.violations().unwrap()[0].rule, "unique");
        }
        other => panic!("expected transaction-wrapped validation error, got {:?}", other),
    }

    // The whole session rolled back, including the first (valid) insert.
    let rows = adapter
        .query("users", Query::filter(Filter::new()))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn update_in_session_commits_with_the_transaction() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(&adapter, "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, name TEXT)").await;
    let users = users_model(adapter.clone());
    users
        .create(record(&[("email", json!("ada@example.com")), ("name", json!("Ada"))]))
        .await
        .unwrap();

    let model = users.clone();
    adapter
        .transaction(move |session| {
            Box::pin(async move {
                model
                    .update_in(session, 1, record(&[("name", json!("Countess"))]))
                    .await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    let rows = users.find(Filter::where_eq("id", 1)).await.unwrap();
    assert_eq!(rows[0].get("name"), Some(&json!("Countess")));
}

#[tokio::test]
async fn generated_ids_fill_missing_identity() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(&adapter, "CREATE TABLE notes (id TEXT PRIMARY KEY, body TEXT)").await;

    let notes = Model::builder("notes")
        .schema(Schema::new().field("body", FieldRules::new().required()))
        .generate_ids()
        .build(adapter.clone());

    let created = notes
        .create(record(&[("body", json!("remember the milk"))]))
        .await
        .unwrap();
    let id = created.get("id").and_then(|v| v.as_str()).expect("generated id");
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn schema_defaults_fill_missing_fields_on_create() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(
        &adapter,
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT, status TEXT)",
    )
    .await;

    let posts = Model::builder("posts")
        .schema(
            Schema::new()
                .field("title", FieldRules::new().required())
                .field(
                    "status",
                    FieldRules::new()
                        .with_default("draft")
                        .one_of(vec![json!("draft"), json!("published")]),
                ),
        )
        .build(adapter.clone());

    let created = posts
        .create(record(&[("title", json!("hello"))]))
        .await
        .unwrap();
    assert_eq!(created.get("status"), Some(&json!("draft")));

    let rows = posts.find(Filter::where_eq("status", "draft")).await.unwrap();
    assert_eq!(rows.len(), 1);

    // An explicit value wins over the default and is still validated.
    let err = posts
        .create(record(&[("title", json!("x")), ("status", json!("archived"))]))
        .await
        .unwrap_err();
    assert_eq!(err.violations().unwrap()[0].rule, "enum");
}

#[tokio::test]
async fn virtual_fields_and_scopes() {
    let (_dir, adapter) = connect_temp().await;
    run_ddl(
        &adapter,
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, name TEXT, active INTEGER)",
    )
    .await;

    let users = Model::builder("users")
        .schema(Schema::new().field("email", FieldRules::new().required()))
        .scope("active", Filter::where_eq("active", 1))
        .virtual_field("label", |record| {
            json!(format!(
                "{} <{}>",
                record.get("name").and_then(|v| v.as_str()).unwrap_or("?"),
                record.get("email").and_then(|v| v.as_str()).unwrap_or("?")
            ))
        })
        .build(adapter.clone());

    users
        .create(record(&[
            ("email", json!("ada@example.com")),
            ("name", json!("Ada")),
            ("active", json!(1)),
        ]))
        .await
        .unwrap();
    users
        .create(record(&[
            ("email", json!("grace@example.com")),
            ("name", json!("Grace")),
            ("active", json!(0)),
        ]))
        .await
        .unwrap();

    let active = users.find_scope("active", Filter::new()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].get("label"), Some(&json!("Ada <ada@example.com>")));

    let err = users.find_scope("missing", Filter::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput { .. }));
}
