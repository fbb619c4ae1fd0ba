//! Model layer: schema + adapter + collection binding.
//!
//! A model is a plain configuration struct bound to a store name through a
//! builder - no inheritance. It enforces validate-before-write: `create` and
//! `update` only reach [`Adapter::execute`] after a clean validation pass,
//! and the session variants route both the validation reads and the write
//! through the same open session.

use crate::db::adapter::Adapter;
use crate::db::session::Session;
use crate::db::types::{ExecResult, Filter, Operation, Query, Record};
use crate::error::{StoreError, StoreResult};
use crate::validate::engine::normalize_id;
use crate::validate::{GROUP_CREATE, GROUP_UPDATE, Schema, ValidationContext, Validator};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

type ComputeFn = dyn Fn(&Record) -> JsonValue + Send + Sync;

/// A derived field computed on the way out of the store.
#[derive(Clone)]
pub struct VirtualField {
    pub name: String,
    func: Arc<ComputeFn>,
}

impl VirtualField {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Record) -> JsonValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl std::fmt::Debug for VirtualField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualField").field("name", &self.name).finish()
    }
}

/// Plain model configuration: collection/table name, schema, identity field,
/// virtual-field computers, and named scope predicates.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub collection: String,
    pub schema: Schema,
    pub id_field: String,
    /// Generate a UUID for the id field when a create omits it. Off by
    /// default so SQL auto-increment columns keep working.
    pub generate_ids: bool,
    virtuals: Vec<VirtualField>,
    scopes: HashMap<String, Filter>,
}

/// Fluent binding of a [`ModelConfig`] to an adapter.
#[derive(Debug)]
pub struct ModelBuilder {
    config: ModelConfig,
}

impl ModelBuilder {
    fn new(collection: impl Into<String>) -> Self {
        Self {
            config: ModelConfig {
                collection: collection.into(),
                schema: Schema::new(),
                id_field: "id".to_string(),
                generate_ids: false,
                virtuals: Vec::new(),
                scopes: HashMap::new(),
            },
        }
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.config.schema = schema;
        self
    }

    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.config.id_field = id_field.into();
        self
    }

    pub fn generate_ids(mut self) -> Self {
        self.config.generate_ids = true;
        self
    }

    pub fn virtual_field<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Record) -> JsonValue + Send + Sync + 'static,
    {
        self.config.virtuals.push(VirtualField::new(name, func));
        self
    }

    pub fn scope(mut self, name: impl Into<String>, filter: Filter) -> Self {
        self.config.scopes.insert(name.into(), filter);
        self
    }

    pub fn build(self, adapter: Arc<Adapter>) -> Model {
        Model {
            config: Arc::new(self.config),
            adapter,
        }
    }
}

/// A schema-validated view over one collection/table.
#[derive(Debug, Clone)]
pub struct Model {
    config: Arc<ModelConfig>,
    adapter: Arc<Adapter>,
}

impl Model {
    pub fn builder(collection: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(collection)
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<Adapter> {
        &self.adapter
    }

    /// Validate a candidate record under the given groups without writing.
    /// Coercions are applied to the record in place.
    pub async fn validate(&self, record: &mut Record, groups: &[&str]) -> StoreResult<()> {
        let mut ctx = ValidationContext::new()
            .with_adapter(&self.adapter)
            .for_collection(&self.config.collection)
            .with_id_field(&self.config.id_field)
            .with_groups(groups);
        Validator::validate(record, &self.config.schema, &mut ctx).await
    }

    /// Validate (group `create`) and insert. Schema defaults fill missing
    /// fields first; the returned record carries coercions and any
    /// backend-generated id.
    pub async fn create(&self, mut record: Record) -> StoreResult<Record> {
        self.apply_defaults(&mut record);
        self.prepare_id(&mut record);
        self.validate(&mut record, &[GROUP_CREATE]).await?;

        let result = self
            .adapter
            .execute(
                &self.config.collection,
                Operation::Insert {
                    record: record.clone(),
                },
            )
            .await?;
        self.absorb_inserted_id(&mut record, result);
        Ok(record)
    }

    /// Session variant of [`Model::create`]: validation reads and the insert
    /// run through the open session.
    pub async fn create_in(&self, session: &mut Session, mut record: Record) -> StoreResult<Record> {
        self.apply_defaults(&mut record);
        self.prepare_id(&mut record);
        {
            let mut ctx = ValidationContext::new()
                .with_adapter(&self.adapter)
                .with_session(&mut *session)
                .for_collection(&self.config.collection)
                .with_id_field(&self.config.id_field)
                .with_groups(&[GROUP_CREATE]);
            Validator::validate(&mut record, &self.config.schema, &mut ctx).await?;
        }

        let result = session
            .execute(
                &self.config.collection,
                Operation::Insert {
                    record: record.clone(),
                },
            )
            .await?;
        self.absorb_inserted_id(&mut record, result);
        Ok(record)
    }

    /// Validate (group `update`, uniqueness excluding this instance) and
    /// update the record whose id equals `id`.
    pub async fn update(
        &self,
        id: impl Into<JsonValue>,
        mut changes: Record,
    ) -> StoreResult<ExecResult> {
        let id = id.into();
        let mut ctx = ValidationContext::new()
            .with_adapter(&self.adapter)
            .for_collection(&self.config.collection)
            .with_id_field(&self.config.id_field)
            .with_instance_id(normalize_id(&id))
            .with_groups(&[GROUP_UPDATE]);
        Validator::validate(&mut changes, &self.config.schema, &mut ctx).await?;

        self.adapter
            .execute(
                &self.config.collection,
                Operation::Update {
                    filter: Filter::where_eq(self.config.id_field.as_str(), id),
                    changes,
                },
            )
            .await
    }

    /// Session variant of [`Model::update`].
    pub async fn update_in(
        &self,
        session: &mut Session,
        id: impl Into<JsonValue>,
        mut changes: Record,
    ) -> StoreResult<ExecResult> {
        let id = id.into();
        {
            let mut ctx = ValidationContext::new()
                .with_adapter(&self.adapter)
                .with_session(&mut *session)
                .for_collection(&self.config.collection)
                .with_id_field(&self.config.id_field)
                .with_instance_id(normalize_id(&id))
                .with_groups(&[GROUP_UPDATE]);
            Validator::validate(&mut changes, &self.config.schema, &mut ctx).await?;
        }

        session
            .execute(
                &self.config.collection,
                Operation::Update {
                    filter: Filter::where_eq(self.config.id_field.as_str(), id),
                    changes,
                },
            )
            .await
    }

    /// Read matching records with virtual fields computed.
    pub async fn find(&self, filter: Filter) -> StoreResult<Vec<Record>> {
        let mut rows = self
            .adapter
            .query(&self.config.collection, Query::filter(filter))
            .await?;
        for row in &mut rows {
            self.apply_virtuals(row);
        }
        Ok(rows)
    }

    /// Read through a named scope, merged with the caller's filter.
    pub async fn find_scope(&self, scope: &str, filter: Filter) -> StoreResult<Vec<Record>> {
        let base = self.config.scopes.get(scope).ok_or_else(|| {
            StoreError::invalid_input(format!(
                "Unknown scope '{}' on model '{}'",
                scope, self.config.collection
            ))
        })?;
        self.find(base.clone().merge(filter)).await
    }

    /// Delete matching records.
    pub async fn delete(&self, filter: Filter) -> StoreResult<ExecResult> {
        self.adapter
            .execute(&self.config.collection, Operation::Delete { filter })
            .await
    }

    fn apply_defaults(&self, record: &mut Record) {
        for (name, rules) in self.config.schema.iter() {
            if let Some(default) = rules.default_value() {
                record.entry(name.to_string()).or_insert(default.clone());
            }
        }
    }

    fn prepare_id(&self, record: &mut Record) {
        if self.config.generate_ids && !record.contains_key(&self.config.id_field) {
            record.insert(
                self.config.id_field.clone(),
                JsonValue::String(uuid::Uuid::new_v4().to_string()),
            );
        }
    }

    fn absorb_inserted_id(&self, record: &mut Record, result: ExecResult) {
        if let Some(id) = result.inserted_id {
            record
                .entry(self.config.id_field.clone())
                .or_insert(id);
        }
    }

    fn apply_virtuals(&self, row: &mut Record) {
        for virtual_field in &self.config.virtuals {
            let value = (virtual_field.func)(&*row);
            row.insert(virtual_field.name.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::FieldRules;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let builder = Model::builder("users");
        assert_eq!(builder.config.collection, "users");
        assert_eq!(builder.config.id_field, "id");
        assert!(!builder.config.generate_ids);
    }

    #[test]
    fn test_builder_configures_schema_and_scopes() {
        let builder = Model::builder("users")
            .schema(Schema::new().field("email", FieldRules::new().required()))
            .id_field("user_id")
            .generate_ids()
            .scope("active", Filter::where_eq("active", true))
            .virtual_field("display", |record| {
                json!(format!(
                    "{}",
                    record.get("email").and_then(|v| v.as_str()).unwrap_or("?")
                ))
            });

        assert_eq!(builder.config.id_field, "user_id");
        assert!(builder.config.generate_ids);
        assert_eq!(builder.config.schema.len(), 1);
        assert!(builder.config.scopes.contains_key("active"));
        assert_eq!(builder.config.virtuals.len(), 1);
    }
}
