//! Rule evaluation pipeline.
//!
//! Per-field order: the `when` gate and presence checks short-circuit the
//! rest of that field's rules; every other category evaluates independently
//! so all applicable violations are reported in one pass. Coercions mutate
//! the candidate record before later rules run, and the mutated value is what
//! gets persisted.
//!
//! Store-backed rules (`unique`, `exists`, `not_exists`, `compare_value` with
//! a target model, `async_custom`) run through the context's session when one
//! is open, so their reads observe the pending write's snapshot. A context
//! without an adapter skips them. Rules that reference an absent field
//! (`compare_value`, `equals`, custom comparisons against missing targets)
//! are skipped rather than treated as failures.

use crate::db::adapter::Adapter;
use crate::db::session::Session;
use crate::db::types::{Filter, Query, Record};
use crate::error::{StoreError, StoreResult, Violation};
use crate::validate::{Check, Rule, Schema};
use serde_json::Value as JsonValue;
use tracing::debug;

/// Everything a validation pass may need beyond the candidate record.
pub struct ValidationContext<'a> {
    pub adapter: Option<&'a Adapter>,
    pub session: Option<&'a mut Session>,
    /// The model's own store; required by `unique`.
    pub collection: Option<&'a str>,
    /// Field holding a record's identity (default `"id"`).
    pub id_field: &'a str,
    /// Present only on update. Matching rows whose id string-normalizes to
    /// this value are excluded from uniqueness conflicts.
    pub instance_id: Option<String>,
    /// Requested rule groups; rules without groups always apply.
    pub groups: Vec<String>,
}

impl<'a> ValidationContext<'a> {
    pub fn new() -> Self {
        Self {
            adapter: None,
            session: None,
            collection: None,
            id_field: "id",
            instance_id: None,
            groups: Vec::new(),
        }
    }

    pub fn with_adapter(mut self, adapter: &'a Adapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_session(mut self, session: &'a mut Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn for_collection(mut self, collection: &'a str) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn with_id_field(mut self, id_field: &'a str) -> Self {
        self.id_field = id_field;
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }
}

impl Default for ValidationContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// I/O handle passed to `async_custom` rules.
pub struct RuleIo<'a> {
    pub adapter: Option<&'a Adapter>,
    pub session: Option<&'a mut Session>,
    pub collection: Option<&'a str>,
    pub instance_id: Option<&'a str>,
}

impl RuleIo<'_> {
    /// Run a lookup, through the open session when one exists. `None` means
    /// the context carries no I/O handle at all.
    pub async fn query(
        &mut self,
        collection: &str,
        query: Query,
    ) -> StoreResult<Option<Vec<Record>>> {
        if let Some(session) = self.session.as_deref_mut() {
            return session.query(collection, query).await.map(Some);
        }
        if let Some(adapter) = self.adapter {
            return adapter.query(collection, query).await.map(Some);
        }
        Ok(None)
    }
}

/// Stateless rule evaluator.
pub struct Validator;

impl Validator {
    /// Validate `record` against `schema`. Returns silently on success;
    /// otherwise fails with every violation aggregated. Coercions are applied
    /// to `record` in place.
    pub async fn validate(
        record: &mut Record,
        schema: &Schema,
        ctx: &mut ValidationContext<'_>,
    ) -> StoreResult<()> {
        let mut violations = Vec::new();

        for (field, rules) in schema.iter() {
            let active: Vec<&Rule> = rules
                .rules()
                .iter()
                .filter(|rule| rule.applies_to(&ctx.groups))
                .collect();
            if active.is_empty() {
                continue;
            }

            // Gate: skip the whole field unless the condition holds.
            if let Some(cond) = active.iter().find_map(|rule| match &rule.check {
                Check::When(cond) => Some(cond),
                _ => None,
            }) {
                if !cond.is_met(record) {
                    continue;
                }
            }

            // Presence short-circuits everything else on this field.
            let present = record.get(field).map(|v| !v.is_null()).unwrap_or(false);
            if !present {
                for rule in &active {
                    match &rule.check {
                        Check::Required => {
                            violations.push(make_violation(field, rule, "is required".to_string()));
                        }
                        Check::RequiredWhen(cond) if cond.is_met(record) => {
                            violations.push(make_violation(field, rule, "is required".to_string()));
                        }
                        _ => {}
                    }
                }
                continue;
            }

            apply_coercions(record, field, &active);
            let value = record.get(field).cloned().unwrap_or(JsonValue::Null);

            // Everything past presence/coercion evaluates independently, in
            // category order.
            let mut ordered: Vec<&Rule> = active
                .iter()
                .copied()
                .filter(|rule| {
                    let stage = rule.check.stage();
                    stage == 2 || stage >= 4
                })
                .collect();
            ordered.sort_by_key(|rule| rule.check.stage());

            for rule in ordered {
                Self::eval_rule(field, rule, &value, record, ctx, &mut violations).await?;
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            debug!(count = violations.len(), "Validation failed");
            Err(StoreError::validation(violations))
        }
    }

    async fn eval_rule(
        field: &str,
        rule: &Rule,
        value: &JsonValue,
        record: &Record,
        ctx: &mut ValidationContext<'_>,
        out: &mut Vec<Violation>,
    ) -> StoreResult<()> {
        match &rule.check {
            // Handled by the gate/presence/coercion phases.
            Check::When(_)
            | Check::Required
            | Check::RequiredWhen(_)
            | Check::Trim
            | Check::Lowercase
            | Check::Uppercase => {}

            Check::Type(expected) => {
                if !expected.matches(value) {
                    out.push(make_violation(
                        field,
                        rule,
                        format!("must be of type {}", expected.as_str()),
                    ));
                }
            }

            Check::Min(min) => {
                if let Some(size) = magnitude(value) {
                    if size < *min {
                        out.push(make_violation(field, rule, format!("must be at least {}", min)));
                    }
                }
            }
            Check::Max(max) => {
                if let Some(size) = magnitude(value) {
                    if size > *max {
                        out.push(make_violation(field, rule, format!("must be at most {}", max)));
                    }
                }
            }
            Check::Range(min, max) => {
                if let Some(size) = magnitude(value) {
                    if size < *min || size > *max {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must be between {} and {}", min, max),
                        ));
                    }
                }
            }
            Check::Integer => {
                if let Some(n) = value.as_f64() {
                    if n.fract() != 0.0 {
                        out.push(make_violation(field, rule, "must be an integer".to_string()));
                    }
                }
            }
            Check::Positive => {
                if let Some(n) = value.as_f64() {
                    if n <= 0.0 {
                        out.push(make_violation(field, rule, "must be positive".to_string()));
                    }
                }
            }
            Check::Negative => {
                if let Some(n) = value.as_f64() {
                    if n >= 0.0 {
                        out.push(make_violation(field, rule, "must be negative".to_string()));
                    }
                }
            }
            Check::MultipleOf(base) => {
                if let Some(n) = value.as_f64() {
                    let remainder = (n % base).abs();
                    if remainder > 1e-9 && (base.abs() - remainder) > 1e-9 {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must be a multiple of {}", base),
                        ));
                    }
                }
            }

            Check::Pattern(pattern) => {
                if let Some(s) = value.as_str() {
                    if !pattern.is_match(s) {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must match pattern {}", pattern.as_str()),
                        ));
                    }
                }
            }
            Check::Alphanumeric => {
                if let Some(s) = value.as_str() {
                    if s.is_empty() || !s.chars().all(|c| c.is_alphanumeric()) {
                        out.push(make_violation(field, rule, "must be alphanumeric".to_string()));
                    }
                }
            }
            Check::Numeric => {
                if let Some(s) = value.as_str() {
                    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
                        out.push(make_violation(
                            field,
                            rule,
                            "must contain only digits".to_string(),
                        ));
                    }
                }
            }
            Check::Alpha => {
                if let Some(s) = value.as_str() {
                    if s.is_empty() || !s.chars().all(|c| c.is_alphabetic()) {
                        out.push(make_violation(
                            field,
                            rule,
                            "must contain only letters".to_string(),
                        ));
                    }
                }
            }
            Check::LowercaseOnly => {
                if let Some(s) = value.as_str() {
                    if s != s.to_lowercase() {
                        out.push(make_violation(field, rule, "must be lowercase".to_string()));
                    }
                }
            }
            Check::UppercaseOnly => {
                if let Some(s) = value.as_str() {
                    if s != s.to_uppercase() {
                        out.push(make_violation(field, rule, "must be uppercase".to_string()));
                    }
                }
            }
            Check::StartsWith(prefix) => {
                if let Some(s) = value.as_str() {
                    if !s.starts_with(prefix.as_str()) {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must start with '{}'", prefix),
                        ));
                    }
                }
            }
            Check::EndsWith(suffix) => {
                if let Some(s) = value.as_str() {
                    if !s.ends_with(suffix.as_str()) {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must end with '{}'", suffix),
                        ));
                    }
                }
            }
            Check::Contains(needle) => {
                if let Some(s) = value.as_str() {
                    if !s.contains(needle.as_str()) {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must contain '{}'", needle),
                        ));
                    }
                }
            }
            Check::Format(format) => {
                if let Some(s) = value.as_str() {
                    if !format.matches(s) {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must be a valid {}", format),
                        ));
                    }
                }
            }

            Check::Before(limit) => {
                if let Some(date) = parse_date(value) {
                    if date >= *limit {
                        out.push(make_violation(field, rule, format!("must be before {}", limit)));
                    }
                }
            }
            Check::After(limit) => {
                if let Some(date) = parse_date(value) {
                    if date <= *limit {
                        out.push(make_violation(field, rule, format!("must be after {}", limit)));
                    }
                }
            }
            Check::BeforeTime(limit) => {
                if let Some(time) = parse_time(value) {
                    if time >= *limit {
                        out.push(make_violation(field, rule, format!("must be before {}", limit)));
                    }
                }
            }
            Check::AfterTime(limit) => {
                if let Some(time) = parse_time(value) {
                    if time <= *limit {
                        out.push(make_violation(field, rule, format!("must be after {}", limit)));
                    }
                }
            }

            Check::OneOf(allowed) => {
                if !allowed.contains(value) {
                    out.push(make_violation(
                        field,
                        rule,
                        "must be one of the allowed values".to_string(),
                    ));
                }
            }

            Check::EqualsField(other) => {
                if let Some(target) = record.get(other.as_str()) {
                    if value != target {
                        out.push(make_violation(field, rule, format!("must equal {}", other)));
                    }
                }
            }
            Check::NotEqualsField(other) => {
                if let Some(target) = record.get(other.as_str()) {
                    if value == target {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must not equal {}", other),
                        ));
                    }
                }
            }
            Check::Compare(check) | Check::Custom(check) => match check.call(value, record) {
                super::CheckOutcome::Pass => {}
                super::CheckOutcome::Fail(message) => {
                    out.push(make_violation(field, rule, message));
                }
            },

            Check::CompareValue(cv) => {
                let target = match &cv.target_model {
                    Some(model) => {
                        let filter = cv.filter.clone().unwrap_or_default();
                        match lookup(ctx, model, filter, Some(1)).await? {
                            Some(rows) => rows
                                .into_iter()
                                .next()
                                .and_then(|row| row.get(cv.target_field.as_str()).cloned()),
                            // No adapter on the context; nothing to compare.
                            None => return Ok(()),
                        }
                    }
                    None => record.get(cv.target_field.as_str()).cloned(),
                };
                // Absent or null reference values skip the rule.
                let Some(target) = target else { return Ok(()) };
                if target.is_null() {
                    return Ok(());
                }
                if cv.compare.compare_json(value, &target) == Some(false) {
                    out.push(make_violation(
                        field,
                        rule,
                        format!("must be {} {}", cv.compare.sql_op(), target),
                    ));
                }
            }

            Check::Unique => {
                let Some(collection) = ctx.collection else {
                    return Ok(());
                };
                let id_field = ctx.id_field;
                let filter = Filter::where_eq(field, value.clone());
                let rows = match lookup(ctx, collection, filter, None).await? {
                    Some(rows) => rows,
                    None => return Ok(()),
                };
                let conflict = rows.iter().any(|row| {
                    match (row.get(id_field), &ctx.instance_id) {
                        // The record being updated may keep its own value.
                        (Some(id), Some(instance)) => normalize_id(id) != *instance,
                        _ => true,
                    }
                });
                if conflict {
                    out.push(make_violation(field, rule, "value already exists".to_string()));
                }
            }

            Check::Exists(related) => {
                let filter = related
                    .filter
                    .clone()
                    .unwrap_or_default()
                    .merge(Filter::where_eq(related.field.as_str(), value.clone()));
                if let Some(rows) = lookup(ctx, &related.collection, filter, Some(1)).await? {
                    if rows.is_empty() {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("no matching record in {}", related.collection),
                        ));
                    }
                }
            }
            Check::NotExists(related) => {
                let filter = related
                    .filter
                    .clone()
                    .unwrap_or_default()
                    .merge(Filter::where_eq(related.field.as_str(), value.clone()));
                if let Some(rows) = lookup(ctx, &related.collection, filter, Some(1)).await? {
                    if !rows.is_empty() {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("a matching record already exists in {}", related.collection),
                        ));
                    }
                }
            }

            Check::Array(array_rule) => {
                let Some(items) = value.as_array() else {
                    return Ok(());
                };
                if let Some(min) = array_rule.min {
                    if items.len() < min {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must contain at least {} item(s)", min),
                        ));
                    }
                }
                if let Some(max) = array_rule.max {
                    if items.len() > max {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("must contain at most {} item(s)", max),
                        ));
                    }
                }
                if array_rule.unique_items {
                    let mut seen: Vec<&JsonValue> = Vec::with_capacity(items.len());
                    for item in items {
                        if seen.contains(&item) {
                            out.push(make_violation(
                                field,
                                rule,
                                "items must be unique".to_string(),
                            ));
                            break;
                        }
                        seen.push(item);
                    }
                }
                if let Some(item_type) = array_rule.item_type {
                    if let Some(index) = items.iter().position(|item| !item_type.matches(item)) {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("item {} must be of type {}", index, item_type.as_str()),
                        ));
                    }
                }
                if let Some(item_min) = array_rule.item_min {
                    if let Some(index) = items
                        .iter()
                        .position(|item| magnitude(item).map(|m| m < item_min).unwrap_or(false))
                    {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("item {} must be at least {}", index, item_min),
                        ));
                    }
                }
                if let Some(item_max) = array_rule.item_max {
                    if let Some(index) = items
                        .iter()
                        .position(|item| magnitude(item).map(|m| m > item_max).unwrap_or(false))
                    {
                        out.push(make_violation(
                            field,
                            rule,
                            format!("item {} must be at most {}", index, item_max),
                        ));
                    }
                }
            }

            Check::PasswordStrength(ps) => {
                let Some(s) = value.as_str() else {
                    return Ok(());
                };
                if s.chars().count() < ps.min_length {
                    out.push(make_violation(
                        field,
                        rule,
                        format!("must be at least {} characters", ps.min_length),
                    ));
                }
                if ps.require_uppercase && !s.chars().any(|c| c.is_uppercase()) {
                    out.push(make_violation(
                        field,
                        rule,
                        "must contain an uppercase letter".to_string(),
                    ));
                }
                if ps.require_lowercase && !s.chars().any(|c| c.is_lowercase()) {
                    out.push(make_violation(
                        field,
                        rule,
                        "must contain a lowercase letter".to_string(),
                    ));
                }
                if ps.require_numbers && !s.chars().any(|c| c.is_ascii_digit()) {
                    out.push(make_violation(field, rule, "must contain a number".to_string()));
                }
                if ps.require_symbols && !s.chars().any(|c| !c.is_alphanumeric()) {
                    out.push(make_violation(field, rule, "must contain a symbol".to_string()));
                }
            }

            Check::AsyncCustom(check) => {
                let io = RuleIo {
                    adapter: ctx.adapter,
                    session: ctx.session.as_deref_mut(),
                    collection: ctx.collection,
                    instance_id: ctx.instance_id.as_deref(),
                };
                match check.call(value, record, io).await {
                    super::CheckOutcome::Pass => {}
                    super::CheckOutcome::Fail(message) => {
                        out.push(make_violation(field, rule, message));
                    }
                }
            }
        }
        Ok(())
    }
}

async fn lookup(
    ctx: &mut ValidationContext<'_>,
    collection: &str,
    filter: Filter,
    limit: Option<u32>,
) -> StoreResult<Option<Vec<Record>>> {
    let query = Query::Filter { filter, limit };
    if let Some(session) = ctx.session.as_deref_mut() {
        return session.query(collection, query).await.map(Some);
    }
    if let Some(adapter) = ctx.adapter {
        return adapter.query(collection, query).await.map(Some);
    }
    Ok(None)
}

fn make_violation(field: &str, rule: &Rule, default_message: String) -> Violation {
    Violation::new(
        field,
        rule.check.rule_name(),
        rule.message.clone().unwrap_or(default_message),
    )
}

fn apply_coercions(record: &mut Record, field: &str, rules: &[&Rule]) {
    let Some(JsonValue::String(current)) = record.get(field) else {
        return;
    };
    let mut coerced = current.clone();
    for rule in rules {
        match rule.check {
            Check::Trim => coerced = coerced.trim().to_string(),
            Check::Lowercase => coerced = coerced.to_lowercase(),
            Check::Uppercase => coerced = coerced.to_uppercase(),
            _ => {}
        }
    }
    if &coerced != current {
        record.insert(field.to_string(), JsonValue::String(coerced));
    }
}

/// Size of a value for min/max/range: numeric value, string char count, or
/// array length.
fn magnitude(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => Some(s.chars().count() as f64),
        JsonValue::Array(items) => Some(items.len() as f64),
        _ => None,
    }
}

fn parse_date(value: &JsonValue) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value.as_str()?, "%Y-%m-%d").ok()
}

fn parse_time(value: &JsonValue) -> Option<chrono::NaiveTime> {
    let s = value.as_str()?;
    chrono::NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| chrono::NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// String-normalize an id for instance comparisons.
pub(crate) fn normalize_id(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{FieldRules, Format};
    use serde_json::json;

    fn record(pairs: &[(&str, JsonValue)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    async fn run(record: &mut Record, schema: &Schema) -> StoreResult<()> {
        let mut ctx = ValidationContext::new();
        Validator::validate(record, schema, &mut ctx).await
    }

    #[tokio::test]
    async fn test_email_format_example() {
        let schema = Schema::new().field(
            "email",
            FieldRules::new().required().format(Format::Email),
        );

        let mut bad = record(&[("email", json!("bad"))]);
        let err = run(&mut bad, &schema).await.unwrap_err();
        let violations = err.violations().unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "email");
        assert_eq!(violations[0].rule, "format");

        let mut good = record(&[("email", json!("a@b.com"))]);
        run(&mut good, &schema).await.unwrap();
    }

    #[tokio::test]
    async fn test_violations_aggregate_across_rules() {
        let schema = Schema::new().field(
            "code",
            FieldRules::new().min(5.0).numeric().starts_with("A"),
        );
        let mut rec = record(&[("code", json!("zz"))]);
        let err = run(&mut rec, &schema).await.unwrap_err();
        let rules: Vec<&str> = err
            .violations()
            .unwrap()
            .iter()
            .map(|v| v.rule.as_str())
            .collect();
        assert_eq!(rules, vec!["min", "numeric", "starts_with"]);
    }

    #[tokio::test]
    async fn test_coercions_run_before_rules_and_persist() {
        let schema = Schema::new().field(
            "username",
            FieldRules::new().trim().to_lowercase().lowercase_only(),
        );
        let mut rec = record(&[("username", json!("  Ada "))]);
        run(&mut rec, &schema).await.unwrap();
        assert_eq!(rec.get("username"), Some(&json!("ada")));
    }

    #[tokio::test]
    async fn test_when_gate_skips_field() {
        let schema = Schema::new().field(
            "discount_code",
            FieldRules::new().when("has_discount", true).required(),
        );

        let mut off = record(&[("has_discount", json!(false))]);
        run(&mut off, &schema).await.unwrap();

        let mut on = record(&[("has_discount", json!(true))]);
        let err = run(&mut on, &schema).await.unwrap_err();
        assert_eq!(err.violations().unwrap()[0].rule, "required");
    }

    #[tokio::test]
    async fn test_compare_value_same_record() {
        let schema = Schema::new().field(
            "score",
            FieldRules::new().compare_value(crate::validate::CompareValueRule::same_record(
                "age",
                crate::db::types::Comparison::Gte,
            )),
        );

        let mut low = record(&[("age", json!(30)), ("score", json!(20))]);
        let err = run(&mut low, &schema).await.unwrap_err();
        assert_eq!(err.violations().unwrap()[0].rule, "compare_value");

        let mut equal = record(&[("age", json!(30)), ("score", json!(30))]);
        run(&mut equal, &schema).await.unwrap();

        // Absent reference field: rule is skipped, not a failure.
        let mut missing = record(&[("score", json!(20))]);
        run(&mut missing, &schema).await.unwrap();
    }

    #[tokio::test]
    async fn test_group_restriction() {
        let schema = Schema::new().field(
            "password",
            FieldRules::new().required().for_groups(&["create"]),
        );

        let mut empty = Record::new();
        let mut create_ctx = ValidationContext::new().with_groups(&["create"]);
        assert!(
            Validator::validate(&mut empty, &schema, &mut create_ctx)
                .await
                .is_err()
        );

        let mut update_ctx = ValidationContext::new().with_groups(&["update"]);
        Validator::validate(&mut empty, &schema, &mut update_ctx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unique_without_adapter_skips() {
        let schema = Schema::new().field("email", FieldRules::new().unique());
        let mut rec = record(&[("email", json!("a@b.com"))]);
        let mut ctx = ValidationContext::new().for_collection("users");
        Validator::validate(&mut rec, &schema, &mut ctx).await.unwrap();
    }

    #[test]
    fn test_magnitude() {
        assert_eq!(magnitude(&json!(3)), Some(3.0));
        assert_eq!(magnitude(&json!("abc")), Some(3.0));
        assert_eq!(magnitude(&json!([1, 2])), Some(2.0));
        assert_eq!(magnitude(&json!(true)), None);
    }
}
