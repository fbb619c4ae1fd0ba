//! Declarative record validation.
//!
//! A [`Schema`] maps field names to rule sets. Rules are a closed set of
//! tagged [`Check`] variants: declarative bounds, patterns, and flags stay
//! plain data, while `compare`/`custom`/`async_custom` callbacks are named
//! closures captured at definition time so a schema remains inspectable.
//!
//! Evaluation semantics live in [`engine`]; format grammars in [`format`].

pub mod engine;
pub mod format;

pub use engine::{RuleIo, ValidationContext, Validator};
pub use format::Format;

use crate::db::types::{Comparison, Filter, Record};
use chrono::{NaiveDate, NaiveTime};
use futures_util::future::BoxFuture;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Rule group requested by create flows.
pub const GROUP_CREATE: &str = "create";
/// Rule group requested by update flows.
pub const GROUP_UPDATE: &str = "update";

/// Expected JSON shape of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    pub fn matches(&self, value: &JsonValue) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// A `{field, is}` condition gating other rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub is: JsonValue,
}

impl Condition {
    pub fn new(field: impl Into<String>, is: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            is: is.into(),
        }
    }

    /// A condition on an absent field holds only when it expects null.
    pub fn is_met(&self, record: &Record) -> bool {
        match record.get(&self.field) {
            Some(value) => *value == self.is,
            None => self.is.is_null(),
        }
    }
}

/// Relational comparison against another field, optionally resolved through
/// another model's store.
#[derive(Debug, Clone)]
pub struct CompareValueRule {
    pub target_field: String,
    pub compare: Comparison,
    /// When set, the target value comes from the first row of this store.
    pub target_model: Option<String>,
    /// Extra conditions for the target-model lookup.
    pub filter: Option<Filter>,
}

impl CompareValueRule {
    pub fn same_record(target_field: impl Into<String>, compare: Comparison) -> Self {
        Self {
            target_field: target_field.into(),
            compare,
            target_model: None,
            filter: None,
        }
    }

    pub fn against_model(
        target_model: impl Into<String>,
        target_field: impl Into<String>,
        compare: Comparison,
    ) -> Self {
        Self {
            target_field: target_field.into(),
            compare,
            target_model: Some(target_model.into()),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Cross-collection lookup for `exists`/`not_exists`. The candidate value is
/// merged into the filter as `field == value` before the query runs.
#[derive(Debug, Clone)]
pub struct RelatedLookup {
    pub collection: String,
    /// Column/field in the target collection matched against the value.
    pub field: String,
    pub filter: Option<Filter>,
}

impl RelatedLookup {
    pub fn new(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Element-level constraints for array fields.
#[derive(Debug, Clone, Default)]
pub struct ArrayRule {
    pub item_type: Option<FieldType>,
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub unique_items: bool,
    /// Per-element bound: numeric value or string length.
    pub item_min: Option<f64>,
    pub item_max: Option<f64>,
}

/// Composite password strength requirements. Every missing requirement is
/// reported as its own violation.
#[derive(Debug, Clone)]
pub struct PasswordStrength {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_symbols: bool,
}

impl Default for PasswordStrength {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_symbols: false,
        }
    }
}

/// Result of a callback rule: pass, or fail with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Pass,
    Fail(String),
}

impl CheckOutcome {
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

impl From<bool> for CheckOutcome {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Pass
        } else {
            Self::Fail("failed custom check".to_string())
        }
    }
}

type CheckFn = dyn Fn(&JsonValue, &Record) -> CheckOutcome + Send + Sync;

/// A synchronous callback rule with an inspectable name.
#[derive(Clone)]
pub struct NamedCheck {
    pub name: String,
    func: Arc<CheckFn>,
}

impl NamedCheck {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&JsonValue, &Record) -> CheckOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn call(&self, value: &JsonValue, record: &Record) -> CheckOutcome {
        (self.func)(value, record)
    }
}

impl std::fmt::Debug for NamedCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCheck").field("name", &self.name).finish()
    }
}

type AsyncCheckFn =
    dyn for<'a> Fn(&'a JsonValue, &'a Record, RuleIo<'a>) -> BoxFuture<'a, CheckOutcome>
        + Send
        + Sync;

/// An asynchronous callback rule. Receives a [`RuleIo`] handle so it can run
/// its own queries through the active adapter and session.
#[derive(Clone)]
pub struct NamedAsyncCheck {
    pub name: String,
    func: Arc<AsyncCheckFn>,
}

impl NamedAsyncCheck {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: for<'a> Fn(&'a JsonValue, &'a Record, RuleIo<'a>) -> BoxFuture<'a, CheckOutcome>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn call<'a>(
        &self,
        value: &'a JsonValue,
        record: &'a Record,
        io: RuleIo<'a>,
    ) -> BoxFuture<'a, CheckOutcome> {
        (self.func)(value, record, io)
    }
}

impl std::fmt::Debug for NamedAsyncCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedAsyncCheck")
            .field("name", &self.name)
            .finish()
    }
}

/// Closed set of validation checks.
#[derive(Debug, Clone)]
pub enum Check {
    // Gate and presence
    When(Condition),
    Required,
    RequiredWhen(Condition),
    // Type and coercions
    Type(FieldType),
    Trim,
    Lowercase,
    Uppercase,
    // Scalar constraints
    Min(f64),
    Max(f64),
    Range(f64, f64),
    Integer,
    Positive,
    Negative,
    MultipleOf(f64),
    Pattern(Regex),
    Alphanumeric,
    Numeric,
    Alpha,
    LowercaseOnly,
    UppercaseOnly,
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    Format(Format),
    Before(NaiveDate),
    After(NaiveDate),
    BeforeTime(NaiveTime),
    AfterTime(NaiveTime),
    // Enumeration
    OneOf(Vec<JsonValue>),
    // Cross-field, same record
    EqualsField(String),
    NotEqualsField(String),
    Compare(NamedCheck),
    // Cross-field relational with optional I/O
    CompareValue(CompareValueRule),
    // Store-backed
    Unique,
    Exists(RelatedLookup),
    NotExists(RelatedLookup),
    // Composite
    Array(ArrayRule),
    PasswordStrength(PasswordStrength),
    // Callbacks
    Custom(NamedCheck),
    AsyncCustom(NamedAsyncCheck),
}

impl Check {
    /// Rule identifier used in violations.
    pub fn rule_name(&self) -> &'static str {
        match self {
            Self::When(_) => "when",
            Self::Required => "required",
            Self::RequiredWhen(_) => "required_when",
            Self::Type(_) => "type",
            Self::Trim => "trim",
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Range(_, _) => "range",
            Self::Integer => "integer",
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::MultipleOf(_) => "multiple_of",
            Self::Pattern(_) => "pattern",
            Self::Alphanumeric => "alphanumeric",
            Self::Numeric => "numeric",
            Self::Alpha => "alpha",
            Self::LowercaseOnly => "lowercase",
            Self::UppercaseOnly => "uppercase",
            Self::StartsWith(_) => "starts_with",
            Self::EndsWith(_) => "ends_with",
            Self::Contains(_) => "contains",
            Self::Format(_) => "format",
            Self::Before(_) => "before",
            Self::After(_) => "after",
            Self::BeforeTime(_) => "before_time",
            Self::AfterTime(_) => "after_time",
            Self::OneOf(_) => "enum",
            Self::EqualsField(_) => "equals",
            Self::NotEqualsField(_) => "not_equals",
            Self::Compare(_) => "compare",
            Self::CompareValue(_) => "compare_value",
            Self::Unique => "unique",
            Self::Exists(_) => "exists",
            Self::NotExists(_) => "not_exists",
            Self::Array(_) => "array",
            Self::PasswordStrength(_) => "password_strength",
            Self::Custom(_) => "custom",
            Self::AsyncCustom(_) => "async_custom",
        }
    }

    /// Evaluation stage; rules run in ascending stage order per field.
    pub(crate) fn stage(&self) -> u8 {
        match self {
            Self::When(_) => 0,
            Self::Required | Self::RequiredWhen(_) => 1,
            Self::Type(_) => 2,
            Self::Trim | Self::Lowercase | Self::Uppercase => 3,
            Self::Min(_)
            | Self::Max(_)
            | Self::Range(_, _)
            | Self::Integer
            | Self::Positive
            | Self::Negative
            | Self::MultipleOf(_)
            | Self::Pattern(_)
            | Self::Alphanumeric
            | Self::Numeric
            | Self::Alpha
            | Self::LowercaseOnly
            | Self::UppercaseOnly
            | Self::StartsWith(_)
            | Self::EndsWith(_)
            | Self::Contains(_)
            | Self::Format(_)
            | Self::Before(_)
            | Self::After(_)
            | Self::BeforeTime(_)
            | Self::AfterTime(_) => 4,
            Self::OneOf(_) => 5,
            Self::EqualsField(_) | Self::NotEqualsField(_) | Self::Compare(_) => 6,
            Self::CompareValue(_) => 7,
            Self::Unique => 8,
            Self::Exists(_) | Self::NotExists(_) => 9,
            Self::Array(_) => 10,
            Self::PasswordStrength(_) => 11,
            Self::Custom(_) => 12,
            Self::AsyncCustom(_) => 13,
        }
    }
}

/// A check plus its group restriction and optional message override.
#[derive(Debug, Clone)]
pub struct Rule {
    pub check: Check,
    /// Empty means the rule applies to every validation call.
    pub groups: Vec<String>,
    pub message: Option<String>,
}

impl Rule {
    pub fn new(check: Check) -> Self {
        Self {
            check,
            groups: Vec::new(),
            message: None,
        }
    }

    /// Whether this rule applies when `requested` groups were asked for.
    pub fn applies_to(&self, requested: &[String]) -> bool {
        self.groups.is_empty() || self.groups.iter().any(|g| requested.contains(g))
    }
}

/// Ordered rule set for one field, built fluently.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    rules: Vec<Rule>,
    default: Option<JsonValue>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Value filled in by the model layer when a create omits this field.
    pub fn with_default(mut self, value: impl Into<JsonValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn default_value(&self) -> Option<&JsonValue> {
        self.default.as_ref()
    }

    fn push(mut self, check: Check) -> Self {
        self.rules.push(Rule::new(check));
        self
    }

    /// Restrict the most recently added rule to the given groups.
    pub fn for_groups(mut self, groups: &[&str]) -> Self {
        if let Some(last) = self.rules.last_mut() {
            last.groups = groups.iter().map(|g| g.to_string()).collect();
        }
        self
    }

    /// Override the violation message of the most recently added rule.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(last) = self.rules.last_mut() {
            last.message = Some(message.into());
        }
        self
    }

    // Gate and presence

    pub fn when(self, field: impl Into<String>, is: impl Into<JsonValue>) -> Self {
        self.push(Check::When(Condition::new(field, is)))
    }

    pub fn required(self) -> Self {
        self.push(Check::Required)
    }

    pub fn required_when(self, field: impl Into<String>, is: impl Into<JsonValue>) -> Self {
        self.push(Check::RequiredWhen(Condition::new(field, is)))
    }

    // Type and coercions

    pub fn of_type(self, field_type: FieldType) -> Self {
        self.push(Check::Type(field_type))
    }

    pub fn trim(self) -> Self {
        self.push(Check::Trim)
    }

    pub fn to_lowercase(self) -> Self {
        self.push(Check::Lowercase)
    }

    pub fn to_uppercase(self) -> Self {
        self.push(Check::Uppercase)
    }

    // Scalar constraints

    pub fn min(self, min: f64) -> Self {
        self.push(Check::Min(min))
    }

    pub fn max(self, max: f64) -> Self {
        self.push(Check::Max(max))
    }

    pub fn range(self, min: f64, max: f64) -> Self {
        self.push(Check::Range(min, max))
    }

    pub fn integer(self) -> Self {
        self.push(Check::Integer)
    }

    pub fn positive(self) -> Self {
        self.push(Check::Positive)
    }

    pub fn negative(self) -> Self {
        self.push(Check::Negative)
    }

    pub fn multiple_of(self, base: f64) -> Self {
        self.push(Check::MultipleOf(base))
    }

    pub fn pattern(self, pattern: Regex) -> Self {
        self.push(Check::Pattern(pattern))
    }

    pub fn alphanumeric(self) -> Self {
        self.push(Check::Alphanumeric)
    }

    pub fn numeric(self) -> Self {
        self.push(Check::Numeric)
    }

    pub fn alpha(self) -> Self {
        self.push(Check::Alpha)
    }

    /// Assert the value is already lowercase (distinct from the coercion).
    pub fn lowercase_only(self) -> Self {
        self.push(Check::LowercaseOnly)
    }

    /// Assert the value is already uppercase (distinct from the coercion).
    pub fn uppercase_only(self) -> Self {
        self.push(Check::UppercaseOnly)
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Self {
        self.push(Check::StartsWith(prefix.into()))
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> Self {
        self.push(Check::EndsWith(suffix.into()))
    }

    pub fn contains(self, needle: impl Into<String>) -> Self {
        self.push(Check::Contains(needle.into()))
    }

    pub fn format(self, format: Format) -> Self {
        self.push(Check::Format(format))
    }

    pub fn before(self, date: NaiveDate) -> Self {
        self.push(Check::Before(date))
    }

    pub fn after(self, date: NaiveDate) -> Self {
        self.push(Check::After(date))
    }

    pub fn before_time(self, time: NaiveTime) -> Self {
        self.push(Check::BeforeTime(time))
    }

    pub fn after_time(self, time: NaiveTime) -> Self {
        self.push(Check::AfterTime(time))
    }

    // Enumeration

    pub fn one_of(self, values: Vec<JsonValue>) -> Self {
        self.push(Check::OneOf(values))
    }

    // Cross-field

    pub fn equals_field(self, field: impl Into<String>) -> Self {
        self.push(Check::EqualsField(field.into()))
    }

    pub fn not_equals_field(self, field: impl Into<String>) -> Self {
        self.push(Check::NotEqualsField(field.into()))
    }

    pub fn compare<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&JsonValue, &Record) -> CheckOutcome + Send + Sync + 'static,
    {
        self.push(Check::Compare(NamedCheck::new(name, func)))
    }

    pub fn compare_value(self, rule: CompareValueRule) -> Self {
        self.push(Check::CompareValue(rule))
    }

    // Store-backed

    pub fn unique(self) -> Self {
        self.push(Check::Unique)
    }

    pub fn exists(self, lookup: RelatedLookup) -> Self {
        self.push(Check::Exists(lookup))
    }

    pub fn not_exists(self, lookup: RelatedLookup) -> Self {
        self.push(Check::NotExists(lookup))
    }

    // Composite

    pub fn array(self, rule: ArrayRule) -> Self {
        self.push(Check::Array(rule))
    }

    pub fn password_strength(self, rule: PasswordStrength) -> Self {
        self.push(Check::PasswordStrength(rule))
    }

    // Callbacks

    pub fn custom<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&JsonValue, &Record) -> CheckOutcome + Send + Sync + 'static,
    {
        self.push(Check::Custom(NamedCheck::new(name, func)))
    }

    pub fn async_custom<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: for<'a> Fn(&'a JsonValue, &'a Record, RuleIo<'a>) -> BoxFuture<'a, CheckOutcome>
            + Send
            + Sync
            + 'static,
    {
        self.push(Check::AsyncCustom(NamedAsyncCheck::new(name, func)))
    }
}

/// Ordered field -> rules mapping; immutable once a model is defined.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, FieldRules)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. Re-adding a name replaces its rule set in place.
    pub fn field(mut self, name: impl Into<String>, rules: FieldRules) -> Self {
        let name = name.into();
        if let Some(existing) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = rules;
        } else {
            self.fields.push((name, rules));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldRules> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rules)| rules)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRules)> {
        self.fields.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
