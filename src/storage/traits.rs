//! Storage trait definitions, records, and filter types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Filter operations for querying records.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Field equals value
    Eq,
    /// Field does not equal value
    Ne,
}

/// A filter for querying records.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field name to filter on
    pub field: String,
    /// Filter operation
    pub op: FilterOp,
    /// Value to compare against
    pub value: Value,
}

impl Filter {
    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Serialize) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: serde_json::to_value(value).unwrap_or(Value::Null),
        }
    }

    /// Create a not-equal filter.
    pub fn ne(field: impl Into<String>, value: impl Serialize) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Ne,
            value: serde_json::to_value(value).unwrap_or(Value::Null),
        }
    }

    /// Check if a record matches this filter.
    pub fn matches(&self, record: &Record) -> bool {
        let field_value = record.field(&self.field);

        match &self.op {
            FilterOp::Eq => match field_value {
                Some(v) => *v == self.value,
                None => self.value.is_null(),
            },
            FilterOp::Ne => match field_value {
                Some(v) => *v != self.value,
                None => !self.value.is_null(),
            },
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.op {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
        };
        write!(f, "{}{}{}", self.field, op, self.value)
    }
}

/// A stored record: a flat map of named fields keyed by an `id` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record with the given id and no other fields.
    pub fn new(id: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::String(id.into()));
        Self { fields }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        self.set_field(name, value);
        self
    }

    /// The record's id, or an empty string when it has none.
    pub fn id(&self) -> &str {
        self.fields.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    /// Read a field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Read a string field.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Set a field, replacing any previous value.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(name.into(), value);
    }
}

/// Record store for CRUD and predicate queries over named collections.
pub trait Storage {
    /// Create a new record.
    fn create(&self, collection: &str, record: &Record) -> Result<()>;

    /// Get a record by ID.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Record>>;

    /// Persist an existing record, matched by its id.
    fn update(&self, collection: &str, record: &Record) -> Result<()>;

    /// Delete a record by ID.
    fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Query records matching every filter.
    fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Record>>;

    /// First record matching every filter.
    fn find_one(&self, collection: &str, filters: &[Filter]) -> Result<Option<Record>> {
        Ok(self.query(collection, filters)?.into_iter().next())
    }

    /// List all records in a collection.
    fn list(&self, collection: &str) -> Result<Vec<Record>> {
        self.query(collection, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_filter_eq_matches() {
        let filter = Filter::eq("active", true);
        assert!(filter.matches(&record(json!({"id": "1", "active": true}))));
    }

    #[test]
    fn test_filter_eq_no_match() {
        let filter = Filter::eq("active", true);
        assert!(!filter.matches(&record(json!({"id": "1", "active": false}))));
    }

    #[test]
    fn test_filter_eq_null() {
        let filter = Filter::eq("field", Value::Null);
        assert!(filter.matches(&record(json!({"id": "1"}))));
    }

    #[test]
    fn test_filter_ne_matches() {
        let filter = Filter::ne("roles", "admin");
        assert!(filter.matches(&record(json!({"id": "1", "roles": "itil"}))));
    }

    #[test]
    fn test_filter_ne_no_match() {
        let filter = Filter::ne("roles", "admin");
        assert!(!filter.matches(&record(json!({"id": "1", "roles": "admin"}))));
    }

    #[test]
    fn test_filter_ne_missing_field_matches() {
        let filter = Filter::ne("roles", "admin");
        assert!(filter.matches(&record(json!({"id": "1"}))));
    }

    #[test]
    fn test_filter_is_type_strict() {
        // "true" the string is not true the boolean
        let filter = Filter::eq("active", true);
        assert!(!filter.matches(&record(json!({"id": "1", "active": "true"}))));
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(Filter::ne("roles", "admin").to_string(), "roles!=\"admin\"");
        assert_eq!(Filter::eq("active", true).to_string(), "active=true");
    }

    #[test]
    fn test_record_fields() {
        let mut rec = Record::new("u1").with("name", "alice");
        assert_eq!(rec.id(), "u1");
        assert_eq!(rec.str_field("name"), Some("alice"));

        rec.set_field("locked_out", true);
        assert_eq!(rec.field("locked_out"), Some(&json!(true)));
        assert_eq!(rec.field("missing"), None);
    }

    #[test]
    fn test_record_without_id() {
        let rec = record(json!({"name": "orphan"}));
        assert_eq!(rec.id(), "");
    }
}
