//! Bulk field mutation over a record collection.
//!
//! Every matching record is updated and persisted on its own. There is no
//! transaction: a failure part-way leaves earlier records changed, and
//! re-running the same mutation converges because matched records no longer
//! match once updated (or are rewritten with the same values).

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::storage::{Filter, Storage};

/// One `field = value` assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAssignment {
    pub field: String,
    pub value: Value,
}

impl FieldAssignment {
    pub fn new(field: impl Into<String>, value: impl Serialize) -> Self {
        Self {
            field: field.into(),
            value: serde_json::to_value(value).unwrap_or(Value::Null),
        }
    }
}

/// A record that matched but could not be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub record_id: String,
    pub error: String,
}

/// What a bulk mutation did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationReport {
    /// Records selected by the predicate.
    pub matched: usize,
    /// Records persisted with the new values.
    pub updated: usize,
    /// Records whose persist failed.
    pub failures: Vec<RecordFailure>,
}

impl MutationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// "For every record in `collection` matching `filters`, set these fields."
#[derive(Debug, Clone, PartialEq)]
pub struct BulkMutation {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub assignments: Vec<FieldAssignment>,
}

impl BulkMutation {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            assignments: Vec::new(),
        }
    }

    /// Add a predicate constraint.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a field assignment.
    pub fn set(mut self, field: impl Into<String>, value: impl Serialize) -> Self {
        self.assignments.push(FieldAssignment::new(field, value));
        self
    }

    /// Run the mutation.
    ///
    /// A query failure is returned as an error. Persist failures are recorded
    /// per record and do not stop the remaining records.
    pub fn apply<S: Storage + ?Sized>(&self, storage: &S) -> Result<MutationReport> {
        let records = storage.query(&self.collection, &self.filters)?;
        let mut report = MutationReport {
            matched: records.len(),
            ..Default::default()
        };

        for mut record in records {
            for assignment in &self.assignments {
                record.set_field(assignment.field.clone(), &assignment.value);
            }
            match storage.update(&self.collection, &record) {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    log::debug!("Persist failed for {}/{}: {}", self.collection, record.id(), e);
                    report.failures.push(RecordFailure {
                        record_id: record.id().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

impl std::fmt::Display for BulkMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filters: Vec<String> = self.filters.iter().map(ToString::to_string).collect();
        let sets: Vec<String> = self
            .assignments
            .iter()
            .map(|a| format!("{}={}", a.field, a.value))
            .collect();
        write!(f, "{} where [{}] set [{}]", self.collection, filters.join(" AND "), sets.join(", "))
    }
}
