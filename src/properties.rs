//! Instance-wide key/value properties.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{PostCloneError, Result};
use crate::storage::{Record, Storage};

/// Collection holding properties when they live in the record store.
pub const PROPERTIES_COLLECTION: &str = "sys_properties";

/// Key/value store for instance configuration flags.
pub trait PropertyStore {
    /// Read a property; `None` when it has never been set.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a property, creating it if needed.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// True when the property holds exactly `"true"`.
    fn is_true(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.as_deref() == Some("true"))
    }
}

/// Properties persisted as `{id: <key>, value: <value>}` records.
pub struct StoredProperties<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> StoredProperties<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }
}

impl<S: Storage> PropertyStore for StoredProperties<'_, S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let record = self.storage.get(PROPERTIES_COLLECTION, key)?;
        Ok(record.and_then(|r| r.str_field("value").map(str::to_string)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        match self.storage.get(PROPERTIES_COLLECTION, key)? {
            Some(mut record) => {
                record.set_field("value", value);
                self.storage.update(PROPERTIES_COLLECTION, &record)
            }
            None => self
                .storage
                .create(PROPERTIES_COLLECTION, &Record::new(key).with("value", value)),
        }
    }
}

/// In-process property map.
#[derive(Debug, Default)]
pub struct MemoryProperties {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a property, builder style.
    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.into(), value.into());
        }
        self
    }
}

impl PropertyStore for MemoryProperties {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().map_err(|e| PostCloneError::Property(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().map_err(|e| PostCloneError::Property(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
