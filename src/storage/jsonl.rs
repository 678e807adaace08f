//! JSONL-based record store with in-memory caching.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::traits::{Filter, Record, Storage};
use crate::error::{PostCloneError, Result};

/// JSONL-based storage with in-memory caching.
///
/// Each collection lives in `<base>/<collection>.jsonl`, one record per line.
pub struct JsonlStorage {
    base_path: PathBuf,
    cache: RwLock<HashMap<String, Vec<Record>>>,
}

impl std::fmt::Debug for JsonlStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlStorage")
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

impl JsonlStorage {
    /// Create a new JsonlStorage at the given path.
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Directory holding the collection files.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    /// Load a collection into cache if not already loaded.
    fn ensure_loaded(&self, collection: &str) -> Result<()> {
        {
            let cache = self.cache.read().map_err(|e| PostCloneError::Storage(e.to_string()))?;
            if cache.contains_key(collection) {
                return Ok(());
            }
        }

        let mut cache = self.cache.write().map_err(|e| PostCloneError::Storage(e.to_string()))?;
        if cache.contains_key(collection) {
            return Ok(());
        }

        let path = self.collection_path(collection);
        let records = if path.exists() {
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            let mut records = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    let record: Record = serde_json::from_str(&line)?;
                    records.push(record);
                }
            }
            records
        } else {
            Vec::new()
        };

        log::debug!("Loaded {} records from {}", records.len(), path.display());
        cache.insert(collection.to_string(), records);
        Ok(())
    }

    fn append_to_file(&self, collection: &str, record: &Record) -> Result<()> {
        let path = self.collection_path(collection);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    /// Replace the collection file with the given records.
    ///
    /// Written to `<collection>.jsonl.tmp` and renamed over the original, so a
    /// failed write leaves the previous file intact.
    fn rewrite_file(&self, collection: &str, records: &[Record]) -> Result<()> {
        let path = self.collection_path(collection);
        let tmp = self.base_path.join(format!("{}.jsonl.tmp", collection));

        let written = (|| -> Result<()> {
            let mut file = File::create(&tmp)?;
            for record in records {
                writeln!(file, "{}", serde_json::to_string(record)?)?;
            }
            file.sync_all()?;
            fs::rename(&tmp, &path)?;
            Ok(())
        })();

        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }

    fn not_loaded(collection: &str) -> PostCloneError {
        PostCloneError::Storage(format!("Collection not loaded: {}", collection))
    }
}

impl Storage for JsonlStorage {
    fn create(&self, collection: &str, record: &Record) -> Result<()> {
        self.ensure_loaded(collection)?;

        let mut cache = self.cache.write().map_err(|e| PostCloneError::Storage(e.to_string()))?;
        let records = cache.get_mut(collection).ok_or_else(|| Self::not_loaded(collection))?;

        if records.iter().any(|r| r.id() == record.id()) {
            return Err(PostCloneError::Storage(format!(
                "Duplicate id in {}: {}",
                collection,
                record.id()
            )));
        }

        // File first, it is the source of truth
        self.append_to_file(collection, record)?;
        records.push(record.clone());

        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        self.ensure_loaded(collection)?;

        let cache = self.cache.read().map_err(|e| PostCloneError::Storage(e.to_string()))?;
        let records = cache.get(collection).ok_or_else(|| Self::not_loaded(collection))?;

        Ok(records.iter().find(|r| r.id() == id).cloned())
    }

    fn update(&self, collection: &str, record: &Record) -> Result<()> {
        self.ensure_loaded(collection)?;

        let mut cache = self.cache.write().map_err(|e| PostCloneError::Storage(e.to_string()))?;
        let records = cache.get_mut(collection).ok_or_else(|| Self::not_loaded(collection))?;

        let index = records
            .iter()
            .position(|r| r.id() == record.id())
            .ok_or_else(|| PostCloneError::RecordNotFound(format!("{}/{}", collection, record.id())))?;

        // Cache only changes once the file does
        let mut updated = records.clone();
        updated[index] = record.clone();
        self.rewrite_file(collection, &updated)?;
        *records = updated;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.ensure_loaded(collection)?;

        let mut cache = self.cache.write().map_err(|e| PostCloneError::Storage(e.to_string()))?;
        let records = cache.get_mut(collection).ok_or_else(|| Self::not_loaded(collection))?;

        let remaining: Vec<Record> = records.iter().filter(|r| r.id() != id).cloned().collect();
        if remaining.len() == records.len() {
            return Err(PostCloneError::RecordNotFound(format!("{}/{}", collection, id)));
        }

        self.rewrite_file(collection, &remaining)?;
        *records = remaining;
        Ok(())
    }

    fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Record>> {
        self.ensure_loaded(collection)?;

        let cache = self.cache.read().map_err(|e| PostCloneError::Storage(e.to_string()))?;
        let records = cache.get(collection).ok_or_else(|| Self::not_loaded(collection))?;

        Ok(records
            .iter()
            .filter(|record| filters.iter().all(|f| f.matches(record)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (JsonlStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonlStorage::new(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    fn user(id: &str, name: &str, active: bool) -> Record {
        Record::new(id).with("name", name).with("active", active)
    }

    #[test]
    fn test_create_and_get() {
        let (storage, _temp) = create_test_storage();
        let record = user("1", "alice", true);

        storage.create("sys_user", &record).unwrap();
        let retrieved = storage.get("sys_user", "1").unwrap();

        assert_eq!(retrieved, Some(record));
    }

    #[test]
    fn test_get_not_found() {
        let (storage, _temp) = create_test_storage();
        assert_eq!(storage.get("sys_user", "nonexistent").unwrap(), None);
    }

    #[test]
    fn test_create_duplicate_id() {
        let (storage, _temp) = create_test_storage();
        storage.create("sys_user", &user("1", "alice", true)).unwrap();

        let result = storage.create("sys_user", &user("1", "bob", true));
        assert!(matches!(result, Err(PostCloneError::Storage(_))));
    }

    #[test]
    fn test_update() {
        let (storage, _temp) = create_test_storage();
        storage.create("sys_user", &user("1", "alice", true)).unwrap();

        let mut updated = storage.get("sys_user", "1").unwrap().unwrap();
        updated.set_field("active", false);
        storage.update("sys_user", &updated).unwrap();

        assert_eq!(storage.get("sys_user", "1").unwrap(), Some(updated));
    }

    #[test]
    fn test_update_not_found() {
        let (storage, _temp) = create_test_storage();
        let result = storage.update("sys_user", &user("1", "alice", true));
        assert!(matches!(result, Err(PostCloneError::RecordNotFound(_))));
    }

    #[test]
    fn test_delete() {
        let (storage, _temp) = create_test_storage();
        storage.create("sys_user", &user("1", "alice", true)).unwrap();
        storage.delete("sys_user", "1").unwrap();

        assert_eq!(storage.get("sys_user", "1").unwrap(), None);
    }

    #[test]
    fn test_delete_not_found() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.delete("sys_user", "nonexistent").is_err());
    }

    #[test]
    fn test_query_with_filters() {
        let (storage, _temp) = create_test_storage();
        storage.create("sys_user", &user("1", "alice", true)).unwrap();
        storage.create("sys_user", &user("2", "bob", false)).unwrap();
        storage.create("sys_user", &user("3", "charlie", true)).unwrap();

        let active = storage.query("sys_user", &[Filter::eq("active", true)]).unwrap();

        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|r| r.field("active") == Some(&serde_json::json!(true))));
    }

    #[test]
    fn test_find_one() {
        let (storage, _temp) = create_test_storage();
        storage.create("sys_user", &user("1", "alice", true)).unwrap();
        storage.create("sys_user", &user("2", "bob", true)).unwrap();

        let bob = storage.find_one("sys_user", &[Filter::eq("name", "bob")]).unwrap();
        assert_eq!(bob.map(|r| r.id().to_string()), Some("2".to_string()));

        let nobody = storage.find_one("sys_user", &[Filter::eq("name", "zed")]).unwrap();
        assert!(nobody.is_none());
    }

    #[test]
    fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let storage = JsonlStorage::new(temp_dir.path()).unwrap();
            storage.create("sys_user", &user("1", "alice", true)).unwrap();
            let mut rec = storage.get("sys_user", "1").unwrap().unwrap();
            rec.set_field("locked_out", true);
            storage.update("sys_user", &rec).unwrap();
        }

        {
            let storage = JsonlStorage::new(temp_dir.path()).unwrap();
            let retrieved = storage.get("sys_user", "1").unwrap().unwrap();
            assert_eq!(retrieved.str_field("name"), Some("alice"));
            assert_eq!(retrieved.field("locked_out"), Some(&serde_json::json!(true)));
        }
    }

    /// Swap the collection file for a directory so the next rewrite fails.
    fn break_collection_file(storage: &JsonlStorage, collection: &str) {
        let path = storage.collection_path(collection);
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
    }

    #[test]
    fn test_failed_update_leaves_cache_untouched() {
        let (storage, _temp) = create_test_storage();
        storage.create("sysauto", &Record::new("j1").with("active", true)).unwrap();
        break_collection_file(&storage, "sysauto");

        let mut rec = storage.get("sysauto", "j1").unwrap().unwrap();
        rec.set_field("active", false);
        assert!(matches!(storage.update("sysauto", &rec), Err(PostCloneError::Io(_))));

        // Still active, so a re-run would match and retry it
        let active = storage.query("sysauto", &[Filter::eq("active", true)]).unwrap();
        assert_eq!(active.len(), 1);
        assert!(!storage.base_path().join("sysauto.jsonl.tmp").exists());
    }

    #[test]
    fn test_failed_mutation_is_retried_on_rerun() {
        use crate::steps::ConfigStep;

        let (storage, _temp) = create_test_storage();
        storage.create("sysauto", &Record::new("j1").with("active", true)).unwrap();
        break_collection_file(&storage, "sysauto");

        let report = ConfigStep::scheduled_jobs_mutation().apply(&storage).unwrap();
        assert_eq!((report.matched, report.updated, report.failures.len()), (1, 0, 1));

        let path = storage.collection_path("sysauto");
        fs::remove_dir(&path).unwrap();
        File::create(&path).unwrap();

        let rerun = ConfigStep::scheduled_jobs_mutation().apply(&storage).unwrap();
        assert_eq!((rerun.matched, rerun.updated), (1, 1));
        assert!(rerun.is_clean());
    }

    #[test]
    fn test_failed_delete_keeps_record() {
        let (storage, _temp) = create_test_storage();
        storage.create("sys_user", &user("1", "alice", true)).unwrap();
        break_collection_file(&storage, "sys_user");

        assert!(storage.delete("sys_user", "1").is_err());
        assert!(storage.get("sys_user", "1").unwrap().is_some());
    }

    #[test]
    fn test_empty_collection() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.list("empty").unwrap().is_empty());
    }

    #[test]
    fn test_multiple_collections() {
        let (storage, _temp) = create_test_storage();
        storage.create("collection_a", &user("1", "in_a", true)).unwrap();
        storage.create("collection_b", &user("1", "in_b", true)).unwrap();

        let a = storage.get("collection_a", "1").unwrap().unwrap();
        let b = storage.get("collection_b", "1").unwrap().unwrap();

        assert_eq!(a.str_field("name"), Some("in_a"));
        assert_eq!(b.str_field("name"), Some("in_b"));
    }
}
