//! On-disk JSON store for captured session data.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::Result;

/// A JSON object persisted to a single file. A missing file reads as an
/// empty store.
pub struct JsonStore {
    path: PathBuf,
    data: Map<String, Value>,
}

impl JsonStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, data })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    /// Merge the keys of a JSON object into the store, replacing existing
    /// entries. Non-object values are ignored.
    pub fn merge(&mut self, value: &Value) {
        if let Value::Object(object) = value {
            for (key, value) in object {
                self.data.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Persist pretty-printed UTF-8, replacing the previous content.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let rendered = serde_json::to_string_pretty(&Value::Object(self.data.clone()))?;
        std::fs::write(&self.path, rendered)?;
        debug!(path = %self.path.display(), "session data saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let mut store = JsonStore::open(&path).unwrap();
        store.insert("Channel", json!([{"ChannelID": "1"}]));
        store.save().unwrap();

        let reloaded = JsonStore::open(&path).unwrap();
        assert_eq!(reloaded.get("Channel"), Some(&json!([{"ChannelID": "1"}])));
    }

    #[test]
    fn merge_replaces_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(dir.path().join("data.json")).unwrap();
        store.insert("a", json!(1));
        store.merge(&json!({"a": 2, "b": 3}));
        assert_eq!(store.get("a"), Some(&json!(2)));
        assert_eq!(store.get("b"), Some(&json!(3)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/data.json");
        let mut store = JsonStore::open(&path).unwrap();
        store.insert("k", json!("v"));
        store.save().unwrap();
        assert!(path.exists());
    }
}
