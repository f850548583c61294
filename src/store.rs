// src/store.rs
//! Key-value persistence used for both the synced settings scope and the
//! local rating cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Process-local store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("memory store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let g = self.inner.lock().expect("memory store mutex poisoned");
        Ok(g.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut g = self.inner.lock().expect("memory store mutex poisoned");
        g.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut g = self.inner.lock().expect("memory store mutex poisoned");
        g.remove(key);
        Ok(())
    }
}

/// Durable store: one JSON object per file.
///
/// The file is read lazily on first access; a missing or corrupt file reads
/// as empty. Every write rewrites the whole object through a temp file and
/// a rename so a crash never leaves a half-written file behind.
pub struct JsonFileStore {
    path: PathBuf,
    state: AsyncMutex<Option<Map<String, Value>>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: AsyncMutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> Map<String, Value> {
        match tokio::fs::read_to_string(path).await {
            Ok(s) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    tracing::warn!(path = %path.display(), "store file is not a JSON object; starting empty");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        }
    }

    async fn persist(&self, map: &Map<String, Value>) -> StoreResult<()> {
        let io_err = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        let bytes = serde_json::to_vec(map)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let mut g = self.state.lock().await;
        if g.is_none() {
            *g = Some(Self::load(&self.path).await);
        }
        Ok(g.as_ref().and_then(|m| m.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut g = self.state.lock().await;
        if g.is_none() {
            *g = Some(Self::load(&self.path).await);
        }
        let map = g.get_or_insert_with(Map::new);
        map.insert(key.to_string(), value);
        self.persist(map).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut g = self.state.lock().await;
        if g.is_none() {
            *g = Some(Self::load(&self.path).await);
        }
        let map = g.get_or_insert_with(Map::new);
        if map.remove(key).is_some() {
            self.persist(map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let s = MemoryStore::new();
        assert!(s.get("a").await.unwrap().is_none());
        s.set("a", json!({"x": 1})).await.unwrap();
        assert_eq!(s.get("a").await.unwrap(), Some(json!({"x": 1})));
        s.remove("a").await.unwrap();
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/cache.json");

        let s = JsonFileStore::new(&path);
        s.set("Inception", json!({"imdb": "8.8"})).await.unwrap();
        drop(s);

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.get("Inception").await.unwrap(),
            Some(json!({"imdb": "8.8"}))
        );
        assert!(reopened.get("inception").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty_and_is_repaired_on_write() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        let s = JsonFileStore::new(&path);
        assert!(s.get("omdbApiKey").await.unwrap().is_none());
        s.set("omdbApiKey", json!("k")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["omdbApiKey"], "k");
    }
}
