//! Persistence boundary for the layout scene.
//!
//! The storage medium is an injected collaborator: the engine only knows how
//! to serialize the present scene to a JSON document and hydrate tolerantly
//! from whatever comes back. Old documents missing newer fields decode
//! through the sanitizer's defaults.

use crate::designer::LayoutDesigner;
use crate::sanitize::sanitize_scene;
use crate::scene::SceneState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Key under which the scene document is stored.
pub const LAYOUT_STORAGE_KEY: &str = "roomflow-layout-state-v1";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Entry not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for key-value storage backends.
///
/// Implementations can store documents in memory, browser local storage, a
/// file, or anything else addressable by string key.
pub trait KeyValueStore {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> StorageResult<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete the value stored under `key`.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// In-memory store for testing and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<String> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {e}")))?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {e}")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {e}")))?;
        entries.remove(key);
        Ok(())
    }
}

/// Serialize a scene to its persisted JSON document.
pub fn serialize_scene(scene: &SceneState) -> StorageResult<String> {
    serde_json::to_string(scene).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode a persisted document into a scene. Unparseable or partially
/// corrupt input degrades to defaults instead of failing.
pub fn hydrate_scene(text: &str) -> SceneState {
    let value: Value = serde_json::from_str(text).unwrap_or_else(|e| {
        log::warn!("failed to parse persisted layout document: {e}");
        Value::Null
    });
    sanitize_scene(&value)
}

impl LayoutDesigner {
    /// Hydrate from the injected store. A missing or corrupt document
    /// hydrates the default scene; this never fails.
    pub fn hydrate_from(&mut self, store: &dyn KeyValueStore) {
        let value = match store.get(LAYOUT_STORAGE_KEY) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("failed to parse persisted layout document: {e}");
                Value::Null
            }),
            Err(StorageError::NotFound(_)) => Value::Null,
            Err(e) => {
                log::warn!("failed to read persisted layout document: {e}");
                Value::Null
            }
        };
        self.hydrate(&value);
    }

    /// Persist the present scene to the injected store.
    pub fn persist_to(&self, store: &dyn KeyValueStore) -> StorageResult<()> {
        let text = serialize_scene(self.scene())?;
        store.put(LAYOUT_STORAGE_KEY, &text)
    }
}
