//! Durable local-to-remote event mappings.
//!
//! A [`SyncMapping`] records that a clinic visit UID has already been
//! pushed to the remote calendar, which remote identifier it landed
//! under, and a hash of the content that was pushed. The mapping store is
//! what makes pushes idempotent: a mapped visit is never created twice,
//! and an unchanged one is never re-pushed.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

/// The durable record of one pushed visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMapping {
    /// Identifier the remote service minted for the event.
    pub remote_id: String,
    /// Hash of the event content at the time of the last push. Absent for
    /// mappings recorded from a remote-reported duplicate, where the
    /// remote content is unknown.
    pub content_hash: Option<String>,
    /// When the last push happened.
    pub last_synced: DateTime<Utc>,
}

impl SyncMapping {
    /// Creates a mapping recorded now.
    pub fn new(remote_id: impl Into<String>, content_hash: Option<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            content_hash,
            last_synced: Utc::now(),
        }
    }
}

/// Durable storage for sync mappings, keyed by clinic visit UID.
pub trait MappingStore: Send + Sync {
    /// Returns the mapping for a visit UID, if one was recorded.
    fn get(&self, uid: &str) -> Option<SyncMapping>;

    /// Records (or replaces) the mapping for a visit UID.
    fn record(&self, uid: &str, mapping: SyncMapping) -> SyncResult<()>;

    /// Returns all recorded mappings.
    fn all(&self) -> HashMap<String, SyncMapping>;

    /// Removes the mapping for a visit UID.
    fn remove(&self, uid: &str) -> SyncResult<()>;
}

/// File-backed mapping store with an in-memory cache.
///
/// The full map is stored as one JSON document; writes go through a temp
/// file and rename so a crash never leaves a torn file.
#[derive(Debug)]
pub struct FileMappingStore {
    path: PathBuf,
    cached: RwLock<HashMap<String, SyncMapping>>,
}

impl FileMappingStore {
    /// Creates a store at the given path and loads any existing mappings.
    pub fn open(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let store = Self {
            path: path.into(),
            cached: RwLock::new(HashMap::new()),
        };
        store.load()?;
        Ok(store)
    }

    /// Returns the storage path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> SyncResult<()> {
        if !self.path.exists() {
            debug!("no mapping file at {:?}", self.path);
            return Ok(());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| SyncError::Storage(format!("failed to read mapping file: {e}")))?;
        let mappings: HashMap<String, SyncMapping> = serde_json::from_str(&content)
            .map_err(|e| SyncError::Storage(format!("failed to parse mapping file: {e}")))?;

        info!(count = mappings.len(), "loaded sync mappings from {:?}", self.path);
        *self.cached.write().unwrap() = mappings;
        Ok(())
    }

    fn save(&self, mappings: &HashMap<String, SyncMapping>) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SyncError::Storage(format!("failed to create mapping dir: {e}")))?;
        }

        // Temp file plus rename keeps the mapping file whole on crash
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(mappings)
            .map_err(|e| SyncError::Storage(format!("failed to serialize mappings: {e}")))?;

        fs::write(&temp_path, &content)
            .map_err(|e| SyncError::Storage(format!("failed to write mapping file: {e}")))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| SyncError::Storage(format!("failed to rename mapping file: {e}")))?;

        debug!("saved {} sync mappings to {:?}", mappings.len(), self.path);
        Ok(())
    }
}

impl MappingStore for FileMappingStore {
    fn get(&self, uid: &str) -> Option<SyncMapping> {
        self.cached.read().unwrap().get(uid).cloned()
    }

    fn record(&self, uid: &str, mapping: SyncMapping) -> SyncResult<()> {
        let mut cached = self.cached.write().unwrap();
        cached.insert(uid.to_string(), mapping);
        self.save(&cached)
    }

    fn all(&self) -> HashMap<String, SyncMapping> {
        self.cached.read().unwrap().clone()
    }

    fn remove(&self, uid: &str) -> SyncResult<()> {
        let mut cached = self.cached.write().unwrap();
        if cached.remove(uid).is_some() {
            self.save(&cached)?;
        }
        Ok(())
    }
}

/// In-memory mapping store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    cached: RwLock<HashMap<String, SyncMapping>>,
}

impl MemoryMappingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MappingStore for MemoryMappingStore {
    fn get(&self, uid: &str) -> Option<SyncMapping> {
        self.cached.read().unwrap().get(uid).cloned()
    }

    fn record(&self, uid: &str, mapping: SyncMapping) -> SyncResult<()> {
        self.cached
            .write()
            .unwrap()
            .insert(uid.to_string(), mapping);
        Ok(())
    }

    fn all(&self) -> HashMap<String, SyncMapping> {
        self.cached.read().unwrap().clone()
    }

    fn remove(&self, uid: &str) -> SyncResult<()> {
        self.cached.write().unwrap().remove(uid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UID: &str = "visit-42-92060207477@trichosync.local";

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryMappingStore::new();
        assert!(store.get(UID).is_none());

        store
            .record(UID, SyncMapping::new("gcal-1", Some("abc".to_string())))
            .unwrap();
        let mapping = store.get(UID).unwrap();
        assert_eq!(mapping.remote_id, "gcal-1");
        assert_eq!(mapping.content_hash.as_deref(), Some("abc"));

        store.remove(UID).unwrap();
        assert!(store.get(UID).is_none());
    }

    #[test]
    fn record_replaces_existing_mapping() {
        let store = MemoryMappingStore::new();
        store
            .record(UID, SyncMapping::new("gcal-1", None))
            .unwrap();
        store
            .record(UID, SyncMapping::new("gcal-1", Some("fresh".to_string())))
            .unwrap();

        assert_eq!(store.all().len(), 1);
        assert_eq!(
            store.get(UID).unwrap().content_hash.as_deref(),
            Some("fresh")
        );
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");

        let store = FileMappingStore::open(&path).unwrap();
        store
            .record(UID, SyncMapping::new("gcal-1", Some("abc".to_string())))
            .unwrap();
        assert!(path.exists());

        let reopened = FileMappingStore::open(&path).unwrap();
        assert_eq!(reopened.get(UID).unwrap().remote_id, "gcal-1");
        assert_eq!(reopened.all().len(), 1);
    }

    #[test]
    fn file_store_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");

        let store = FileMappingStore::open(&path).unwrap();
        store.record(UID, SyncMapping::new("gcal-1", None)).unwrap();
        store.remove(UID).unwrap();

        let reopened = FileMappingStore::open(&path).unwrap();
        assert!(reopened.get(UID).is_none());
    }
}
