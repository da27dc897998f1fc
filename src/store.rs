//! Object store abstraction for original document bytes.
//!
//! The [`ObjectStore`] trait is the narrow interface the pipeline consumes
//! for durable byte storage; the vector index never reads from it and the
//! store never knows about chunks. Overwrite-on-put, delete-of-missing-key
//! is success.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`ensure_ready`](ObjectStore::ensure_ready) | Idempotent bucket/directory setup |
//! | [`put`](ObjectStore::put) | Store bytes under a key (last write wins) |
//! | [`get`](ObjectStore::get) | Fetch bytes by key |
//! | [`delete`](ObjectStore::delete) | Remove a key (absent key is success) |
//! | [`list`](ObjectStore::list) | Enumerate stored objects |
//! | [`clear`](ObjectStore::clear) | Remove everything (empty store is success) |

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Metadata for one stored object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

/// Durable byte storage for original documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Idempotent one-time setup (create the backing directory/bucket).
    async fn ensure_ready(&self) -> Result<()>;

    /// Store bytes under `key`, overwriting any existing entry.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove `key`. A missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerate stored objects, sorted by key.
    async fn list(&self) -> Result<Vec<StoredObject>>;

    /// Remove every stored object. An already-empty store is success.
    async fn clear(&self) -> Result<()>;
}

// ============ Filesystem Store ============

/// Directory-backed object store used by the CLI deployment.
///
/// Keys map directly to file names under the configured root; the pipeline
/// guarantees keys contain no path separators before they reach the store.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn io_err(e: std::io::Error) -> Error {
    Error::ObjectStore(e.to_string())
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn ensure_ready(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(self.path_for(key), bytes)
            .await
            .map_err(io_err)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.path_for(key)).await.map_err(io_err)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn list(&self) -> Result<Vec<StoredObject>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let metadata = entry.metadata().await.map_err(io_err)?;
            if !metadata.is_file() {
                continue;
            }
            let modified_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            objects.push(StoredObject {
                key: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                modified_at,
            });
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn clear(&self) -> Result<()> {
        for object in self.list().await? {
            self.delete(&object.key).await?;
        }
        Ok(())
    }
}

// ============ In-Memory Store ============

/// In-memory store for tests. `RwLock<HashMap>` behind the same trait the
/// filesystem backend implements.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| Error::ObjectStore(e.to_string()))?;
        objects.insert(key.to_string(), (bytes.to_vec(), Utc::now()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self
            .objects
            .read()
            .map_err(|e| Error::ObjectStore(e.to_string()))?;
        objects
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| Error::ObjectStore(format!("no such object: {}", key)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| Error::ObjectStore(e.to_string()))?;
        objects.remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredObject>> {
        let objects = self
            .objects
            .read()
            .map_err(|e| Error::ObjectStore(e.to_string()))?;
        let mut listed: Vec<StoredObject> = objects
            .iter()
            .map(|(key, (bytes, modified_at))| StoredObject {
                key: key.clone(),
                size: bytes.len() as u64,
                modified_at: *modified_at,
            })
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }

    async fn clear(&self) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| Error::ObjectStore(e.to_string()))?;
        objects.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_put_get_overwrite() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path().join("objects"));
        store.ensure_ready().await.unwrap();

        store.put("doc.txt", b"first").await.unwrap();
        store.put("doc.txt", b"second").await.unwrap();
        assert_eq!(store.get("doc.txt").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn fs_store_delete_missing_is_ok() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path().join("objects"));
        store.ensure_ready().await.unwrap();
        store.delete("never-existed.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn fs_store_list_and_clear() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path().join("objects"));
        store.ensure_ready().await.unwrap();

        store.put("a.txt", b"aaa").await.unwrap();
        store.put("b.txt", b"bb").await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].key, "a.txt");
        assert_eq!(listed[0].size, 3);

        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        // Clearing an empty store converges, not errors
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryObjectStore::new();
        store.put("doc.pdf", b"bytes").await.unwrap();
        assert_eq!(store.get("doc.pdf").await.unwrap(), b"bytes");
        assert!(store.get("missing.pdf").await.is_err());

        store.delete("doc.pdf").await.unwrap();
        store.delete("doc.pdf").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
