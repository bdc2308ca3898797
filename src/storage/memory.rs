/// In-process object store
///
/// Keeps objects in a sorted map and hands out `mem://<path>` URLs. Counts puts and
/// deletes so callers can observe what a pipeline actually did.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{strip_url_suffix, ObjectHandle, ObjectPath, ObjectStore};
use crate::error::StoreError;

const URL_SCHEME: &str = "mem://";

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<ObjectPath, Vec<u8>>>,
    puts: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of successful `delete` calls
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, path: &ObjectPath) -> bool {
        self.objects.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &ObjectPath, bytes: Vec<u8>) -> Result<ObjectHandle, StoreError> {
        let size = bytes.len() as u64;
        self.objects.write().await.insert(path.clone(), bytes);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(ObjectHandle {
            path: path.clone(),
            size,
        })
    }

    async fn get(&self, path: &ObjectPath) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn url(&self, path: &ObjectPath) -> Result<String, StoreError> {
        if !self.objects.read().await.contains_key(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(format!("{URL_SCHEME}{path}"))
    }

    async fn delete(&self, path: &ObjectPath) -> Result<(), StoreError> {
        match self.objects.write().await.remove(path) {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn list(&self, prefix: &ObjectPath) -> Result<Vec<ObjectHandle>, StoreError> {
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|(path, _)| path.is_direct_child_of(prefix))
            .map(|(path, bytes)| ObjectHandle {
                path: path.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    async fn list_recursive(&self, prefix: &ObjectPath) -> Result<Vec<ObjectHandle>, StoreError> {
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|(path, _)| path.starts_with(prefix) && *path != prefix)
            .map(|(path, bytes)| ObjectHandle {
                path: path.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    fn resolve_url(&self, url: &str) -> Result<ObjectPath, StoreError> {
        let path = strip_url_suffix(url)
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| StoreError::InvalidPath(format!("not a memory store URL: {url}")))?;
        ObjectPath::parse(path)
    }
}
