//! Object store adapter
//!
//! Path-addressed put/get/url/delete/list against a blob store. Every call maps to one
//! backend operation. There are no retries here; callers pick a policy per operation:
//! uploads retry on transient failure, cleanup deletes log and move on.
//!
//! Both shipped backends surface `StoreError::NotFound` when deleting a missing object.

pub mod local;
pub mod memory;
pub mod path;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use path::{generate_filename, Namespace, ObjectPath, THUMBNAILS};

/// A stored object as returned by `put` and `list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub path: ObjectPath,
    pub size: u64,
}

impl ObjectHandle {
    pub fn name(&self) -> &str {
        self.path.file_name()
    }
}

/// One stored image plus its optional thumbnail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub url: String,
    pub thumbnail_url: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` at `path`, replacing any existing object
    async fn put(&self, path: &ObjectPath, bytes: Vec<u8>) -> Result<ObjectHandle, StoreError>;

    async fn get(&self, path: &ObjectPath) -> Result<Vec<u8>, StoreError>;

    /// Retrievable URL for an existing object
    async fn url(&self, path: &ObjectPath) -> Result<String, StoreError>;

    /// Remove the object; `NotFound` if it does not exist
    async fn delete(&self, path: &ObjectPath) -> Result<(), StoreError>;

    /// Objects directly under `prefix`, sorted by name. Nested prefixes are not included.
    async fn list(&self, prefix: &ObjectPath) -> Result<Vec<ObjectHandle>, StoreError>;

    /// Every object anywhere below `prefix`, sorted by path
    async fn list_recursive(&self, prefix: &ObjectPath) -> Result<Vec<ObjectHandle>, StoreError>;

    /// Map a URL produced by `url` back to its path
    fn resolve_url(&self, url: &str) -> Result<ObjectPath, StoreError>;
}

/// List the images of a namespace, pairing each with its thumbnail by filename
pub async fn list_assets(
    store: &dyn ObjectStore,
    namespace: &Namespace,
) -> Result<Vec<ImageAsset>, StoreError> {
    let objects = store.list(&namespace.root()).await?;

    let mut thumbnails = HashMap::new();
    for thumb in store.list(&namespace.thumbnails_root()).await? {
        thumbnails.insert(thumb.name().to_string(), store.url(&thumb.path).await?);
    }

    let mut assets = Vec::with_capacity(objects.len());
    for object in objects {
        assets.push(ImageAsset {
            url: store.url(&object.path).await?,
            thumbnail_url: thumbnails.remove(object.name()),
        });
    }
    Ok(assets)
}

/// Strip a query string or fragment from a URL
pub(crate) fn strip_url_suffix(url: &str) -> &str {
    url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url)
}
