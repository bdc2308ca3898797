/// Filesystem-backed object store
///
/// Each object path maps to a file below the store root. Writes go to a hidden
/// `.<name>.partial` sibling first and are renamed into place, so `list` never sees a
/// half-written object. Deleting an object also removes a partial write left behind
/// by an interrupted `put`. URLs are `<public_base_url>/<path>` when a base URL is
/// configured, `file://<absolute path>` otherwise.
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use super::{strip_url_suffix, ObjectHandle, ObjectPath, ObjectStore};
use crate::error::StoreError;

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalObjectStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;

        debug!(root = %root.display(), "Opened local object store");
        Ok(Self {
            root,
            public_base_url: None,
        })
    }

    /// Serve URLs from `base_url` (e.g. a static file server in front of the root)
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.public_base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    /// Default root: `<data dir>/collection-vault/objects`
    /// - Linux: ~/.local/share/collection-vault/objects
    /// - macOS: ~/Library/Application Support/collection-vault/objects
    pub fn default_root() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("collection-vault");
        path.push("objects");
        Some(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fs_path(&self, path: &ObjectPath) -> PathBuf {
        let mut fs_path = self.root.clone();
        for segment in path.segments() {
            fs_path.push(segment);
        }
        fs_path
    }

    fn url_for(&self, path: &ObjectPath) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{path}"),
            None => format!("{FILE_SCHEME}{}", self.fs_path(path).display()),
        }
    }

    fn path_from_fs(&self, fs_path: &Path) -> Result<ObjectPath, StoreError> {
        let relative = fs_path
            .strip_prefix(&self.root)
            .map_err(|_| StoreError::InvalidPath(format!("outside store root: {}", fs_path.display())))?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => segments.push(
                    segment
                        .to_str()
                        .ok_or_else(|| StoreError::InvalidPath("non UTF-8 path".to_string()))?
                        .to_string(),
                ),
                _ => {
                    return Err(StoreError::InvalidPath(format!(
                        "unexpected path component in {}",
                        fs_path.display()
                    )))
                }
            }
        }
        ObjectPath::from_segments(segments)
    }

    /// Remove directories left empty by a delete, up to (not including) the root
    async fn prune_empty_dirs(&self, fs_path: &Path) {
        let mut dir = fs_path.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            // Fails on non-empty directories, which ends the walk
            if tokio::fs::remove_dir(current).await.is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn partial_sibling(target: &Path, name: &str) -> PathBuf {
    target.with_file_name(format!(".{name}.partial"))
}

/// Remove a file, reporting whether it existed
async fn remove_if_present(path: &Path) -> Result<bool, StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, path: &ObjectPath, bytes: Vec<u8>) -> Result<ObjectHandle, StoreError> {
        let target = self.fs_path(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = partial_sibling(&target, path.file_name());
        let size = bytes.len() as u64;
        tokio::fs::write(&partial, &bytes).await?;
        if let Err(err) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err.into());
        }

        debug!(path = %path, size, "Stored object");
        Ok(ObjectHandle {
            path: path.clone(),
            size,
        })
    }

    async fn get(&self, path: &ObjectPath) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(self.fs_path(path)).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
            _ => err.into(),
        })
    }

    async fn url(&self, path: &ObjectPath) -> Result<String, StoreError> {
        match tokio::fs::metadata(self.fs_path(path)).await {
            Ok(meta) if meta.is_file() => Ok(self.url_for(path)),
            Ok(_) => Err(StoreError::NotFound(path.to_string())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, path: &ObjectPath) -> Result<(), StoreError> {
        let fs_path = self.fs_path(path);
        let removed = remove_if_present(&fs_path).await?;
        let removed_partial = remove_if_present(&partial_sibling(&fs_path, path.file_name())).await?;

        if !removed && !removed_partial {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if removed_partial {
            debug!(path = %path, "Removed interrupted write");
        }
        debug!(path = %path, "Deleted object");
        self.prune_empty_dirs(&fs_path).await;
        Ok(())
    }

    async fn list(&self, prefix: &ObjectPath) -> Result<Vec<ObjectHandle>, StoreError> {
        let dir = self.fs_path(prefix);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // A prefix nobody wrote to is simply empty
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut handles = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if is_hidden(name) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            handles.push(ObjectHandle {
                path: prefix.join(name)?,
                size: metadata.len(),
            });
        }

        handles.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(handles)
    }

    async fn list_recursive(&self, prefix: &ObjectPath) -> Result<Vec<ObjectHandle>, StoreError> {
        let dir = self.fs_path(prefix);
        let store = self.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<ObjectHandle>, StoreError> {
            let mut handles = Vec::new();
            // A missing root yields a single error entry, which filter_map drops
            for entry in WalkDir::new(&dir)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.file_name().to_str().map_or(true, is_hidden) {
                    continue;
                }
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                handles.push(ObjectHandle {
                    path: store.path_from_fs(entry.path())?,
                    size,
                });
            }
            handles.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(handles)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("listing task failed: {e}")))?
    }

    fn resolve_url(&self, url: &str) -> Result<ObjectPath, StoreError> {
        let url = strip_url_suffix(url);

        if let Some(base) = &self.public_base_url {
            if let Some(rest) = url.strip_prefix(base.as_str()) {
                if let Some(rest) = rest.strip_prefix('/') {
                    return ObjectPath::parse(rest);
                }
            }
        }

        if let Some(fs_path) = url.strip_prefix(FILE_SCHEME) {
            return self.path_from_fs(Path::new(fs_path));
        }

        Err(StoreError::InvalidPath(format!("URL does not belong to this store: {url}")))
    }
}
