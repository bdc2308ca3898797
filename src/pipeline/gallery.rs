//! Gallery editing session
//!
//! Holds the ordered image list of one item while the user edits it. Removals are
//! applied to the list immediately and queued as deletes; `commit` runs the deletes
//! and then writes the list back to the record. The two phases share no transaction:
//! a delete that fails stays queued for the next commit, and the record is written
//! regardless.
//!
//! A session only ever touches objects inside its own item's namespace. URLs that
//! resolve anywhere else are refused by `select` and never deleted by `commit`.

use tracing::{debug, info, warn};

use crate::catalog::{Item, ItemId, ItemRecords, UserId};
use crate::error::{GalleryError, StoreError};
use crate::storage::{Namespace, ObjectPath, ObjectStore};

/// Default cap on images per item
pub const DEFAULT_MAX_IMAGES: usize = 4;

/// Outcome of [`GallerySession::commit`]
#[derive(Debug, Default)]
pub struct CommitReport {
    /// URLs whose objects are gone (including ones that were already missing)
    pub deleted: Vec<String>,
    /// URLs whose delete failed or was refused. Transient failures remain pending;
    /// URLs outside the item's namespace are dropped from the queue.
    pub failed: Vec<(String, StoreError)>,
    /// The image list written to the record
    pub persisted: Vec<String>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct GallerySession {
    user: UserId,
    item: ItemId,
    current_urls: Vec<String>,
    pending_deletes: Vec<String>,
    max_images: usize,
}

impl GallerySession {
    pub fn new(user: UserId, item: ItemId, urls: Vec<String>, max_images: usize) -> Self {
        Self {
            user,
            item,
            current_urls: urls,
            pending_deletes: Vec::new(),
            max_images,
        }
    }

    /// Start editing the images of a stored item
    pub fn for_item(item: &Item, max_images: usize) -> Self {
        Self::new(
            item.user_id.clone(),
            item.id.clone(),
            item.image_urls.clone(),
            max_images,
        )
    }

    pub fn item(&self) -> &ItemId {
        &self.item
    }

    pub fn current_urls(&self) -> &[String] {
        &self.current_urls
    }

    pub fn pending_deletes(&self) -> &[String] {
        &self.pending_deletes
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    fn namespace(&self) -> Namespace {
        Namespace::item(&self.user, &self.item)
    }

    /// Add `url` to the end of the list. Returns whether the list changed.
    ///
    /// Selecting a URL already in the list does nothing. Selecting a URL that is
    /// queued for deletion takes it back off the queue. A URL that does not resolve
    /// into this item's namespace is refused with `NotOwned`.
    pub fn select(
        &mut self,
        store: &dyn ObjectStore,
        url: impl Into<String>,
    ) -> Result<bool, GalleryError> {
        let url = url.into();
        if url.is_empty() || self.current_urls.contains(&url) {
            return Ok(false);
        }
        if let Err(err) = owned_path(store, &self.namespace(), &url) {
            warn!(item = %self.item, url = %url, error = %err, "Refusing image from outside the item");
            return Err(GalleryError::NotOwned { url });
        }
        if self.current_urls.len() >= self.max_images {
            return Err(GalleryError::Full {
                max: self.max_images,
            });
        }

        self.pending_deletes.retain(|pending| pending != &url);
        self.current_urls.push(url);
        Ok(true)
    }

    /// Drop `url` from the list and queue its object for deletion.
    /// Returns whether it was in the list.
    pub fn mark_for_deletion(&mut self, url: &str) -> bool {
        let before = self.current_urls.len();
        self.current_urls.retain(|current| current != url);

        if !url.is_empty() && !self.pending_deletes.iter().any(|p| p == url) {
            self.pending_deletes.push(url.to_string());
        }
        self.current_urls.len() != before
    }

    /// Delete queued objects, then persist the list.
    ///
    /// Only a failed record write is an error. Failed deletes are reported in the
    /// returned [`CommitReport`]; transient ones are retried by the next commit.
    pub async fn commit(
        &mut self,
        store: &dyn ObjectStore,
        records: &dyn ItemRecords,
    ) -> Result<CommitReport, GalleryError> {
        let mut report = CommitReport::default();
        let namespace = self.namespace();

        let mut still_pending = Vec::new();
        for url in std::mem::take(&mut self.pending_deletes) {
            match delete_image(store, &namespace, &url).await {
                Ok(()) => report.deleted.push(url),
                Err(err) if err.is_transient() => {
                    warn!(item = %self.item, url = %url, error = %err, "Image delete failed, keeping it queued");
                    still_pending.push(url.clone());
                    report.failed.push((url, err));
                }
                Err(err) => {
                    warn!(item = %self.item, url = %url, error = %err, "Image delete refused");
                    report.failed.push((url, err));
                }
            }
        }
        self.pending_deletes = still_pending;

        let urls: Vec<String> = self
            .current_urls
            .iter()
            .filter(|url| !url.trim().is_empty())
            .cloned()
            .collect();

        records
            .update_image_urls(&self.user, &self.item, &urls)
            .await?;

        info!(
            user = %self.user,
            item = %self.item,
            images = urls.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Gallery committed"
        );
        self.current_urls = urls.clone();
        report.persisted = urls;
        Ok(report)
    }
}

/// Resolve `url` to a path inside `namespace`
fn owned_path(store: &dyn ObjectStore, namespace: &Namespace, url: &str) -> Result<ObjectPath, StoreError> {
    let path = store.resolve_url(url)?;
    if !namespace.contains(&path) {
        return Err(StoreError::InvalidPath(format!(
            "{path} is outside {}",
            namespace.root()
        )));
    }
    Ok(path)
}

/// Delete an image and its thumbnail. A missing object counts as deleted.
async fn delete_image(store: &dyn ObjectStore, namespace: &Namespace, url: &str) -> Result<(), StoreError> {
    let path = owned_path(store, namespace, url)?;

    match store.delete(&path).await {
        Ok(()) => debug!(path = %path, "Deleted image"),
        Err(err) if err.is_not_found() => debug!(path = %path, "Image already gone"),
        Err(err) => return Err(err),
    }

    if let Some(thumbnail) = path.thumbnail_counterpart() {
        match store.delete(&thumbnail).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => warn!(path = %thumbnail, error = %err, "Thumbnail delete failed"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::storage::MemoryObjectStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordedWrites(Mutex<Vec<Vec<String>>>);

    #[async_trait]
    impl ItemRecords for RecordedWrites {
        async fn update_image_urls(
            &self,
            _user: &UserId,
            _item: &ItemId,
            urls: &[String],
        ) -> Result<(), CatalogError> {
            self.0.lock().unwrap().push(urls.to_vec());
            Ok(())
        }
    }

    fn url(name: &str) -> String {
        format!("mem://users/u1/items/item_42/{name}")
    }

    fn session(urls: &[String]) -> GallerySession {
        GallerySession::new(
            UserId::parse("u1").unwrap(),
            ItemId::parse("item_42").unwrap(),
            urls.to_vec(),
            DEFAULT_MAX_IMAGES,
        )
    }

    #[test]
    fn test_select_is_idempotent() {
        let store = MemoryObjectStore::new();
        let mut gallery = session(&[url("a.jpg")]);
        assert!(!gallery.select(&store, url("a.jpg")).unwrap());
        assert!(gallery.select(&store, url("b.jpg")).unwrap());
        assert!(!gallery.select(&store, "").unwrap());
        assert_eq!(gallery.current_urls(), [url("a.jpg"), url("b.jpg")]);
    }

    #[test]
    fn test_reselect_cancels_pending_delete() {
        let store = MemoryObjectStore::new();
        let mut gallery = session(&[url("a.jpg"), url("b.jpg")]);
        assert!(gallery.mark_for_deletion(&url("a.jpg")));
        assert_eq!(gallery.pending_deletes(), [url("a.jpg")]);

        gallery.select(&store, url("a.jpg")).unwrap();
        assert!(gallery.pending_deletes().is_empty());
        assert_eq!(gallery.current_urls(), [url("b.jpg"), url("a.jpg")]);
    }

    #[test]
    fn test_select_beyond_max_fails() {
        let store = MemoryObjectStore::new();
        let full: Vec<String> = (1..=4).map(|n| url(&format!("{n}.jpg"))).collect();
        let mut gallery = session(&full);
        assert!(matches!(
            gallery.select(&store, url("5.jpg")),
            Err(GalleryError::Full { max: 4 })
        ));
    }

    #[test]
    fn test_select_refuses_urls_outside_the_item() {
        let store = MemoryObjectStore::new();
        let mut gallery = session(&[]);

        for foreign in [
            "mem://users/u2/items/item_42/a.jpg",
            "mem://users/u1/items/item_43/a.jpg",
            "mem://users/u1/temp/temp_1700000000_ab12cd/a.jpg",
            "https://elsewhere/a.jpg",
        ] {
            assert!(matches!(
                gallery.select(&store, foreign),
                Err(GalleryError::NotOwned { ref url }) if url == foreign
            ));
        }
        assert!(gallery.current_urls().is_empty());
    }

    #[tokio::test]
    async fn test_commit_deletes_then_persists() {
        let store = MemoryObjectStore::new();
        let a = ObjectPath::parse("users/u1/items/item_42/a.jpg").unwrap();
        let a_thumb = a.thumbnail_counterpart().unwrap();
        store.put(&a, vec![1]).await.unwrap();
        store.put(&a_thumb, vec![2]).await.unwrap();

        let mut gallery = session(&[url("a.jpg"), String::new(), url("b.jpg")]);
        gallery.mark_for_deletion(&url("a.jpg"));
        // Already gone; still counts as deleted
        gallery.mark_for_deletion(&url("missing.jpg"));

        let records = RecordedWrites::default();
        let report = gallery.commit(&store, &records).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.persisted, vec![url("b.jpg")]);
        assert!(store.is_empty().await);
        assert_eq!(records.0.lock().unwrap().as_slice(), [vec![url("b.jpg")]]);
        assert!(gallery.pending_deletes().is_empty());
    }

    #[tokio::test]
    async fn test_commit_never_deletes_another_users_object() {
        let store = MemoryObjectStore::new();
        let theirs = ObjectPath::parse("users/u2/items/theirs/photo.jpg").unwrap();
        store.put(&theirs, vec![1]).await.unwrap();
        let their_url = store.url(&theirs).await.unwrap();

        let mut gallery = session(&[their_url.clone()]);
        gallery.mark_for_deletion(&their_url);

        let records = RecordedWrites::default();
        let report = gallery.commit(&store, &records).await.unwrap();

        assert!(report.deleted.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, StoreError::InvalidPath(_)));
        assert!(store.contains(&theirs).await);
        assert_eq!(store.delete_count(), 0);
        assert!(gallery.pending_deletes().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_url_is_refused() {
        let store = MemoryObjectStore::new();
        let mut gallery = session(&["https://elsewhere/x.jpg".to_string()]);
        gallery.mark_for_deletion("https://elsewhere/x.jpg");

        let records = RecordedWrites::default();
        let report = gallery.commit(&store, &records).await.unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(gallery.pending_deletes().is_empty());
        assert!(report.persisted.is_empty());
    }
}
