//! Collection facade
//!
//! Ties the catalog, the object store and the image pipeline together into the
//! operations a front end needs: draft uploads, saving an item, editing its gallery,
//! auto-fill and deletion.

use std::sync::Arc;

use tracing::{info, warn};

use crate::analysis::{AnalysisClient, AnalysisResult, CollectionCategory, ConfidenceThresholds};
use crate::catalog::{DraftId, Item, ItemId, Library, NewItem, UserId};
use crate::error::{AnalysisError, CollectionError, GalleryError, MigrationError, StoreError, UploadError};
use crate::pipeline::{CommitReport, GallerySession, Migrator, UploadedImage, Uploader, DEFAULT_MAX_IMAGES};
use crate::processing::ImageFile;
use crate::storage::{list_assets, ImageAsset, Namespace, ObjectPath, ObjectStore};

/// Result of saving a new item. The item is stored even when migration stopped
/// part way; `migration_error` then says which image was not moved.
#[derive(Debug)]
pub struct CreatedItem {
    pub item: Item,
    pub migration_error: Option<MigrationError>,
}

/// Result of uploading straight into a saved item
#[derive(Debug)]
pub struct ItemUpload {
    pub uploads: Vec<Result<UploadedImage, UploadError>>,
    pub commit: CommitReport,
}

pub struct Collection {
    store: Arc<dyn ObjectStore>,
    library: Arc<Library>,
    uploader: Uploader,
    migrator: Migrator,
    analysis: Option<AnalysisClient>,
    thresholds: ConfidenceThresholds,
    max_images: usize,
}

impl Collection {
    pub fn new(store: Arc<dyn ObjectStore>, library: Arc<Library>, uploader: Uploader) -> Self {
        Self {
            migrator: Migrator::new(store.clone()),
            store,
            library,
            uploader,
            analysis: None,
            thresholds: ConfidenceThresholds::default(),
            max_images: DEFAULT_MAX_IMAGES,
        }
    }

    pub fn with_analysis(mut self, client: AnalysisClient, thresholds: ConfidenceThresholds) -> Self {
        self.analysis = Some(client);
        self.thresholds = thresholds;
        self
    }

    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn thresholds(&self) -> &ConfidenceThresholds {
        &self.thresholds
    }

    /// New staging namespace for an item that is not saved yet
    pub fn begin_draft(&self, user: &UserId) -> DraftId {
        let draft = DraftId::generate();
        info!(user = %user, draft = %draft, "Draft started");
        draft
    }

    pub async fn upload_to_draft(
        &self,
        user: &UserId,
        draft: &DraftId,
        files: &[ImageFile],
    ) -> Result<Vec<Result<UploadedImage, UploadError>>, CollectionError> {
        let namespace = Namespace::draft(user, draft);
        Ok(self
            .uploader
            .upload_batch_limited(&namespace, files, self.max_images)
            .await?)
    }

    pub async fn draft_assets(&self, user: &UserId, draft: &DraftId) -> Result<Vec<ImageAsset>, CollectionError> {
        Ok(list_assets(self.store.as_ref(), &Namespace::draft(user, draft)).await?)
    }

    /// Upload into a saved item and append the new images to its record
    pub async fn upload_to_item(
        &self,
        user: &UserId,
        item: &ItemId,
        files: &[ImageFile],
    ) -> Result<ItemUpload, CollectionError> {
        let mut gallery = self.open_gallery(user, item)?;
        let namespace = Namespace::item(user, item);
        let mut uploads = self
            .uploader
            .upload_batch_limited(&namespace, files, self.max_images)
            .await?;

        for result in uploads.iter_mut() {
            let Ok(uploaded) = result else {
                continue;
            };
            if let Err(err) = gallery.select(self.store.as_ref(), uploaded.asset.url.clone()) {
                warn!(item = %item, url = %uploaded.asset.url, error = %err, "Uploaded image not added to gallery, removing it");
                self.remove_upload(&uploaded.path).await;
                *result = Err(match err {
                    GalleryError::Full { max } => UploadError::GalleryFull { max },
                    other => UploadError::Gallery(other),
                });
            }
        }

        let commit = gallery.commit(self.store.as_ref(), self.library.as_ref()).await?;
        Ok(ItemUpload { uploads, commit })
    }

    /// Best-effort removal of an uploaded image and its thumbnail
    async fn remove_upload(&self, path: &ObjectPath) {
        let thumbnail = path.thumbnail_counterpart();
        for path in std::iter::once(path).chain(thumbnail.as_ref()) {
            if let Err(err) = self.store.delete(path).await {
                if !err.is_not_found() {
                    warn!(path = %path, error = %err, "Failed to remove upload");
                }
            }
        }
    }

    /// Save a new item and move its draft images into it.
    ///
    /// The record is written first. A migration failure leaves it saved with the
    /// images that did move; [`resume_migration`](Self::resume_migration) moves the rest.
    pub async fn create_item(
        &self,
        user: &UserId,
        draft: &DraftId,
        new: NewItem,
    ) -> Result<CreatedItem, CollectionError> {
        let mut item = self.library.add_item(user, new)?;

        let (migrated, migration_error) = match self.migrator.migrate_all(user, draft, &item.id).await {
            Ok(urls) => (urls, None),
            Err(err) => {
                warn!(user = %user, item = %item.id, error = %err, "Item saved with partial images");
                (err.migrated.clone(), Some(err))
            }
        };

        if !migrated.is_empty() {
            item = self.attach_images(user, &item, migrated).await?;
        }

        info!(
            user = %user,
            item = %item.id,
            images = item.image_urls.len(),
            complete = migration_error.is_none(),
            "Item created"
        );
        Ok(CreatedItem {
            item,
            migration_error,
        })
    }

    /// Move whatever a failed migration left in the draft and append it to the item
    pub async fn resume_migration(
        &self,
        user: &UserId,
        draft: &DraftId,
        item: &ItemId,
    ) -> Result<Item, CollectionError> {
        let current = self.library.get_item(user, item)?;
        match self.migrator.migrate_all(user, draft, item).await {
            Ok(urls) => self.attach_images(user, &current, urls).await,
            Err(err) => {
                if !err.migrated.is_empty() {
                    self.attach_images(user, &current, err.migrated.clone()).await?;
                }
                Err(err.into())
            }
        }
    }

    /// Append URLs to the item's list, and give it a cover thumbnail if it has none.
    /// The append runs against the current record, not the `item` snapshot.
    async fn attach_images(&self, user: &UserId, item: &Item, urls: Vec<String>) -> Result<Item, CollectionError> {
        let cover = match (&item.thumbnail_url, item.image_urls.first().or(urls.first())) {
            (None, Some(first)) => self.thumbnail_url_for(first).await,
            _ => None,
        };

        Ok(self.library.modify_item(user, &item.id, |current| {
            for url in urls {
                if !current.image_urls.contains(&url) {
                    current.image_urls.push(url);
                }
            }
            if current.thumbnail_url.is_none() {
                current.thumbnail_url = cover;
            }
        })?)
    }

    async fn thumbnail_url_for(&self, url: &str) -> Option<String> {
        let path = self.store.resolve_url(url).ok()?;
        let thumbnail = path.thumbnail_counterpart()?;
        self.store.url(&thumbnail).await.ok()
    }

    /// Gallery editing session seeded from the stored record
    pub fn open_gallery(&self, user: &UserId, item: &ItemId) -> Result<GallerySession, CollectionError> {
        let item = self.library.get_item(user, item)?;
        Ok(GallerySession::for_item(&item, self.max_images))
    }

    pub async fn commit_gallery(&self, gallery: &mut GallerySession) -> Result<CommitReport, CollectionError> {
        Ok(gallery.commit(self.store.as_ref(), self.library.as_ref()).await?)
    }

    /// Process an image the same way uploads are processed, then ask the analysis
    /// endpoint what it shows
    pub async fn auto_fill(
        &self,
        file: &ImageFile,
        category: CollectionCategory,
    ) -> Result<AnalysisResult, CollectionError> {
        let client = self.analysis.as_ref().ok_or(AnalysisError::NotConfigured)?;
        let processed = self.uploader.resizer().process(file).await?;
        Ok(client
            .analyze(&processed.bytes, &processed.format, category)
            .await?)
    }

    /// Remove every stored object of the item, then its record.
    /// Object deletes are best-effort; returns how many objects were removed.
    pub async fn delete_item(&self, user: &UserId, item: &ItemId) -> Result<usize, CollectionError> {
        // Fail early for an unknown item
        self.library.get_item(user, item)?;

        let removed = self.purge_namespace(&Namespace::item(user, item)).await?;
        self.library.delete_item(user, item)?;
        Ok(removed)
    }

    /// Drop an abandoned draft and everything uploaded to it
    pub async fn discard_draft(&self, user: &UserId, draft: &DraftId) -> Result<usize, CollectionError> {
        let removed = self.purge_namespace(&Namespace::draft(user, draft)).await?;
        info!(user = %user, draft = %draft, removed, "Draft discarded");
        Ok(removed)
    }

    async fn purge_namespace(&self, namespace: &Namespace) -> Result<usize, StoreError> {
        let objects = self.store.list_recursive(&namespace.root()).await?;

        let mut removed = 0;
        for object in &objects {
            match self.store.delete(&object.path).await {
                Ok(()) => removed += 1,
                Err(err) if err.is_not_found() => {}
                Err(err) => warn!(path = %object.path, error = %err, "Failed to delete object"),
            }
        }
        Ok(removed)
    }
}
