//! Upload chain: validate → resize → thumbnail → put
//!
//! One chain per file. A batch runs every chain concurrently and reports per file, in
//! input order; one bad file never aborts the others.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{StoreError, UploadError};
use crate::processing::{ImageFile, ImageResizer, ProcessedImage, ThumbnailGenerator};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::storage::{generate_filename, ImageAsset, Namespace, ObjectHandle, ObjectPath, ObjectStore};

/// Default bound on a single `put`
pub const DEFAULT_PUT_TIMEOUT: Duration = Duration::from_secs(30);

/// A file that made it into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Name the user picked the file under
    pub original_name: String,
    pub path: ObjectPath,
    pub asset: ImageAsset,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    resizer: ImageResizer,
    thumbnails: ThumbnailGenerator,
    retry: RetryPolicy,
    put_timeout: Duration,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, resizer: ImageResizer, thumbnails: ThumbnailGenerator) -> Self {
        Self {
            store,
            resizer,
            thumbnails,
            retry: RetryPolicy::default(),
            put_timeout: DEFAULT_PUT_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_put_timeout(mut self, put_timeout: Duration) -> Self {
        self.put_timeout = put_timeout;
        self
    }

    pub fn resizer(&self) -> &ImageResizer {
        &self.resizer
    }

    /// Run the full chain for one file
    pub async fn upload(&self, namespace: &Namespace, file: &ImageFile) -> Result<UploadedImage, UploadError> {
        // Validation runs inside process(), before any decode
        let processed = self.resizer.process(file).await?;

        let filename = generate_filename(&file.name);
        let path = namespace.object(&filename)?;
        let handle = self.put_with_retry(&path, processed.bytes.clone()).await?;
        let url = self.store.url(&handle.path).await?;

        let thumbnail_url = self.upload_thumbnail(namespace, &filename, &processed).await;

        debug!(
            file = %file.name,
            path = %path,
            width = processed.width,
            height = processed.height,
            thumbnail = thumbnail_url.is_some(),
            "Uploaded image"
        );

        Ok(UploadedImage {
            original_name: file.name.clone(),
            path,
            asset: ImageAsset { url, thumbnail_url },
            width: processed.width,
            height: processed.height,
            size: handle.size,
        })
    }

    /// Upload every file concurrently. Results are in input order.
    pub async fn upload_batch(
        &self,
        namespace: &Namespace,
        files: &[ImageFile],
    ) -> Vec<Result<UploadedImage, UploadError>> {
        let results = join_all(files.iter().map(|file| self.upload(namespace, file))).await;
        log_batch(namespace, &results);
        results
    }

    /// Like [`upload_batch`](Self::upload_batch), but keeps the namespace at or under
    /// `max_images` objects. Files past the limit fail with `GalleryFull` without
    /// being processed.
    pub async fn upload_batch_limited(
        &self,
        namespace: &Namespace,
        files: &[ImageFile],
        max_images: usize,
    ) -> Result<Vec<Result<UploadedImage, UploadError>>, StoreError> {
        let existing = self.store.list(&namespace.root()).await?.len();
        let slots = max_images.saturating_sub(existing);

        let (accepted, rejected) = files.split_at(slots.min(files.len()));
        if !rejected.is_empty() {
            warn!(
                namespace = %namespace.root(),
                existing,
                max_images,
                rejected = rejected.len(),
                "Gallery full, skipping files"
            );
        }

        let mut results = self.upload_batch(namespace, accepted).await;
        results.extend(rejected.iter().map(|_| Err(UploadError::GalleryFull { max: max_images })));
        Ok(results)
    }

    /// Best-effort: any failure leaves the asset without a thumbnail
    async fn upload_thumbnail(
        &self,
        namespace: &Namespace,
        filename: &str,
        processed: &ProcessedImage,
    ) -> Option<String> {
        let bytes = match self.thumbnails.thumbnail(processed).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(file = filename, error = %err, "Thumbnail generation failed");
                return None;
            }
        };

        let stored = async {
            let path = namespace.thumbnail(filename)?;
            let handle = self.put_with_retry(&path, bytes).await?;
            self.store.url(&handle.path).await
        };

        match stored.await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(file = filename, error = %err, "Thumbnail upload failed");
                None
            }
        }
    }

    /// `put` raced against the timeout, retried on transient failure.
    /// A timed-out attempt deletes whatever it may have left behind.
    async fn put_with_retry(&self, path: &ObjectPath, bytes: Vec<u8>) -> Result<ObjectHandle, StoreError> {
        let store = &self.store;
        let put_timeout = self.put_timeout;

        retry_with_backoff(
            "object put",
            &self.retry,
            StoreError::is_transient,
            |attempt| {
                let bytes = bytes.clone();
                async move {
                    match tokio::time::timeout(put_timeout, store.put(path, bytes)).await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(path = %path, attempt, timeout_ms = put_timeout.as_millis(), "Put timed out");
                            if let Err(err) = store.delete(path).await {
                                if !err.is_not_found() {
                                    warn!(path = %path, error = %err, "Failed to clean up timed-out put");
                                }
                            }
                            Err(StoreError::Unavailable(format!("put of {path} timed out")))
                        }
                    }
                }
            },
        )
        .await
    }
}

fn log_batch(namespace: &Namespace, results: &[Result<UploadedImage, UploadError>]) {
    let failed = results.iter().filter(|r| r.is_err()).count();
    for (index, result) in results.iter().enumerate() {
        if let Err(err) = result {
            warn!(namespace = %namespace.root(), index, error = %err, "File upload failed");
        }
    }
    info!(
        namespace = %namespace.root(),
        uploaded = results.len() - failed,
        failed,
        "Batch upload finished"
    );
}
