//! Draft → item migration
//!
//! The store has no move primitive, so every object is copied to the item namespace
//! and then deleted from the draft. A failure part way leaves a valid state: moved
//! objects are in the item namespace, the rest are still in the draft, and running the
//! migration again picks up where it stopped.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::{DraftId, ItemId, UserId};
use crate::error::{MigrationError, StoreError};
use crate::storage::{Namespace, ObjectPath, ObjectStore};

pub struct Migrator {
    store: Arc<dyn ObjectStore>,
}

impl Migrator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Move every image of the draft to the item and return the new URLs, in the
    /// order the draft listing returned them.
    pub async fn migrate_all(
        &self,
        user: &UserId,
        draft: &DraftId,
        item: &ItemId,
    ) -> Result<Vec<String>, MigrationError> {
        let source = Namespace::draft(user, draft);
        let target = Namespace::item(user, item);

        let objects = self
            .store
            .list(&source.root())
            .await
            .map_err(|source_err| MigrationError {
                migrated: Vec::new(),
                failed: source.root(),
                source: source_err,
            })?;

        if objects.is_empty() {
            debug!(user = %user, draft = %draft, "Nothing to migrate");
            return Ok(Vec::new());
        }

        let mut migrated = Vec::with_capacity(objects.len());
        for object in &objects {
            let filename = object.name();
            let url = match self.move_full_size(&object.path, &target, filename).await {
                Ok(url) => url,
                Err(err) => {
                    warn!(
                        user = %user,
                        draft = %draft,
                        item = %item,
                        path = %object.path,
                        migrated = migrated.len(),
                        error = %err,
                        "Migration stopped"
                    );
                    return Err(MigrationError {
                        migrated,
                        failed: object.path.clone(),
                        source: err,
                    });
                }
            };
            migrated.push(url);

            self.move_thumbnail(&source, &target, filename).await;
        }

        self.sweep_thumbnails(&source, &target).await;

        info!(
            user = %user,
            draft = %draft,
            item = %item,
            count = migrated.len(),
            "Migrated draft images"
        );
        Ok(migrated)
    }

    async fn move_full_size(
        &self,
        from: &ObjectPath,
        target: &Namespace,
        filename: &str,
    ) -> Result<String, StoreError> {
        let to = target.object(filename)?;
        self.copy(from, &to).await?;
        // Take the URL while the draft original still exists
        let url = self.store.url(&to).await?;
        self.delete_source(from).await?;
        debug!(from = %from, to = %to, "Moved object");
        Ok(url)
    }

    /// Best-effort: a thumbnail that fails to move is logged and left behind
    async fn move_thumbnail(&self, source: &Namespace, target: &Namespace, filename: &str) {
        let paths = source
            .thumbnail(filename)
            .and_then(|from| Ok((from, target.thumbnail(filename)?)));
        let (from, to) = match paths {
            Ok(paths) => paths,
            Err(err) => {
                warn!(file = filename, error = %err, "Invalid thumbnail path");
                return;
            }
        };

        match self.copy_then_delete(&from, &to).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(file = filename, "No thumbnail to migrate");
            }
            Err(err) => {
                warn!(file = filename, error = %err, "Thumbnail migration failed");
            }
        }
    }

    /// Move thumbnails left in the draft by an earlier run whose full-size image
    /// already reached the item
    async fn sweep_thumbnails(&self, source: &Namespace, target: &Namespace) {
        let leftovers = match self.store.list(&source.thumbnails_root()).await {
            Ok(leftovers) => leftovers,
            Err(err) => {
                warn!(namespace = %source.root(), error = %err, "Could not list draft thumbnails");
                return;
            }
        };

        for thumb in leftovers {
            let Ok(full_size) = target.object(thumb.name()) else {
                continue;
            };
            if self.store.url(&full_size).await.is_ok() {
                self.move_thumbnail(source, target, thumb.name()).await;
            }
        }
    }

    async fn copy_then_delete(&self, from: &ObjectPath, to: &ObjectPath) -> Result<(), StoreError> {
        self.copy(from, to).await?;
        self.delete_source(from).await?;
        debug!(from = %from, to = %to, "Moved object");
        Ok(())
    }

    async fn copy(&self, from: &ObjectPath, to: &ObjectPath) -> Result<(), StoreError> {
        let bytes = self.store.get(from).await?;
        self.store.put(to, bytes).await?;
        Ok(())
    }

    async fn delete_source(&self, from: &ObjectPath) -> Result<(), StoreError> {
        match self.store.delete(from).await {
            Ok(()) => Ok(()),
            // Someone else finished the move
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}
