//! Item catalog: records, categories and identifiers, backed by SQLite

pub mod data;
pub mod edit;
pub mod filter;
pub mod ids;
pub mod library;

use async_trait::async_trait;

pub use data::{Category, Item, ItemStatus, MetadataSource, NewCategory, NewItem};
pub use edit::ItemPatch;
pub use filter::{ItemFilter, SortBy, SortOrder};
pub use ids::{DraftId, ItemId, UserId};
pub use library::Library;

use crate::error::CatalogError;

/// The slice of the document store the image pipeline writes to.
///
/// Migration and gallery commits only ever rewrite an item's image list, so they
/// depend on this rather than on the whole [`Library`].
#[async_trait]
pub trait ItemRecords: Send + Sync {
    /// Replace the item's image list; every other field is left untouched
    async fn update_image_urls(
        &self,
        user: &UserId,
        item: &ItemId,
        urls: &[String],
    ) -> Result<(), CatalogError>;
}

#[async_trait]
impl ItemRecords for Library {
    async fn update_image_urls(
        &self,
        user: &UserId,
        item: &ItemId,
        urls: &[String],
    ) -> Result<(), CatalogError> {
        self.set_image_urls(user, item, urls)
    }
}
