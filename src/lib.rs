//! collection-vault: a hobby collection manager
//!
//! - `catalog`: item and category records in SQLite
//! - `processing`: validation, resizing and thumbnails for uploaded photos
//! - `storage`: the object store adapter and its path convention
//! - `pipeline`: upload, draft-to-item migration and gallery reconciliation
//! - `analysis`: auto-fill of item details from a photo
//! - `collection`: the facade a front end drives

pub mod analysis;
pub mod catalog;
pub mod collection;
pub mod config;
pub mod error;
pub mod import;
pub mod pipeline;
pub mod processing;
pub mod retry;
pub mod storage;

pub use collection::{Collection, CreatedItem, ItemUpload};
pub use config::AppConfig;
