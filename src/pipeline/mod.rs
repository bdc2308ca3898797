/// Image pipeline stages that touch the object store
///
/// - `upload`: validate, resize, thumbnail and store files under a namespace
/// - `migrate`: move a draft's images to the saved item
/// - `gallery`: edit an item's image list and reconcile it with the store

pub mod gallery;
pub mod migrate;
pub mod upload;

pub use gallery::{CommitReport, GallerySession, DEFAULT_MAX_IMAGES};
pub use migrate::Migrator;
pub use upload::{UploadedImage, Uploader};
