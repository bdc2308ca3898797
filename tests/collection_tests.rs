//! End-to-end flows through the collection facade

mod helpers;

use std::sync::Arc;

use tempfile::TempDir;

use collection_vault::analysis::CollectionCategory;
use collection_vault::catalog::{Library, NewItem, UserId};
use collection_vault::error::{AnalysisError, CatalogError, CollectionError, UploadError};
use collection_vault::pipeline::Uploader;
use collection_vault::processing::{ImageResizer, ProcessingOptions, ResizeOptions, ThumbnailGenerator};
use collection_vault::retry::RetryPolicy;
use collection_vault::storage::{LocalObjectStore, Namespace, ObjectStore};
use collection_vault::Collection;

use helpers::{png_file, FlakyStore};

fn user() -> UserId {
    UserId::parse("collector").unwrap()
}

fn collection_over(store: Arc<dyn ObjectStore>) -> Collection {
    let options = ProcessingOptions::default().with_resize(ResizeOptions::square(64));
    let uploader = Uploader::new(
        store.clone(),
        ImageResizer::new(options),
        ThumbnailGenerator::new(16),
    )
    .with_retry(RetryPolicy::immediate(2));

    Collection::new(store, Arc::new(Library::open_in_memory().unwrap()), uploader)
}

fn local_collection() -> (TempDir, Arc<LocalObjectStore>, Collection) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalObjectStore::open(dir.path().join("objects")).unwrap());
    let collection = collection_over(store.clone());
    (dir, store, collection)
}

#[tokio::test]
async fn draft_to_item_to_gallery_to_delete() {
    let (_dir, store, collection) = local_collection();
    let user = user();

    let draft = collection.begin_draft(&user);
    let uploads = collection
        .upload_to_draft(
            &user,
            &draft,
            &[png_file("front.png", 200, 100), png_file("back.png", 100, 200)],
        )
        .await
        .unwrap();
    assert!(uploads.iter().all(|u| u.is_ok()));

    let front = uploads[0].as_ref().unwrap();
    assert_eq!((front.width, front.height), (64, 32));
    assert_eq!(collection.draft_assets(&user, &draft).await.unwrap().len(), 2);

    let created = collection
        .create_item(&user, &draft, NewItem::new("Millennium Falcon", "LEGO"))
        .await
        .unwrap();
    assert!(created.migration_error.is_none());

    let item = created.item;
    assert_eq!(item.image_urls.len(), 2);
    assert!(item.thumbnail_url.is_some());
    let item_root = format!("users/collector/items/{}/", item.id);
    for url in &item.image_urls {
        assert!(store.resolve_url(url).unwrap().as_str().starts_with(&item_root));
    }
    let draft_root = Namespace::draft(&user, &draft).root();
    assert!(store.list_recursive(&draft_root).await.unwrap().is_empty());

    // Remove the first image
    let mut gallery = collection.open_gallery(&user, &item.id).unwrap();
    let removed = item.image_urls[0].clone();
    gallery.mark_for_deletion(&removed);
    let report = collection.commit_gallery(&mut gallery).await.unwrap();
    assert!(report.is_clean());

    let reloaded = collection.library().get_item(&user, &item.id).unwrap();
    assert_eq!(reloaded.image_urls, vec![item.image_urls[1].clone()]);
    assert!(store.url(&store.resolve_url(&removed).unwrap()).await.is_err());

    let purged = collection.delete_item(&user, &item.id).await.unwrap();
    // Remaining image and its thumbnail
    assert_eq!(purged, 2);
    assert!(matches!(
        collection.library().get_item(&user, &item.id),
        Err(CatalogError::NotFound(_))
    ));
    assert!(!store.root().join("users").exists());
}

#[tokio::test]
async fn uploads_stop_at_the_image_limit() {
    let (_dir, _store, collection) = local_collection();
    let collection = collection.with_max_images(2);
    let user = user();
    let draft = collection.begin_draft(&user);

    let files: Vec<_> = ["a.png", "b.png", "c.png"]
        .iter()
        .map(|name| png_file(name, 10, 10))
        .collect();
    let uploads = collection.upload_to_draft(&user, &draft, &files).await.unwrap();

    assert!(uploads[0].is_ok());
    assert!(uploads[1].is_ok());
    assert!(matches!(uploads[2], Err(UploadError::GalleryFull { max: 2 })));
}

#[tokio::test]
async fn upload_to_saved_item_appends_to_record() {
    let (_dir, _store, collection) = local_collection();
    let user = user();
    let draft = collection.begin_draft(&user);
    let item = collection
        .create_item(&user, &draft, NewItem::new("Dune", "Books"))
        .await
        .unwrap()
        .item;
    assert!(item.image_urls.is_empty());

    let upload = collection
        .upload_to_item(&user, &item.id, &[png_file("cover.png", 30, 40)])
        .await
        .unwrap();

    assert_eq!(upload.commit.persisted.len(), 1);
    let reloaded = collection.library().get_item(&user, &item.id).unwrap();
    assert_eq!(reloaded.image_urls, upload.commit.persisted);
}

#[tokio::test]
async fn upload_rejected_by_a_full_gallery_is_removed_from_storage() {
    let (_dir, store, collection) = local_collection();
    let collection = collection.with_max_images(2);
    let user = user();
    let draft = collection.begin_draft(&user);
    let item = collection
        .create_item(&user, &draft, NewItem::new("Dune", "Books"))
        .await
        .unwrap()
        .item;

    // The record already lists two images, though the store holds none
    let namespace = Namespace::item(&user, &item.id);
    let listed: Vec<String> = ["x.jpg", "y.jpg"]
        .iter()
        .map(|name| format!("file://{}/{}", store.root().display(), namespace.object(name).unwrap()))
        .collect();
    collection
        .library()
        .set_image_urls(&user, &item.id, &listed)
        .unwrap();

    let upload = collection
        .upload_to_item(&user, &item.id, &[png_file("cover.png", 30, 40)])
        .await
        .unwrap();

    assert!(matches!(upload.uploads[0], Err(UploadError::GalleryFull { max: 2 })));
    assert!(store.list_recursive(&namespace.root()).await.unwrap().is_empty());
    let reloaded = collection.library().get_item(&user, &item.id).unwrap();
    assert_eq!(reloaded.image_urls, listed);
}

#[tokio::test]
async fn partial_migration_keeps_item_and_can_be_resumed() {
    let store = Arc::new(FlakyStore::new());
    let collection = collection_over(store.clone());
    let user = user();
    let draft = collection.begin_draft(&user);

    collection
        .upload_to_draft(&user, &draft, &[png_file("a.png", 10, 10), png_file("b.png", 10, 10)])
        .await
        .unwrap();
    // Fail every full-size write into the item namespace
    store.fail_puts_to("/items/");

    let created = collection
        .create_item(&user, &draft, NewItem::new("Groot", "Funko Pop"))
        .await
        .unwrap();
    let err = created.migration_error.expect("migration should stop");
    assert!(err.migrated.is_empty());
    assert!(created.item.image_urls.is_empty());
    assert_eq!(collection.library().item_count(&user).unwrap(), 1);

    store.heal();
    let resumed = collection
        .resume_migration(&user, &draft, &created.item.id)
        .await
        .unwrap();
    assert_eq!(resumed.image_urls.len(), 2);
    assert!(resumed.thumbnail_url.is_some());
}

#[tokio::test]
async fn discarding_a_draft_removes_its_objects() {
    let (_dir, store, collection) = local_collection();
    let user = user();
    let draft = collection.begin_draft(&user);
    collection
        .upload_to_draft(&user, &draft, &[png_file("a.png", 10, 10)])
        .await
        .unwrap();

    assert_eq!(collection.discard_draft(&user, &draft).await.unwrap(), 2);
    assert!(store
        .list_recursive(&Namespace::draft(&user, &draft).root())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn auto_fill_needs_a_configured_endpoint() {
    let (_dir, _store, collection) = local_collection();
    let err = collection
        .auto_fill(&png_file("a.png", 10, 10), CollectionCategory::Lego)
        .await
        .unwrap_err();
    assert!(matches!(err, CollectionError::Analysis(AnalysisError::NotConfigured)));
}
