//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use collection_vault::error::StoreError;
use collection_vault::processing::ImageFile;
use collection_vault::storage::{MemoryObjectStore, ObjectHandle, ObjectPath, ObjectStore};

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 90])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn png_file(name: &str, width: u32, height: u32) -> ImageFile {
    ImageFile::new(name, "image/png", png(width, height))
}

/// Memory store with injectable failures
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryObjectStore,
    fail_put_containing: Mutex<Vec<String>>,
    fail_delete_containing: Mutex<Vec<String>>,
    transient_put_failures: AtomicUsize,
    put_delay: Mutex<Option<Duration>>,
    url_failures: Mutex<Option<(String, usize)>>,
    pub put_attempts: AtomicUsize,
    pub delete_attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every put to a path containing `needle` fails as unavailable
    pub fn fail_puts_to(&self, needle: &str) {
        self.fail_put_containing.lock().unwrap().push(needle.to_string());
    }

    pub fn fail_deletes_of(&self, needle: &str) {
        self.fail_delete_containing.lock().unwrap().push(needle.to_string());
    }

    pub fn heal(&self) {
        self.fail_put_containing.lock().unwrap().clear();
        self.fail_delete_containing.lock().unwrap().clear();
    }

    /// The next `count` puts fail as unavailable
    pub fn fail_next_puts(&self, count: usize) {
        self.transient_put_failures.store(count, Ordering::SeqCst);
    }

    /// The next `count` `url` calls for paths containing `needle` fail as unavailable
    pub fn fail_next_urls_of(&self, needle: &str, count: usize) {
        *self.url_failures.lock().unwrap() = Some((needle.to_string(), count));
    }

    /// Puts write their object, then stall for `delay` before returning
    pub fn stall_puts(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    fn matches(list: &Mutex<Vec<String>>, path: &ObjectPath) -> bool {
        list.lock().unwrap().iter().any(|n| path.as_str().contains(n.as_str()))
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn put(&self, path: &ObjectPath, bytes: Vec<u8>) -> Result<ObjectHandle, StoreError> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);

        let transient = self
            .transient_put_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient || Self::matches(&self.fail_put_containing, path) {
            return Err(StoreError::Unavailable(format!("injected put failure: {path}")));
        }

        let handle = self.inner.put(path, bytes).await?;
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(handle)
    }

    async fn get(&self, path: &ObjectPath) -> Result<Vec<u8>, StoreError> {
        self.inner.get(path).await
    }

    async fn url(&self, path: &ObjectPath) -> Result<String, StoreError> {
        {
            let mut failures = self.url_failures.lock().unwrap();
            if let Some((needle, remaining)) = failures.as_mut() {
                if *remaining > 0 && path.as_str().contains(needle.as_str()) {
                    *remaining -= 1;
                    return Err(StoreError::Unavailable(format!("injected url failure: {path}")));
                }
            }
        }
        self.inner.url(path).await
    }

    async fn delete(&self, path: &ObjectPath) -> Result<(), StoreError> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::matches(&self.fail_delete_containing, path) {
            return Err(StoreError::Unavailable(format!("injected delete failure: {path}")));
        }
        self.inner.delete(path).await
    }

    async fn list(&self, prefix: &ObjectPath) -> Result<Vec<ObjectHandle>, StoreError> {
        self.inner.list(prefix).await
    }

    async fn list_recursive(&self, prefix: &ObjectPath) -> Result<Vec<ObjectHandle>, StoreError> {
        self.inner.list_recursive(prefix).await
    }

    fn resolve_url(&self, url: &str) -> Result<ObjectPath, StoreError> {
        self.inner.resolve_url(url)
    }
}
