//! Collect image files from disk for upload
//!
//! Directories are walked recursively. The MIME type is sniffed from the file
//! header rather than trusted from the extension; non-images are skipped
//! without being read in full.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::processing::ImageFile;

/// Result of a scan
#[derive(Debug, Default)]
pub struct ImportScan {
    pub files: Vec<ImageFile>,
    /// Entries that were not images or could not be read
    pub skipped: usize,
}

/// Read every image under `paths` (files or directories), in path order
pub async fn collect_images(paths: Vec<PathBuf>) -> ImportScan {
    tokio::task::spawn_blocking(move || collect_images_blocking(&paths))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Image scan task failed");
            ImportScan::default()
        })
}

pub fn collect_images_blocking(paths: &[PathBuf]) -> ImportScan {
    let mut scan = ImportScan::default();

    for root in paths {
        debug!(path = %root.display(), "Scanning for images");

        let mut entries: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        entries.sort();

        if entries.is_empty() {
            warn!(path = %root.display(), "Nothing to import");
        }

        for path in entries {
            match read_image(&path) {
                Some(file) => scan.files.push(file),
                None => scan.skipped += 1,
            }
        }
    }

    info!(found = scan.files.len(), skipped = scan.skipped, "Image scan finished");
    scan
}

fn read_image(path: &Path) -> Option<ImageFile> {
    let kind = sniff_image(path)?;

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to read file");
            return None;
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    Some(ImageFile::new(name, kind.mime_type(), bytes))
}

/// Image type from the file header; only the first few KiB are read
fn sniff_image(path: &Path) -> Option<infer::Type> {
    let kind = match infer::get_from_path(path) {
        Ok(kind) => kind,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to read file");
            return None;
        }
    };

    let kind = kind.filter(|k| k.matcher_type() == infer::MatcherType::Image);
    if kind.is_none() {
        debug!(path = %path.display(), "Skipping non-image file");
    }
    kind
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_walks_directories_and_sniffs_content() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("shelf/box")).unwrap();
        std::fs::write(dir.path().join("shelf/a.png"), png()).unwrap();
        // Wrong extension, real PNG content
        std::fs::write(dir.path().join("shelf/box/b.dat"), png()).unwrap();
        std::fs::write(dir.path().join("shelf/notes.png"), b"not an image").unwrap();

        let scan = collect_images_blocking(&[dir.path().to_path_buf()]);

        let names: Vec<&str> = scan.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.dat"]);
        assert!(scan.files.iter().all(|f| f.mime_type == "image/png"));
        assert_eq!(scan.skipped, 1);
    }

    #[tokio::test]
    async fn test_single_file_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, png()).unwrap();

        let scan = collect_images(vec![path]).await;
        assert_eq!(scan.files.len(), 1);
        assert_eq!(scan.files[0].name, "photo.png");
    }

    #[test]
    fn test_sniffs_from_the_header_only() {
        let dir = TempDir::new().unwrap();
        // PNG signature followed by junk: the header decides
        let mut truncated = png()[..16].to_vec();
        truncated.extend(std::iter::repeat(0u8).take(64 * 1024));
        let header_only = dir.path().join("header.bin");
        std::fs::write(&header_only, &truncated).unwrap();
        let text = dir.path().join("big.txt");
        std::fs::write(&text, vec![b'a'; 4 * 1024 * 1024]).unwrap();

        assert_eq!(sniff_image(&header_only).map(|k| k.mime_type()), Some("image/png"));
        assert!(sniff_image(&text).is_none());
        assert!(sniff_image(&dir.path().join("missing.png")).is_none());
    }
}
