//! Shared test utilities for the simple-drop test suite.
//!
//! Provides an isolated storage layout and lookup helpers that work with the
//! metadata index and gallery listing.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let env = TestEnv::new();
//! env.add_file("Trip 2024", "photo.jpg", b"...");
//!
//! let backend = MockBackend::new();
//! let result = env.reconciler(&backend).reconcile();
//! let record = find_record(&result.metadata, "Trip 2024", "photo.jpg");
//! assert!(record.is_image);
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::ServerConfig;
use crate::gallery::{GalleryItem, GalleryListing};
use crate::imaging::ImageBackend;
use crate::reconcile::Reconciler;
use crate::store::MetadataStore;
use crate::types::{FileRecord, Metadata};
use crate::upload::{self, StagedFile};

// =========================================================================
// Fixture setup
// =========================================================================

/// A throwaway storage root with the stock layout:
///
/// ```text
/// <tmp>/uploads/
/// <tmp>/thumbnails/        (created on demand)
/// <tmp>/photo_metadata.json
/// ```
///
/// Tests get an isolated copy they can mutate without affecting each other.
pub struct TestEnv {
    pub tmp: TempDir,
    pub config: ServerConfig,
    pub store: MetadataStore,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let config = ServerConfig::default().anchored_at(tmp.path());
        std::fs::create_dir_all(&config.paths.upload_root).unwrap();
        let store = MetadataStore::new(&config.paths.metadata_file);
        Self { tmp, config, store }
    }

    pub fn upload_root(&self) -> &Path {
        &self.config.paths.upload_root
    }

    pub fn thumbnail_dir(&self) -> &Path {
        &self.config.paths.thumbnail_dir
    }

    /// Write `<upload_root>/<folder>/<name>` and return its path.
    pub fn add_file(&self, folder: &str, name: &str, bytes: &[u8]) -> PathBuf {
        let dir = self.upload_root().join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    pub fn reconciler<'a, B: ImageBackend>(&'a self, backend: &'a B) -> Reconciler<'a, B> {
        Reconciler::new(&self.config, &self.store, backend)
    }
}

/// Spool `bytes` under the upload root the way the upload handler does.
pub fn staged_file(env: &TestEnv, filename: &str, bytes: &[u8]) -> StagedFile {
    let mut contents = upload::stage(env.upload_root()).unwrap();
    contents.write_all(bytes).unwrap();
    StagedFile {
        filename: filename.to_string(),
        contents,
    }
}

/// A fully populated record pointing at `path`.
pub fn sample_record(folder: &str, filename: &str, path: &Path) -> FileRecord {
    FileRecord {
        folder: folder.to_string(),
        filename: filename.to_string(),
        description: String::new(),
        upload_date: "2024-01-01 12:00:00".to_string(),
        file_path: path.to_path_buf(),
        thumbnail: None,
        uploaded_by: "Unknown".to_string(),
        system_ip: "Unknown".to_string(),
        file_size: "1.00 B".to_string(),
        is_image: false,
        content_hash: None,
    }
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// Find the record for `folder/filename`. Panics if not found.
pub fn find_record<'a>(metadata: &'a Metadata, folder: &str, filename: &str) -> &'a FileRecord {
    metadata
        .values()
        .find(|r| r.folder == folder && r.filename == filename)
        .unwrap_or_else(|| {
            let names: Vec<String> = metadata
                .values()
                .map(|r| format!("{}/{}", r.folder, r.filename))
                .collect();
            panic!("record '{folder}/{filename}' not found. Available: {names:?}")
        })
}

/// Find a gallery item by file name. Panics if not found.
pub fn find_item<'a>(listing: &'a GalleryListing, name: &str) -> &'a GalleryItem {
    listing
        .files
        .iter()
        .find(|i| i.name == name)
        .unwrap_or_else(|| {
            let names = item_names(listing);
            panic!("gallery item '{name}' not found. Available: {names:?}")
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// All item names in listing order.
pub fn item_names(listing: &GalleryListing) -> Vec<&str> {
    listing.files.iter().map(|i| i.name.as_str()).collect()
}

/// All file names inside `<upload_root>/<folder>`, sorted.
pub fn files_in(env: &TestEnv, folder: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(env.upload_root().join(folder))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Spool files still sitting directly under the upload root.
pub fn staging_leftovers(env: &TestEnv) -> Vec<String> {
    std::fs::read_dir(env.upload_root())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(upload::STAGING_PREFIX))
        .collect()
}
