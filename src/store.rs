//! Durable metadata index.
//!
//! The index is a single pretty-printed JSON object mapping [`FileId`] to
//! [`FileRecord`]. It is a cache of what is on disk, not the source of truth:
//! the reconciler rebuilds any missing entries from the upload tree, so the
//! store never refuses to start over.
//!
//! ## Loading
//!
//! - Missing file → empty index.
//! - Invalid JSON → the file is renamed to `<name>.backup` (best effort) and
//!   an empty index is returned.
//! - Valid JSON that is not an object → empty index, file left alone.
//! - Entries that are not valid records are dropped one by one.
//!
//! ## Saving
//!
//! Written to `<name>.tmp` first, then renamed over the real file. A reader
//! therefore sees either the old index or the new one, never a torn write.
//! Where a platform refuses to rename over an existing file the target is
//! removed and the rename retried; any other rename failure leaves the old
//! index in place. On failure the temp file is removed and the error
//! returned; callers log it and carry on.

use crate::types::{FileId, FileRecord, Metadata};
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle on the metadata file. Cheap to clone; holds no open file.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a corrupt index is moved to.
    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.path, ".backup")
    }

    /// Scratch file used during [`save`](Self::save).
    pub fn temp_path(&self) -> PathBuf {
        with_suffix(&self.path, ".tmp")
    }

    /// Read the index. Never fails; see the [module docs](self) for the
    /// recovery rules.
    pub fn load(&self) -> Metadata {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Metadata::new(),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "could not read metadata");
                return Metadata::new();
            }
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "metadata is not valid JSON");
                self.quarantine();
                return Metadata::new();
            }
        };

        let Value::Object(entries) = value else {
            warn!(path = %self.path.display(), "metadata is not a JSON object, starting fresh");
            return Metadata::new();
        };

        entries
            .into_iter()
            .filter_map(|(id, raw)| match serde_json::from_value::<FileRecord>(raw) {
                Ok(record) => Some((FileId::from(id.as_str()), record)),
                Err(e) => {
                    warn!(id = %id, error = %e, "dropping malformed metadata entry");
                    None
                }
            })
            .collect()
    }

    /// Atomically replace the index with `metadata`.
    pub fn save(&self, metadata: &Metadata) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(metadata)?;
        let tmp = self.temp_path();

        let result = self.write_and_swap(&tmp, json.as_bytes());
        match &result {
            Ok(()) => debug!(path = %self.path.display(), entries = metadata.len(), "metadata saved"),
            Err(_) => {
                if tmp.exists() {
                    let _ = fs::remove_file(&tmp);
                }
            }
        }
        result
    }

    fn write_and_swap(&self, tmp: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(tmp, bytes).map_err(io_err(tmp))?;

        match fs::rename(tmp, &self.path) {
            Ok(()) => Ok(()),
            Err(e) if refuses_replace(&e) && self.path.is_file() => {
                fs::remove_file(&self.path).map_err(io_err(&self.path))?;
                fs::rename(tmp, &self.path).map_err(io_err(&self.path))
            }
            Err(e) => Err(io_err(&self.path)(e)),
        }
    }

    /// Move a corrupt index aside. Failure only costs the backup.
    fn quarantine(&self) {
        let backup = self.backup_path();
        match fs::rename(&self.path, &backup) {
            Ok(()) => info!(backup = %backup.display(), "backed up corrupted metadata"),
            Err(e) => debug!(error = %e, "could not back up corrupted metadata"),
        }
    }
}

/// Whether a rename failed only because the target already exists.
fn refuses_replace(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied
    )
}

/// `photo_metadata.json` + `.tmp` → `photo_metadata.json.tmp`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(path: &str) -> FileRecord {
        FileRecord {
            folder: "docs".into(),
            filename: "a.txt".into(),
            description: String::new(),
            upload_date: "2024-01-01 00:00:00".into(),
            file_path: PathBuf::from(path),
            thumbnail: None,
            uploaded_by: "Unknown".into(),
            system_ip: "Unknown".into(),
            file_size: "1.00 B".into(),
            is_image: false,
            content_hash: None,
        }
    }

    fn store_in(tmp: &TempDir) -> MetadataStore {
        MetadataStore::new(tmp.path().join("photo_metadata.json"))
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(store_in(&tmp).load().is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut m = Metadata::new();
        m.insert(FileId::from("docs_a.txt_1"), record("uploads/docs/a.txt"));
        m.insert(FileId::from("docs_b.txt_2"), record("uploads/docs/b.txt"));

        store.save(&m).unwrap();
        assert_eq!(store.load(), m);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn save_is_pretty_printed_object() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut m = Metadata::new();
        m.insert(FileId::from("k"), record("p"));
        store.save(&m).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("{\n"));
        assert!(text.contains("\"k\": {"));
    }

    #[test]
    fn save_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut m = Metadata::new();
        m.insert(FileId::from("old"), record("p"));
        store.save(&m).unwrap();

        let mut m2 = Metadata::new();
        m2.insert(FileId::from("new"), record("q"));
        store.save(&m2).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&FileId::from("new")));
    }

    #[test]
    fn save_creates_parent_directory() {
        let tmp = TempDir::new().unwrap();
        let store = MetadataStore::new(tmp.path().join("state/nested/meta.json"));
        store.save(&Metadata::new()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn save_failure_is_reported_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        // The metadata path is a directory, so the final rename cannot succeed.
        let target = tmp.path().join("meta.json");
        fs::create_dir_all(target.join("occupied")).unwrap();
        let store = MetadataStore::new(&target);

        let result = store.save(&Metadata::new());
        assert!(result.is_err());
        assert!(!store.temp_path().exists());
        assert!(target.join("occupied").is_dir());
    }

    #[test]
    fn only_replace_refusals_trigger_remove_and_retry() {
        assert!(refuses_replace(&io::Error::from(io::ErrorKind::AlreadyExists)));
        assert!(refuses_replace(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!refuses_replace(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(!refuses_replace(&io::Error::other("device busy")));
    }

    #[test]
    fn failed_save_keeps_previous_index() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let mut m = Metadata::new();
        m.insert(FileId::from("kept"), record("p"));
        store.save(&m).unwrap();

        // A directory squatting on the temp path makes the write fail.
        fs::create_dir_all(store.temp_path().join("blocker")).unwrap();
        assert!(store.save(&Metadata::new()).is_err());

        assert!(store.load().contains_key(&FileId::from("kept")));
    }

    #[test]
    fn corrupt_json_is_backed_up_and_reset() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let garbage = b"{ this is not json";
        fs::write(store.path(), garbage).unwrap();

        assert!(store.load().is_empty());
        assert!(!store.path().exists());
        assert_eq!(fs::read(store.backup_path()).unwrap(), garbage);
    }

    #[test]
    fn non_object_json_resets_without_backup() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        fs::write(store.path(), "[1, 2, 3]").unwrap();

        assert!(store.load().is_empty());
        assert!(store.path().exists());
        assert!(!store.backup_path().exists());
    }

    #[test]
    fn malformed_entries_are_dropped_individually() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        fs::write(
            store.path(),
            r#"{
                "good": {"filepath": "uploads/x/a.txt", "folder": "x"},
                "bad": {"folder": "x"},
                "worse": 42
            }"#,
        )
        .unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&FileId::from("good")].folder, "x");
    }

    #[test]
    fn suffix_paths() {
        let store = MetadataStore::new("/data/photo_metadata.json");
        assert_eq!(
            store.backup_path(),
            PathBuf::from("/data/photo_metadata.json.backup")
        );
        assert_eq!(
            store.temp_path(),
            PathBuf::from("/data/photo_metadata.json.tmp")
        );
    }
}
