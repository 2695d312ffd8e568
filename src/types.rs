//! Shared types persisted in the metadata index and returned by the API.
//!
//! The JSON key names follow the index format written by earlier versions of
//! the service, so an existing `photo_metadata.json` loads unchanged.

use crate::fileinfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Deterministic record key: `{folder}_{filename}_{timestamp}`.
///
/// Files found on disk use their modification time; fresh uploads use the
/// upload instant. The two schemes can yield different ids for the same file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(folder: &str, filename: &str, at: SystemTime) -> Self {
        Self(format!(
            "{folder}_{filename}_{}",
            fileinfo::timestamp_key(at)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The whole index: identifier → record, ordered by identifier.
pub type Metadata = BTreeMap<FileId, FileRecord>;

/// One stored file.
///
/// Only `filepath` is required when reading an index; everything else falls
/// back to a placeholder so hand-edited or older entries still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(default = "unknown")]
    pub folder: String,
    #[serde(default = "unknown")]
    pub filename: String,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD HH:MM:SS`, local time.
    #[serde(default = "unknown")]
    pub upload_date: String,
    /// Location on the storage volume. The file, not this record, is the
    /// source of truth.
    #[serde(rename = "filepath")]
    pub file_path: PathBuf,
    /// Preview file name inside the thumbnail directory.
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default = "unknown")]
    pub uploaded_by: String,
    #[serde(default = "unknown")]
    pub system_ip: String,
    #[serde(default = "unknown")]
    pub file_size: String,
    #[serde(default)]
    pub is_image: bool,
    /// SHA-256 of the contents at the time the record was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

fn unknown() -> String {
    fileinfo::UNKNOWN.to_string()
}
