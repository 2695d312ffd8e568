//! Storing one uploaded file.
//!
//! ```text
//! body ─► stage (spool file) ─► validate ─► sanitize ─► claim free name
//!                                                           │
//!              UploadReceipt ◄─ save index ◄─ thumbnail (images)
//! ```
//!
//! The body is spooled to a hidden file directly under the upload root
//! while it streams in, so no upload is ever held in memory. Claiming a
//! name then moves that file into its folder without overwriting anything.
//! Reconciliation only looks one folder deep, so spool files never show up
//! in the gallery, and a dropped [`StagedFile`] deletes itself.
//!
//! Validation and sanitization failures are client errors. Once the file is
//! in place the upload counts as done: a failed thumbnail or a failed index
//! save is logged and the receipt is still returned. The next reconciliation
//! pass repairs the index from disk.

use crate::config::ServerConfig;
use crate::fileinfo;
use crate::imaging::{ImageBackend, ThumbnailConfig, generate_thumbnail};
use crate::naming;
use crate::provenance::Provenance;
use crate::store::MetadataStore;
use crate::types::{FileId, FileRecord};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

/// Name prefix of spool files under the upload root.
pub const STAGING_PREFIX: &str = ".incoming-";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file uploaded!")]
    MissingFile,
    #[error("No file selected!")]
    NoFileSelected,
    #[error("Name is required!")]
    FolderRequired,
    #[error("Invalid name! Use only letters, numbers, spaces, hyphens and underscores.")]
    InvalidFolder,
    #[error("Invalid filename! Please use a proper filename with extension.")]
    InvalidFilename,
    #[error("Upload failed: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl UploadError {
    /// Whether the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }

    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The file part of an upload, already spooled to disk.
#[derive(Debug)]
pub struct StagedFile {
    /// Client-side file name, unchecked.
    pub filename: String,
    pub contents: NamedTempFile,
}

/// One upload as received from the client, before any checks.
#[derive(Debug, Default)]
pub struct UploadRequest {
    /// `None` when no file part was sent.
    pub file: Option<StagedFile>,
    pub folder: String,
    pub description: String,
}

/// Create an empty spool file under `upload_root` for an incoming body.
///
/// Same filesystem as every folder, so claiming a name is a rename.
pub fn stage(upload_root: &Path) -> io::Result<NamedTempFile> {
    fs::create_dir_all(upload_root)?;
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(upload_root)
}

/// What was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub id: FileId,
    pub record: FileRecord,
}

/// JSON body returned to the client after a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse<'a> {
    pub success: bool,
    pub folder: &'a str,
    pub filename: &'a str,
    pub path: String,
    pub uploaded_by: &'a str,
    pub ip: &'a str,
    pub size: &'a str,
}

impl UploadReceipt {
    pub fn response(&self) -> UploadResponse<'_> {
        UploadResponse {
            success: true,
            folder: &self.record.folder,
            filename: &self.record.filename,
            path: self.record.file_path.display().to_string(),
            uploaded_by: &self.record.uploaded_by,
            ip: &self.record.system_ip,
            size: &self.record.file_size,
        }
    }
}

pub struct Uploader<'a, B: ImageBackend> {
    config: &'a ServerConfig,
    store: &'a MetadataStore,
    backend: &'a B,
    provenance: &'a Provenance,
}

impl<'a, B: ImageBackend> Uploader<'a, B> {
    pub fn new(
        config: &'a ServerConfig,
        store: &'a MetadataStore,
        backend: &'a B,
        provenance: &'a Provenance,
    ) -> Self {
        Self {
            config,
            store,
            backend,
            provenance,
        }
    }

    pub fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, UploadError> {
        let staged = request.file.ok_or(UploadError::MissingFile)?;
        if staged.filename.trim().is_empty() {
            return Err(UploadError::NoFileSelected);
        }
        let raw_folder = request.folder.trim();
        if raw_folder.is_empty() {
            return Err(UploadError::FolderRequired);
        }

        let folder = naming::sanitize_folder_name(raw_folder).ok_or(UploadError::InvalidFolder)?;
        let filename =
            naming::sanitize_filename(&staged.filename).ok_or(UploadError::InvalidFilename)?;

        let folder_path = self.config.paths.upload_root.join(&folder);
        fs::create_dir_all(&folder_path).map_err(UploadError::io(&folder_path))?;

        let (filename, file_path) = claim_free_name(&folder_path, &filename, staged.contents)?;
        let stat = fs::metadata(&file_path).map_err(UploadError::io(&file_path))?;
        info!(path = %file_path.display(), bytes = stat.len(), "file saved");

        // Read the instant back from the file so a later rescan derives the
        // same identifier for the untouched file.
        let uploaded_at = stat.modified().unwrap_or_else(|_| SystemTime::now());

        let is_image = self.config.is_image(&filename);
        let thumbnail = is_image.then(|| {
            let name = naming::thumbnail_name(&folder, &filename);
            let dest = self.config.paths.thumbnail_dir.join(&name);
            let thumbnail_config = ThumbnailConfig::from_config(&self.config.thumbnails);
            if !generate_thumbnail(self.backend, &file_path, &dest, &thumbnail_config) {
                warn!(file = %file_path.display(), "upload stored without preview");
            }
            name
        });

        let id = FileId::new(&folder, &filename, uploaded_at);
        let record = FileRecord {
            description: request.description.trim().to_string(),
            upload_date: fileinfo::display_date(uploaded_at),
            file_size: fileinfo::human_size(stat.len()),
            content_hash: fileinfo::hash_file(&file_path).ok(),
            file_path,
            thumbnail,
            uploaded_by: self.provenance.uploaded_by.clone(),
            system_ip: self.provenance.system_ip.clone(),
            is_image,
            folder,
            filename,
        };

        let mut metadata = self.store.load();
        metadata.insert(id.clone(), record.clone());
        if let Err(e) = self.store.save(&metadata) {
            warn!(error = %e, "metadata save failed, but file uploaded successfully");
        }

        Ok(UploadReceipt { id, record })
    }
}

/// Move `contents` to the first of `name`, `name_1`, `name_2`, … that does
/// not exist yet.
///
/// `persist_noclobber` makes the existence check and the move one step, so
/// two concurrent uploads of the same name never share a file.
fn claim_free_name(
    dir: &Path,
    filename: &str,
    mut contents: NamedTempFile,
) -> Result<(String, PathBuf), UploadError> {
    for name in naming::candidate_names(filename) {
        let path = dir.join(&name);
        match contents.persist_noclobber(&path) {
            Ok(_) => {
                publish(&path);
                return Ok((name, path));
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => contents = e.file,
            Err(e) => {
                return Err(UploadError::Io {
                    path,
                    source: e.error,
                });
            }
        }
    }
    Err(UploadError::Io {
        path: dir.join(filename),
        source: io::Error::new(io::ErrorKind::AlreadyExists, "no free file name"),
    })
}

/// Spool files are private to the owner; stored uploads are world-readable.
#[cfg(unix)]
fn publish(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o644)) {
        warn!(path = %path.display(), error = %e, "could not set upload permissions");
    }
}

#[cfg(not(unix))]
fn publish(_path: &Path) {}
