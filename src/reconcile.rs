//! Keep the metadata index in step with the upload tree.
//!
//! The upload tree is authoritative. A reconciliation pass:
//!
//! 1. Loads the index from the [`MetadataStore`].
//! 2. Drops every record whose file no longer exists, or whose identifier no
//!    longer matches the file's modification time (the file was rewritten
//!    or touched; step 3 registers it again under its new identifier).
//! 3. Walks `<upload_root>/<folder>/<file>` (exactly one folder level) and
//!    registers any file whose identifier is not already known.
//! 4. Generates missing thumbnails for newly found images, in parallel.
//! 5. Saves the index back (best effort).
//!
//! ```text
//! uploads/
//! ├── Trip 2024/
//! │   ├── photo.jpg        → "Trip 2024_photo.jpg_<mtime>"
//! │   └── photo_1.jpg
//! ├── docs/
//! │   └── notes.txt        → no thumbnail
//! └── stray.txt            → ignored (not inside a folder)
//! ```
//!
//! Nothing in here fails the pass as a whole: unreadable entries are logged
//! and skipped, a missing upload root means "nothing on disk yet", and a
//! failed save is reported through [`Reconciliation::persisted`].

use crate::config::ServerConfig;
use crate::fileinfo;
use crate::imaging::{ImageBackend, ThumbnailConfig, generate_thumbnail};
use crate::naming;
use crate::provenance::Provenance;
use crate::store::MetadataStore;
use crate::types::{FileId, FileRecord, Metadata};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Description given to files that appeared on disk without an upload.
pub const AUTO_DESCRIPTION: &str = "Auto-detected file";

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// The reconciled index, as saved.
    pub metadata: Metadata,
    /// Records dropped because their file is gone or has changed.
    pub pruned: usize,
    /// Files registered during this pass.
    pub discovered: usize,
    pub thumbnails_generated: usize,
    pub thumbnails_failed: usize,
    /// Whether the index was written back successfully.
    pub persisted: bool,
}

/// A file on disk that the index does not know about yet.
struct Candidate {
    id: FileId,
    folder: String,
    filename: String,
    path: PathBuf,
    modified: SystemTime,
}

enum ThumbnailOutcome {
    NotNeeded,
    Generated,
    Failed,
}

/// Borrowing view over everything a pass needs.
pub struct Reconciler<'a, B: ImageBackend> {
    config: &'a ServerConfig,
    store: &'a MetadataStore,
    backend: &'a B,
}

impl<'a, B: ImageBackend> Reconciler<'a, B> {
    pub fn new(config: &'a ServerConfig, store: &'a MetadataStore, backend: &'a B) -> Self {
        Self {
            config,
            store,
            backend,
        }
    }

    /// Run one full pass. See the [module docs](self).
    pub fn reconcile(&self) -> Reconciliation {
        let loaded = self.store.load();
        let before = loaded.len();

        let mut metadata: Metadata = loaded
            .into_iter()
            .filter(|(id, record)| is_current(id, record))
            .collect();
        let pruned = before - metadata.len();

        let candidates = self.find_new_files(&metadata);
        let thumbnail_config = ThumbnailConfig::from_config(&self.config.thumbnails);

        let registered: Vec<(FileId, FileRecord, ThumbnailOutcome)> = candidates
            .into_par_iter()
            .map(|c| self.register(c, &thumbnail_config))
            .collect();

        let discovered = registered.len();
        let mut thumbnails_generated = 0;
        let mut thumbnails_failed = 0;
        for (id, record, outcome) in registered {
            match outcome {
                ThumbnailOutcome::Generated => thumbnails_generated += 1,
                ThumbnailOutcome::Failed => thumbnails_failed += 1,
                ThumbnailOutcome::NotNeeded => {}
            }
            info!(id = %id, "discovered file");
            metadata.insert(id, record);
        }

        let persisted = match self.store.save(&metadata) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "reconciled metadata not persisted");
                false
            }
        };

        Reconciliation {
            metadata,
            pruned,
            discovered,
            thumbnails_generated,
            thumbnails_failed,
            persisted,
        }
    }

    /// Walk `<upload_root>/<folder>/<file>` in name order and keep the files
    /// whose identifier is not in `known`.
    fn find_new_files(&self, known: &Metadata) -> Vec<Candidate> {
        let root = &self.config.paths.upload_root;
        if !root.is_dir() {
            debug!(root = %root.display(), "upload root missing, nothing to discover");
            return Vec::new();
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let (Some(folder), Some(filename)) = (
                path.parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str()),
                path.file_name().and_then(|n| n.to_str()),
            ) else {
                warn!(path = %path.display(), "skipping file with non UTF-8 name");
                continue;
            };

            let modified = match entry
                .metadata()
                .map_err(io::Error::from)
                .and_then(|m| m.modified())
            {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "error processing file");
                    continue;
                }
            };

            let id = FileId::new(folder, filename, modified);
            if known.contains_key(&id) {
                continue;
            }
            found.push(Candidate {
                id,
                folder: folder.to_string(),
                filename: filename.to_string(),
                path: path.to_path_buf(),
                modified,
            });
        }
        found
    }

    /// Build the record for a new file, generating its thumbnail if it is an
    /// image without one.
    fn register(
        &self,
        candidate: Candidate,
        thumbnail_config: &ThumbnailConfig,
    ) -> (FileId, FileRecord, ThumbnailOutcome) {
        let is_image = self.config.is_image(&candidate.filename);
        let mut outcome = ThumbnailOutcome::NotNeeded;

        let thumbnail = is_image.then(|| {
            let name = naming::thumbnail_name(&candidate.folder, &candidate.filename);
            let dest = self.config.paths.thumbnail_dir.join(&name);
            if !dest.exists() {
                outcome = if generate_thumbnail(self.backend, &candidate.path, &dest, thumbnail_config)
                {
                    ThumbnailOutcome::Generated
                } else {
                    ThumbnailOutcome::Failed
                };
            }
            name
        });

        let content_hash = match fileinfo::hash_file(&candidate.path) {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(path = %candidate.path.display(), error = %e, "could not hash file");
                None
            }
        };

        let provenance = Provenance::unknown();
        let record = FileRecord {
            folder: candidate.folder,
            filename: candidate.filename,
            description: AUTO_DESCRIPTION.to_string(),
            upload_date: fileinfo::display_date(candidate.modified),
            file_size: fileinfo::file_size_label(&candidate.path),
            file_path: candidate.path,
            thumbnail,
            uploaded_by: provenance.uploaded_by,
            system_ip: provenance.system_ip,
            is_image,
            content_hash,
        };
        (candidate.id, record, outcome)
    }
}

/// Whether `record` still describes its file as it is on disk now.
fn is_current(id: &FileId, record: &FileRecord) -> bool {
    let modified = match fs::metadata(&record.file_path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(e) => {
            if e.kind() == io::ErrorKind::NotFound {
                info!(id = %id, "file no longer exists, removing from metadata");
            } else {
                warn!(id = %id, error = %e, "file unreadable, removing from metadata");
            }
            return false;
        }
    };
    if FileId::new(&record.folder, &record.filename, modified) != *id {
        info!(id = %id, "file modified since it was recorded, removing stale entry");
        return false;
    }
    true
}
