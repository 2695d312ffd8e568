//! Gallery listing: the reconciled index shaped for display.
//!
//! [`list`] reconciles first so the listing always reflects the disk, then
//! hands the result to [`build_listing`], which is pure.

use crate::imaging::ImageBackend;
use crate::reconcile::Reconciler;
use crate::types::Metadata;
use serde::Serialize;
use std::collections::BTreeSet;

/// One file as shown in the gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryItem {
    pub id: String,
    pub folder: String,
    pub name: String,
    pub description: String,
    pub date: String,
    pub thumbnail: Option<String>,
    pub uploaded_by: String,
    pub system_ip: String,
    pub file_size: String,
    pub is_image: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GalleryStats {
    pub total_files: usize,
    pub total_folders: usize,
    /// Distinct `uploaded_by` values.
    pub total_systems: usize,
}

/// Newest first; equal dates fall back to identifier order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GalleryListing {
    pub files: Vec<GalleryItem>,
    pub stats: GalleryStats,
}

/// Reconcile, then build the listing.
pub fn list<B: ImageBackend>(reconciler: &Reconciler<'_, B>) -> GalleryListing {
    build_listing(&reconciler.reconcile().metadata)
}

pub fn build_listing(metadata: &Metadata) -> GalleryListing {
    let mut folders = BTreeSet::new();
    let mut systems = BTreeSet::new();

    // Metadata iterates in id order, so a stable sort on date alone keeps
    // ties in id order.
    let mut files: Vec<GalleryItem> = metadata
        .iter()
        .map(|(id, record)| {
            folders.insert(record.folder.as_str());
            systems.insert(record.uploaded_by.as_str());
            GalleryItem {
                id: id.to_string(),
                folder: record.folder.clone(),
                name: record.filename.clone(),
                description: record.description.clone(),
                date: record.upload_date.clone(),
                thumbnail: record.thumbnail.clone(),
                uploaded_by: record.uploaded_by.clone(),
                system_ip: record.system_ip.clone(),
                file_size: record.file_size.clone(),
                is_image: record.is_image,
            }
        })
        .collect();
    files.sort_by(|a, b| b.date.cmp(&a.date));

    let stats = GalleryStats {
        total_files: files.len(),
        total_folders: folders.len(),
        total_systems: systems.len(),
    };
    GalleryListing { files, stats }
}
