//! CLI output formatting for the `scan`, `list` and `check` commands.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Each stored file is
//! shown by folder and name; storage paths and previews are secondary context
//! on indented lines.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Folders
//! 001 Trip 2024 (2 files)
//!     001 photo.jpg
//!         Thumbnail: Trip 2024_photo.jpg
//!     002 photo_1.jpg
//!         Thumbnail: Trip 2024_photo_1.jpg
//!         Description: Sunset at the pier
//! 002 docs (1 file)
//!     001 notes.txt
//!
//! 3 files: 1 discovered, 0 pruned
//! Thumbnails: 1 generated, 0 failed
//! ```
//!
//! ## List
//!
//! ```text
//! 2024-06-01 10:00:00  Trip 2024/photo_1.jpg  (1.20 MB, studio-pc)
//! 2024-06-01 09:58:12  Trip 2024/photo.jpg  (1.18 MB, studio-pc)
//!
//! 2 files in 1 folder from 1 system
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure and do no I/O.

use crate::config::ServerConfig;
use crate::gallery::GalleryListing;
use crate::reconcile::Reconciliation;
use crate::types::FileRecord;
use std::collections::BTreeMap;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `1 file`, `2 files`.
fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Scan
// ============================================================================

/// Format a reconciliation pass as a folder/file inventory plus totals.
pub fn format_scan_output(result: &Reconciliation) -> Vec<String> {
    let mut by_folder: BTreeMap<&str, Vec<&FileRecord>> = BTreeMap::new();
    for record in result.metadata.values() {
        by_folder.entry(&record.folder).or_default().push(record);
    }

    let mut lines = Vec::new();
    if !by_folder.is_empty() {
        lines.push("Folders".to_string());
    }
    for (i, (folder, mut records)) in by_folder.into_iter().enumerate() {
        records.sort_by(|a, b| a.filename.cmp(&b.filename));
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            folder,
            plural(records.len(), "file")
        ));
        for (j, record) in records.iter().enumerate() {
            lines.push(format!(
                "{}{} {}",
                indent(1),
                format_index(j + 1),
                record.filename
            ));
            if let Some(thumb) = &record.thumbnail {
                lines.push(format!("{}Thumbnail: {}", indent(2), thumb));
            }
            if !record.description.is_empty() {
                lines.push(format!(
                    "{}Description: {}",
                    indent(2),
                    truncate_desc(&record.description, 60)
                ));
            }
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{}: {} discovered, {} pruned",
        plural(result.metadata.len(), "file"),
        result.discovered,
        result.pruned
    ));
    lines.push(format!(
        "Thumbnails: {} generated, {} failed",
        result.thumbnails_generated, result.thumbnails_failed
    ));
    if !result.persisted {
        lines.push("Warning: metadata could not be saved".to_string());
    }
    lines
}

pub fn print_scan_output(result: &Reconciliation) {
    for line in format_scan_output(result) {
        println!("{}", line);
    }
}

// ============================================================================
// List
// ============================================================================

/// Format the gallery listing, newest first, followed by the stats line.
pub fn format_listing(listing: &GalleryListing) -> Vec<String> {
    let mut lines: Vec<String> = listing
        .files
        .iter()
        .map(|item| {
            format!(
                "{}  {}/{}  ({}, {})",
                item.date, item.folder, item.name, item.file_size, item.uploaded_by
            )
        })
        .collect();

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let stats = &listing.stats;
    lines.push(format!(
        "{} in {} from {}",
        plural(stats.total_files, "file"),
        plural(stats.total_folders, "folder"),
        plural(stats.total_systems, "system")
    ));
    lines
}

pub fn print_listing(listing: &GalleryListing) {
    for line in format_listing(listing) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the resolved configuration for `check`.
pub fn format_config_check(config: &ServerConfig) -> Vec<String> {
    let [w, h] = config.thumbnails.max_size;
    let limit = match config.server.max_upload_bytes {
        0 => "unlimited".to_string(),
        n => crate::fileinfo::human_size(n),
    };
    vec![
        "Paths".to_string(),
        format!("{}Uploads: {}", indent(1), config.paths.upload_root.display()),
        format!("{}Thumbnails: {}", indent(1), config.paths.thumbnail_dir.display()),
        format!("{}Metadata: {}", indent(1), config.paths.metadata_file.display()),
        format!("{}Index page: {}", indent(1), config.paths.index_page.display()),
        "Server".to_string(),
        format!("{}Bind: {}", indent(1), config.server.bind),
        format!("{}Upload limit: {}", indent(1), limit),
        "Thumbnails".to_string(),
        format!("{}Max size: {}x{}", indent(1), w, h),
        format!("{}Quality: {}", indent(1), config.thumbnails.quality),
        format!(
            "{}Image types: {}",
            indent(1),
            config.extensions.images.join(", ")
        ),
    ]
}

pub fn print_config_check(config: &ServerConfig) {
    for line in format_config_check(config) {
        println!("{}", line);
    }
}
