//! Small facts about files on disk: content hash, display size, display
//! timestamp and extension classification.
//!
//! Everything here is either pure or a single read of the file; callers decide
//! whether a failure matters. Sizes and dates are pre-rendered strings because
//! that is how they are stored in the metadata index and shown in the gallery.

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

/// Placeholder shown when a value could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// Display format for upload dates. Lexicographic order equals chronological
/// order, which the gallery relies on when sorting.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

/// SHA-256 hash of a file's contents, returned as a hex string.
///
/// Streams the file in 64 KiB chunks so large uploads are not read into
/// memory at once.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Render a byte count with two decimals and a binary-scaled unit.
///
/// ```
/// # use simple_drop::fileinfo::human_size;
/// assert_eq!(human_size(512), "512.00 B");
/// assert_eq!(human_size(1536), "1.50 KB");
/// ```
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in SIZE_UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}

/// Human-readable size of the file at `path`, or [`UNKNOWN`] if it can't be
/// read.
pub fn file_size_label(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => human_size(meta.len()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read file size");
            UNKNOWN.to_string()
        }
    }
}

/// Format a point in time as a local `YYYY-MM-DD HH:MM:SS` string.
pub fn display_date(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(DATE_FORMAT).to_string()
}

/// Fractional Unix seconds used inside file identifiers.
///
/// Uses Rust's shortest round-trip float formatting, so the same instant
/// always renders to the same string.
pub fn timestamp_key(time: SystemTime) -> String {
    let secs = match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    };
    format!("{secs}")
}

/// Lowercased extension of a filename, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Whether `filename`'s extension is one of `extensions` (case-insensitive).
pub fn has_extension(filename: &str, extensions: &[String]) -> bool {
    extension_of(filename)
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
}
