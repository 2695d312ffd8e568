//! Name rules for everything that reaches the filesystem.
//!
//! User input arrives as a folder name and an original filename. Each goes
//! through exactly one allow-list filter before it is joined onto a storage
//! path. Nothing else is trusted.
//!
//! ## Folder names
//!
//! Accepted characters: Unicode letters and digits, space, `-`, `_`.
//! Everything else is dropped, then surrounding whitespace is trimmed. The
//! result must be 1 to [`MAX_FOLDER_LEN`] characters.
//!
//! - `"Trip 2024"` → `"Trip 2024"`
//! - `"../etc"` → `"etc"`
//! - `"  ..  "` → rejected (empty after filtering)
//!
//! ## Filenames
//!
//! Only the last path segment is kept (clients sometimes send
//! `C:\Users\me\photo.jpg`). Accented letters are folded to their ASCII
//! base (NFKD, combining marks dropped). Whitespace runs become `_`. Accepted characters:
//! ASCII letters and digits, `_`, `-`, `.`. Runs of dots collapse to one dot
//! and leading/trailing dots and underscores are stripped. The result must
//! still contain an extension.
//!
//! - `"My Photo.JPG"` → `"My_Photo.JPG"`
//! - `"../../etc/passwd"` → rejected (no extension)
//! - `"résumé.pdf"` → `"resume.pdf"`
//!
//! ## Collisions
//!
//! A taken name is probed as `stem_1.ext`, `stem_2.ext`, … until a free one
//! is found. See [`candidate_names`].

use unicode_normalization::UnicodeNormalization;

/// Longest accepted folder name, in characters.
pub const MAX_FOLDER_LEN: usize = 100;

/// Filter a user-supplied folder name. Returns `None` when nothing usable
/// remains.
pub fn sanitize_folder_name(raw: &str) -> Option<String> {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect();
    let trimmed = filtered.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_FOLDER_LEN {
        return None;
    }
    Some(trimmed.to_string())
}

/// Filter a user-supplied filename. Returns `None` when the result is empty or
/// has no extension.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last_segment = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    let mut out = String::with_capacity(last_segment.len());
    let mut in_space = false;
    for c in last_segment.nfkd() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
            out.push(c);
        } else if c == '.' && !out.ends_with('.') {
            out.push(c);
        }
    }

    let cleaned = out.trim_matches(|c| c == '.' || c == '_');
    let (stem, ext) = cleaned.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(cleaned.to_string())
}

/// Name of the preview file for `filename` inside `folder`.
pub fn thumbnail_name(folder: &str, filename: &str) -> String {
    format!("{folder}_{filename}")
}

/// Check a requested thumbnail name before it is joined onto the thumbnail
/// directory.
///
/// Thumbnail names legitimately contain spaces (folder names do), so this is
/// a deny-list for the few shapes that could escape the directory rather than
/// a re-run of [`sanitize_filename`].
pub fn is_safe_thumbnail_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

/// Build `stem_N.ext` from a sanitized filename.
pub fn suffixed_name(filename: &str, n: u32) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{n}.{ext}"),
        None => format!("{filename}_{n}"),
    }
}

/// The original name followed by `stem_1.ext`, `stem_2.ext`, … without end.
pub fn candidate_names(filename: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(filename.to_string()).chain((1..).map(move |n| suffixed_name(filename, n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Folder names
    // =========================================================================

    #[test]
    fn folder_keeps_spaces_and_dashes() {
        assert_eq!(
            sanitize_folder_name("Trip 2024").as_deref(),
            Some("Trip 2024")
        );
        assert_eq!(
            sanitize_folder_name("my_folder-1").as_deref(),
            Some("my_folder-1")
        );
    }

    #[test]
    fn folder_trims_after_filtering() {
        assert_eq!(sanitize_folder_name("  ~Holiday!  ").as_deref(), Some("Holiday"));
    }

    #[test]
    fn folder_traversal_is_defused() {
        assert_eq!(sanitize_folder_name("../etc").as_deref(), Some("etc"));
        assert_eq!(sanitize_folder_name(".."), None);
        assert_eq!(sanitize_folder_name("/"), None);
    }

    #[test]
    fn folder_keeps_unicode_letters() {
        assert_eq!(sanitize_folder_name("Café").as_deref(), Some("Café"));
    }

    #[test]
    fn folder_rejects_empty_and_too_long() {
        assert_eq!(sanitize_folder_name(""), None);
        assert_eq!(sanitize_folder_name("   "), None);
        assert!(sanitize_folder_name(&"a".repeat(MAX_FOLDER_LEN)).is_some());
        assert_eq!(sanitize_folder_name(&"a".repeat(MAX_FOLDER_LEN + 1)), None);
    }

    // =========================================================================
    // Filenames
    // =========================================================================

    #[test]
    fn filename_plain_passes_through() {
        assert_eq!(sanitize_filename("photo.jpg").as_deref(), Some("photo.jpg"));
    }

    #[test]
    fn filename_whitespace_becomes_underscore() {
        assert_eq!(
            sanitize_filename("My  Summer Photo.JPG").as_deref(),
            Some("My_Summer_Photo.JPG")
        );
    }

    #[test]
    fn filename_keeps_last_path_segment() {
        assert_eq!(
            sanitize_filename(r"C:\Users\me\scan.pdf").as_deref(),
            Some("scan.pdf")
        );
        assert_eq!(
            sanitize_filename("../../uploads/x.png").as_deref(),
            Some("x.png")
        );
    }

    #[test]
    fn filename_without_extension_rejected() {
        assert_eq!(sanitize_filename("README"), None);
        assert_eq!(sanitize_filename("../../etc/passwd"), None);
        assert_eq!(sanitize_filename(".bashrc"), None);
        assert_eq!(sanitize_filename("name."), None);
    }

    #[test]
    fn filename_folds_accents_to_ascii() {
        assert_eq!(sanitize_filename("résumé.pdf").as_deref(), Some("resume.pdf"));
        assert_eq!(sanitize_filename("Ångström Über.txt").as_deref(), Some("Angstrom_Uber.txt"));
        assert_eq!(sanitize_filename("ﬁle.txt").as_deref(), Some("file.txt"));
    }

    #[test]
    fn filename_drops_unfoldable_characters() {
        assert_eq!(sanitize_filename("照片.jpg"), None);
        assert_eq!(sanitize_filename("photo✓.jpg").as_deref(), Some("photo.jpg"));
    }

    #[test]
    fn filename_collapses_dot_runs() {
        assert_eq!(sanitize_filename("a...b.txt").as_deref(), Some("a.b.txt"));
        assert_eq!(sanitize_filename("..hidden..png").as_deref(), Some("hidden.png"));
    }

    #[test]
    fn sanitized_names_never_traverse() {
        let nasty = [
            "..", "../", "..\\..\\", "/etc/passwd", "a/../../b.txt", "....//....//x.jpg",
            "..%2f..%2fx.jpg", "\0.jpg", "con.txt/..", " . . .jpg",
        ];
        for raw in nasty {
            if let Some(name) = sanitize_filename(raw) {
                assert!(!name.contains(".."), "{raw:?} -> {name:?}");
                assert!(!name.contains('/') && !name.contains('\\'), "{raw:?} -> {name:?}");
                assert!(!name.is_empty());
            }
            if let Some(folder) = sanitize_folder_name(raw) {
                assert!(!folder.contains('.') && !folder.contains('/'), "{raw:?} -> {folder:?}");
                assert!(!folder.is_empty());
            }
        }
    }

    // =========================================================================
    // Thumbnails and collisions
    // =========================================================================

    #[test]
    fn thumbnail_name_joins_with_underscore() {
        assert_eq!(
            thumbnail_name("Trip 2024", "photo.jpg"),
            "Trip 2024_photo.jpg"
        );
    }

    #[test]
    fn thumbnail_name_safety() {
        assert!(is_safe_thumbnail_name("Trip 2024_photo.jpg"));
        assert!(!is_safe_thumbnail_name(""));
        assert!(!is_safe_thumbnail_name("../photo_metadata.json"));
        assert!(!is_safe_thumbnail_name("a/b.jpg"));
        assert!(!is_safe_thumbnail_name(r"a\b.jpg"));
        assert!(!is_safe_thumbnail_name(".hidden"));
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(suffixed_name("photo.jpg", 1), "photo_1.jpg");
        assert_eq!(suffixed_name("archive.tar.gz", 2), "archive.tar_2.gz");
    }

    #[test]
    fn candidates_start_with_original() {
        let names: Vec<String> = candidate_names("photo.jpg").take(4).collect();
        assert_eq!(
            names,
            vec!["photo.jpg", "photo_1.jpg", "photo_2.jpg", "photo_3.jpg"]
        );
    }
}
