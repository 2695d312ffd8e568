//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the size of an image shrunk to fit inside a bounding box.
///
/// Aspect ratio is preserved and images are never enlarged: a source that
/// already fits is returned unchanged. Each edge is at least one pixel.
///
/// # Examples
/// ```
/// # use simple_drop::imaging::fit_within;
/// // 1200x800 landscape into 300x300 → 300x200
/// assert_eq!(fit_within((1200, 800), (300, 300)), (300, 200));
///
/// // Small images are left alone
/// assert_eq!(fit_within((120, 90), (300, 300)), (120, 90));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    if src_w == 0 || src_h == 0 || (src_w <= max_w && src_h <= max_h) {
        return source;
    }

    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}
