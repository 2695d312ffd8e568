//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how*. They are the interface
//! between [`operations`](super::operations), which decides which preview to
//! create, and the [`backend`](super::backend), which does the pixel work.
//!
//! - [`Quality`]: JPEG quality (1–100, default 85). Clamped on construction.
//! - [`ThumbnailParams`]: source, output, bounding box, quality.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Parameters for a thumbnail operation (normalize + shrink to fit).
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Bounding box; the result fits inside with aspect ratio preserved.
    pub max_width: u32,
    pub max_height: u32,
    pub quality: Quality,
}
