//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{Quality, ThumbnailParams};
use crate::config::ThumbnailsConfig;
use std::path::Path;
use tracing::{debug, warn};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Configuration for thumbnail generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailConfig {
    /// Bounding box `(width, height)`.
    pub max_size: (u32, u32),
    pub quality: Quality,
}

impl ThumbnailConfig {
    pub fn from_config(config: &ThumbnailsConfig) -> Self {
        Self {
            max_size: (config.max_size[0], config.max_size[1]),
            quality: Quality::new(config.quality),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_size: (300, 300),
            quality: Quality::default(),
        }
    }
}

/// Plan a thumbnail operation without executing it.
///
/// Useful for testing parameter generation.
pub fn plan_thumbnail(source: &Path, dest: &Path, config: &ThumbnailConfig) -> ThumbnailParams {
    ThumbnailParams {
        source: source.to_path_buf(),
        output: dest.to_path_buf(),
        max_width: config.max_size.0,
        max_height: config.max_size.1,
        quality: config.quality,
    }
}

/// Create a JPEG thumbnail at `dest`, creating its directory if needed.
pub fn create_thumbnail(
    backend: &impl ImageBackend,
    source: &Path,
    dest: &Path,
    config: &ThumbnailConfig,
) -> Result<Dimensions> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let params = plan_thumbnail(source, dest, config);
    backend.thumbnail(&params)
}

/// Best-effort wrapper around [`create_thumbnail`]: logs failures and reports
/// whether a preview now exists at `dest`.
pub fn generate_thumbnail(
    backend: &impl ImageBackend,
    source: &Path,
    dest: &Path,
    config: &ThumbnailConfig,
) -> bool {
    match create_thumbnail(backend, source, dest, config) {
        Ok(dims) => {
            debug!(
                source = %source.display(),
                width = dims.width,
                height = dims.height,
                "thumbnail written"
            );
            true
        }
        Err(e) => {
            warn!(source = %source.display(), error = %e, "thumbnail generation failed");
            false
        }
    }
}
