//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the one pixel operation the service
//! needs: turning a source image into a bounded JPEG preview. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend); tests use the
//! [`MockBackend`](tests::MockBackend) below.

use super::params::ThumbnailParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared across rayon workers during a rescan.
pub trait ImageBackend: Sync {
    /// Decode `params.source`, normalize, shrink into the bounding box and
    /// write a JPEG to `params.output`. Returns the written dimensions.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<Dimensions, BackendError>;
}
