//! Pure Rust image processing backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Alpha flattening | [`flatten_onto_white`] (per-pixel blend) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! SVG and anything else without a compiled-in decoder fails with
//! [`BackendError::ProcessingFailed`]; callers treat that as "no preview".

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::fit_within;
use super::params::ThumbnailParams;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, sniffing the format from content so a
/// mislabeled extension still decodes.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Bring any color type into something a JPEG can hold.
///
/// - Anything with an alpha channel (RGBA, LA, and palette images, which the
///   decoder expands to RGBA) is composited onto opaque white.
/// - 8-bit grayscale is kept as is.
/// - Everything else (16-bit, float) is converted to 8-bit RGB.
pub fn flatten_onto_white(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        let flattened = RgbImage::from_fn(w, h, |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let alpha = a as u32;
            let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
            Rgb([blend(r), blend(g), blend(b)])
        });
        return DynamicImage::ImageRgb8(flattened);
    }
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => img,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Encode as JPEG at the given quality.
fn save_jpeg(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100) as u8);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

impl ImageBackend for RustBackend {
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<Dimensions, BackendError> {
        let img = flatten_onto_white(load_image(&params.source)?);

        let (w, h) = fit_within(
            (img.width(), img.height()),
            (params.max_width, params.max_height),
        );
        let resized = if (w, h) == (img.width(), img.height()) {
            img
        } else {
            img.resize_exact(w, h, FilterType::Lanczos3)
        };

        save_jpeg(&resized, &params.output, params.quality.value())?;
        Ok(Dimensions {
            width: resized.width(),
            height: resized.height(),
        })
    }
}
