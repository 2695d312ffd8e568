//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Normalize** | alpha composited onto white, other modes → RGB8 |
//! | **Thumbnail** | `resize_exact` (Lanczos3) into a bounding box → JPEG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::fit_within;
pub use operations::{ThumbnailConfig, create_thumbnail, generate_thumbnail, plan_thumbnail};
pub use params::{Quality, ThumbnailParams};
pub use rust_backend::RustBackend;
