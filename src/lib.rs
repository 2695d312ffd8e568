//! # Simple Drop
//!
//! A small file-upload server. Clients drop files into named folders, images
//! get a JPEG preview, and a gallery endpoint lists everything with a few
//! aggregate statistics.
//!
//! # Architecture: Disk First, Index Second
//!
//! The upload directory is the source of truth. The JSON index next to it is
//! a cache that every listing re-validates:
//!
//! ```text
//! POST /upload  →  upload     →  uploads/<folder>/<file> + thumbnail + index entry
//! GET /gallery  →  reconcile  →  prune missing, discover new, save index
//!               →  gallery    →  sorted items + stats
//! ```
//!
//! This keeps the moving parts independent:
//!
//! - **Recovery**: a deleted, corrupted or hand-edited index is rebuilt from
//!   disk on the next listing, never trusted over it.
//! - **Out-of-band files**: files copied straight into a folder show up as
//!   "Auto-detected file" entries with generated previews.
//! - **Testability**: storage rules, naming and listing are plain functions
//!   over a [`config::ServerConfig`]; image work sits behind
//!   [`imaging::ImageBackend`] so tests run without decoding pixels.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | Atomic load/save of the JSON index, with corruption backup |
//! | [`reconcile`] | Brings the index in line with the upload tree |
//! | [`upload`] | Validates, names and stores one uploaded file |
//! | [`gallery`] | Listing view and statistics over the reconciled index |
//! | [`imaging`] | Pure-Rust thumbnail generation (alpha flattening, Lanczos3, JPEG) |
//! | [`naming`] | Folder and filename allow-lists, duplicate suffixes, preview names |
//! | [`fileinfo`] | Hashing, display sizes and dates, extension classification |
//! | [`provenance`] | Host name and address recorded with each upload |
//! | [`types`] | Persisted record types (`FileId`, `FileRecord`, `Metadata`) |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`server`] | axum router, handlers and error responses |
//! | [`output`] | CLI output formatting for `scan`, `list` and `check` |
//!
//! # Design Decisions
//!
//! ## Best-Effort Side Effects
//!
//! Once an uploaded file is on disk the upload has succeeded. A preview that
//! fails to render or an index that fails to save is logged, and the next
//! reconciliation fills the gap. Nothing short of a write failure for the
//! file itself turns into an error response.
//!
//! ## No Index Locking
//!
//! Concurrent requests each load, modify and save the index; the last writer
//! wins. A lost entry is only lost until the next listing rediscovers it from
//! disk. File names themselves are claimed with a no-clobber move, so two
//! uploads can never land in the same file.
//!
//! ## Pure-Rust Imaging
//!
//! Previews are produced with the `image` crate alone: no ImageMagick, no
//! system libraries. Formats without a compiled-in decoder (SVG) are stored
//! and listed without a preview.

pub mod config;
pub mod fileinfo;
pub mod gallery;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod provenance;
pub mod reconcile;
pub mod server;
pub mod store;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
