//! Server configuration module.
//!
//! Handles loading, validating, and layering `config.toml`. Every component
//! receives the resolved [`ServerConfig`] (or the section it needs) at
//! construction time; nothing reads process-wide constants.
//!
//! ## Config File Location
//!
//! `config.toml` lives in the directory passed via `--config` (default: the
//! working directory). It is optional. When absent, stock defaults apply.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! upload_root = "uploads"              # One subdirectory per folder
//! thumbnail_dir = "thumbnails"         # Flat, keyed by folder_filename
//! metadata_file = "photo_metadata.json"
//! index_page = "index.html"            # Served at GET /
//!
//! [server]
//! bind = "0.0.0.0:8000"
//! max_upload_bytes = 0                 # 0 = unlimited
//!
//! [thumbnails]
//! max_size = [300, 300]                # Bounding box, aspect preserved
//! quality = 85                         # JPEG quality (1-100)
//!
//! [extensions]
//! images = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "svg"]
//!
//! [processing]
//! max_processes = 4                    # Thumbnail workers (omit for auto)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Storage locations.
    pub paths: PathsConfig,
    /// Listener and request limits.
    pub server: HttpConfig,
    /// Thumbnail bounding box and encoding quality.
    pub thumbnails: ThumbnailsConfig,
    /// Extension sets used for classification.
    pub extensions: ExtensionsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ServerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnails.quality == 0 || self.thumbnails.quality > 100 {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if self.thumbnails.max_size[0] == 0 || self.thumbnails.max_size[1] == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.max_size values must be non-zero".into(),
            ));
        }
        if self.extensions.images.is_empty() {
            return Err(ConfigError::Validation(
                "extensions.images must not be empty".into(),
            ));
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            )));
        }
        Ok(())
    }

    /// Return a copy with every relative path anchored at `base`, made
    /// absolute against the working directory.
    ///
    /// Used by the binary so that `--config some/dir` resolves storage paths
    /// next to the config file, and so stored file paths are absolute.
    pub fn anchored_at(mut self, base: &Path) -> Self {
        let base = std::path::absolute(base).unwrap_or_else(|_| base.to_path_buf());
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.paths.upload_root);
        anchor(&mut self.paths.thumbnail_dir);
        anchor(&mut self.paths.metadata_file);
        anchor(&mut self.paths.index_page);
        self
    }

    /// Whether `filename` has one of the configured image extensions.
    pub fn is_image(&self, filename: &str) -> bool {
        crate::fileinfo::has_extension(filename, &self.extensions.images)
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub upload_root: PathBuf,
    pub thumbnail_dir: PathBuf,
    pub metadata_file: PathBuf,
    pub index_page: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("uploads"),
            thumbnail_dir: PathBuf::from("thumbnails"),
            metadata_file: PathBuf::from("photo_metadata.json"),
            index_page: PathBuf::from("index.html"),
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Maximum request body size in bytes. `0` disables the limit.
    pub max_upload_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            max_upload_bytes: 0,
        }
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Bounding box as `[width, height]`.
    pub max_size: [u32; 2],
    /// JPEG quality.
    pub quality: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            max_size: [300, 300],
            quality: 85,
        }
    }
}

/// Extension sets, lowercase and without the leading dot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionsConfig {
    pub images: Vec<String>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            images: ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "svg"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel thumbnail workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ServerConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. Paths are returned as written; see
/// [`ServerConfig::anchored_at`].
pub fn load_config(dir: &Path) -> Result<ServerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Drop Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Relative paths are resolved against
# the directory containing this file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[paths]
# Uploaded files land in <upload_root>/<folder>/<filename>.
upload_root = "uploads"

# Generated JPEG previews, named "<folder>_<filename>".
thumbnail_dir = "thumbnails"

# JSON index of every known file. Rebuilt from disk if it gets corrupted.
metadata_file = "photo_metadata.json"

# Static page served at GET /.
index_page = "index.html"

# ---------------------------------------------------------------------------
# HTTP
# ---------------------------------------------------------------------------
[server]
bind = "0.0.0.0:8000"

# Largest accepted request body in bytes. 0 disables the limit.
max_upload_bytes = 0

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Bounding box as [width, height]. Aspect ratio is preserved.
max_size = [300, 300]

# JPEG encoding quality (1 = worst, 100 = best).
quality = 85

# ---------------------------------------------------------------------------
# Classification
# ---------------------------------------------------------------------------
[extensions]
# Files with these extensions are treated as images and get thumbnails.
images = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "svg"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel thumbnail workers during a rescan.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_paths() {
        let config = ServerConfig::default();
        assert_eq!(config.paths.upload_root, PathBuf::from("uploads"));
        assert_eq!(config.paths.thumbnail_dir, PathBuf::from("thumbnails"));
        assert_eq!(
            config.paths.metadata_file,
            PathBuf::from("photo_metadata.json")
        );
    }

    #[test]
    fn default_thumbnail_settings() {
        let config = ServerConfig::default();
        assert_eq!(config.thumbnails.max_size, [300, 300]);
        assert_eq!(config.thumbnails.quality, 85);
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[thumbnails]
quality = 70
"#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.thumbnails.quality, 70);
        assert_eq!(config.thumbnails.max_size, [300, 300]);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn is_image_uses_configured_extensions() {
        let mut config = ServerConfig::default();
        assert!(config.is_image("photo.JPG"));
        assert!(!config.is_image("notes.txt"));

        config.extensions.images = vec!["txt".into()];
        assert!(config.is_image("notes.txt"));
        assert!(!config.is_image("photo.jpg"));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.server.max_upload_bytes, 0);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[paths]
upload_root = "/srv/drop"

[server]
max_upload_bytes = 1048576
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.paths.upload_root, PathBuf::from("/srv/drop"));
        assert_eq!(config.server.max_upload_bytes, 1_048_576);
        // Unspecified values keep defaults
        assert_eq!(config.paths.thumbnail_dir, PathBuf::from("thumbnails"));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "not toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[thumbnails]\nmax_sise = [10, 10]\n",
        )
        .unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn validate_quality_out_of_range() {
        let mut config = ServerConfig::default();
        config.thumbnails.quality = 101;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
        config.thumbnails.quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_max_size() {
        let mut config = ServerConfig::default();
        config.thumbnails.max_size = [0, 300];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bad_bind_address() {
        let mut config = ServerConfig::default();
        config.server.bind = "localhost".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_image_extensions() {
        let mut config = ServerConfig::default();
        config.extensions.images.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn anchored_at_only_touches_relative_paths() {
        let mut config = ServerConfig::default();
        config.paths.metadata_file = PathBuf::from("/var/lib/drop/meta.json");
        let config = config.anchored_at(Path::new("/srv"));
        assert_eq!(config.paths.upload_root, PathBuf::from("/srv/uploads"));
        assert_eq!(
            config.paths.metadata_file,
            PathBuf::from("/var/lib/drop/meta.json")
        );
    }

    #[test]
    fn anchored_at_relative_base_yields_absolute_paths() {
        let config = ServerConfig::default().anchored_at(Path::new("."));
        let cwd = std::env::current_dir().unwrap();
        assert!(config.paths.upload_root.is_absolute());
        assert!(config.paths.metadata_file.is_absolute());
        assert!(config.paths.upload_root.starts_with(&cwd));
        assert!(config.paths.upload_root.ends_with("uploads"));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_array_replaced_not_appended() {
        let base: toml::Value = toml::from_str("list = [1, 2]\n").unwrap();
        let overlay: toml::Value = toml::from_str("list = [9]\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["list"].as_array().map(|a| a.len()), Some(1));
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ServerConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = ServerConfig::default();
        assert_eq!(config.paths.upload_root, defaults.paths.upload_root);
        assert_eq!(config.thumbnails.max_size, defaults.thumbnails.max_size);
        assert_eq!(config.extensions.images, defaults.extensions.images);
        assert_eq!(config.server.bind, defaults.server.bind);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
