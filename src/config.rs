//! Server configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The user file is
//! laid over the stock defaults key by key, so it only needs the values it
//! wants to change. A missing file means stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! web_root = "public"          # Static files; the fallback handler serves from here
//!
//! [thumbnails]
//! images_directory = "images"  # Intercepted URL segment, relative to web_root
//! cache_directory = "_thumbs"  # Cache folder inside images_directory
//! default_size = [128, 128]    # Box used when no size is requested
//! background = "#ffffff"       # Padding color: #rgb, #rrggbb or #rrggbbaa
//! quality = 90                 # JPEG quality (1-100)
//! max_dimension = 4096         # Largest edge a request may ask for
//! max_parallel = 0             # Concurrent renders (0 = CPU cores)
//!
//! [logging]
//! filter = "simple_thumbs=info,tower_http=info"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::dispatch::DispatchOptions;
use crate::imaging::{Background, Quality, ThumbnailConfig};
use crate::paths::PathResolver;
use crate::size::TargetBox;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listener and static file settings.
    pub server: ServerConfig,
    /// Interception, sizing and rendering settings.
    pub thumbnails: ThumbnailsConfig,
    /// Log filter.
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thumbnails;
        if !(1..=100).contains(&t.quality) {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if t.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.max_dimension must be non-zero".into(),
            ));
        }
        if t.default_size.longest_edge() > t.max_dimension {
            return Err(ConfigError::Validation(format!(
                "thumbnails.default_size {} exceeds max_dimension {}",
                t.default_size, t.max_dimension
            )));
        }
        for (key, value) in [
            ("images_directory", &t.images_directory),
            ("cache_directory", &t.cache_directory),
        ] {
            if !is_single_segment(value) {
                return Err(ConfigError::Validation(format!(
                    "thumbnails.{key} must be a single directory name, got {value:?}"
                )));
            }
        }
        Ok(())
    }

    /// Path resolver rooted at the configured web root.
    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(
            &self.server.web_root,
            &self.thumbnails.images_directory,
            &self.thumbnails.cache_directory,
        )
    }
}

/// `true` for plain names like `images`; `false` for `a/b`, `..`, `/x`, ``.
fn is_single_segment(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served by the static fallback; the images directory lives inside it.
    pub web_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            web_root: PathBuf::from("public"),
        }
    }
}

/// Thumbnail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// URL segment (and directory under the web root) that is intercepted.
    pub images_directory: String,
    /// Cache folder name inside the images directory.
    pub cache_directory: String,
    /// Box used when a request carries no `size`.
    pub default_size: TargetBox,
    pub background: Background,
    pub quality: u32,
    pub max_dimension: u32,
    /// Concurrent renders. `0` means one per CPU core.
    pub max_parallel: usize,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            images_directory: "images".to_string(),
            cache_directory: "_thumbs".to_string(),
            default_size: TargetBox::DEFAULT,
            background: Background::WHITE,
            quality: 90,
            max_dimension: 4096,
            max_parallel: 0,
        }
    }
}

impl ThumbnailsConfig {
    pub fn thumbnail_config(&self) -> ThumbnailConfig {
        ThumbnailConfig {
            background: self.background,
            quality: Quality::new(self.quality),
        }
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            default_size: self.default_size,
            max_dimension: self.max_dimension,
            thumbnail: self.thumbnail_config(),
        }
    }

    /// Resolve the effective render concurrency.
    ///
    /// - `0` → use all available cores
    /// - `n` → use `n`
    pub fn effective_parallelism(&self) -> usize {
        match self.max_parallel {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives. `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "simple_thumbs=info,tower_http=info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Thumbs Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"
port = 8080

# Directory of static files. Requests that are not thumbnails are served
# from here unchanged.
web_root = "public"

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# URL segment that is intercepted: /images/photo.jpg?size=200x100
# Also the directory under web_root holding the source images.
images_directory = "images"

# Folder inside images_directory where thumbnails are cached,
# named <stem>_<width>x<height><ext>. Never cleaned automatically.
cache_directory = "_thumbs"

# Box used when a request has no size parameter, as [width, height].
default_size = [128, 128]

# Fill for the area around the scaled image: #rgb, #rrggbb or #rrggbbaa.
# Changing it does not refresh thumbnails already in the cache.
background = "#ffffff"

# JPEG encoding quality (1 = worst, 100 = best). Lossless formats ignore it.
quality = 90

# Largest width or height a request may ask for. Larger sizes get a 400.
max_dimension = 4096

# Thumbnails rendered at the same time. 0 = number of CPU cores.
max_parallel = 0

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing filter directives. The RUST_LOG environment variable overrides this.
filter = "simple_thumbs=info,tower_http=info"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.web_root, PathBuf::from("public"));
        assert_eq!(config.thumbnails.images_directory, "images");
        assert_eq!(config.thumbnails.cache_directory, "_thumbs");
        assert_eq!(config.thumbnails.default_size, TargetBox::new(128, 128).unwrap());
        assert_eq!(config.thumbnails.background, Background::WHITE);
        assert_eq!(config.thumbnails.quality, 90);
    }

    #[test]
    fn parse_partial_config() {
        let toml_str = r##"
[thumbnails]
default_size = [200, 100]
background = "#000"
"##;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.thumbnails.default_size, TargetBox::new(200, 100).unwrap());
        assert_eq!(config.thumbnails.background, Background([0, 0, 0, 255]));
        // Unspecified values keep defaults
        assert_eq!(config.thumbnails.quality, 90);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn zero_default_size_rejected_by_parser() {
        let result: Result<Config, _> = toml::from_str("[thumbnails]\ndefault_size = [0, 10]\n");
        assert!(result.is_err());
    }

    #[test]
    fn bad_background_rejected_by_parser() {
        let result: Result<Config, _> = toml::from_str("[thumbnails]\nbackground = \"white\"\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("invalid color"), "{err}");
    }

    #[test]
    fn thumbnail_config_carries_values() {
        let mut config = Config::default();
        config.thumbnails.quality = 55;
        config.thumbnails.background = Background([1, 2, 3, 4]);
        let t = config.thumbnails.thumbnail_config();
        assert_eq!(t.quality.value(), 55);
        assert_eq!(t.background, Background([1, 2, 3, 4]));
    }

    #[test]
    fn dispatch_options_follow_config() {
        let mut config = Config::default();
        config.thumbnails.max_dimension = 512;
        let opts = config.thumbnails.dispatch_options();
        assert_eq!(opts.max_dimension, 512);
        assert_eq!(opts.default_size, TargetBox::new(128, 128).unwrap());
    }

    #[test]
    fn resolver_uses_configured_directories() {
        let mut config = Config::default();
        config.server.web_root = PathBuf::from("/srv/www");
        config.thumbnails.images_directory = "media".into();
        config.thumbnails.cache_directory = "cache".into();

        let resolver = config.resolver();
        assert_eq!(resolver.cache_dir(), Path::new("/srv/www/media/cache"));
        assert!(resolver.matches("/media/a.jpg"));
    }

    // =========================================================================
    // Parallelism
    // =========================================================================

    #[test]
    fn effective_parallelism_auto() {
        let config = ThumbnailsConfig::default();
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(config.effective_parallelism(), cores);
    }

    #[test]
    fn effective_parallelism_explicit() {
        let config = ThumbnailsConfig {
            max_parallel: 3,
            ..ThumbnailsConfig::default()
        };
        assert_eq!(config.effective_parallelism(), 3);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.thumbnails.max_dimension, 4096);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        fs::write(
            &config_path,
            r##"
[server]
port = 9000

[thumbnails]
images_directory = "pics"
quality = 75
"##,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.thumbnails.images_directory, "pics");
        assert_eq!(config.thumbnails.quality, 75);
        // Unspecified values should be defaults
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.thumbnails.cache_directory, "_thumbs");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        fs::write(&config_path, "this is not valid toml [[[").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[thumbnails]\nquality = 0\n").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[thumbnails]
default_size = [128, 128]
quality = 90
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[thumbnails]
quality = 70
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let thumbs = merged.get("thumbnails").unwrap();
        assert_eq!(thumbs.get("quality").unwrap().as_integer(), Some(70));
        // default_size preserved from base
        assert_eq!(thumbs.get("default_size").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn merge_toml_array_replaced_whole() {
        let base: toml::Value = toml::from_str("size = [128, 128]").unwrap();
        let overlay: toml::Value = toml::from_str("size = [64]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("size").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[thumbnails]
qualty = 90
"#;
        let result: Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<Config, _> = toml::from_str("[thumbs]\nquality = 90\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[server]\nprot = 80\n").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_boundaries() {
        let mut config = Config::default();
        config.thumbnails.quality = 1;
        assert!(config.validate().is_ok());
        config.thumbnails.quality = 100;
        assert!(config.validate().is_ok());
        config.thumbnails.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_default_size_within_max_dimension() {
        let mut config = Config::default();
        config.thumbnails.max_dimension = 100;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.thumbnails.max_dimension = 128;
        assert!(config.validate().is_ok());
        config.thumbnails.max_dimension = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_directory_names() {
        for bad in ["", "a/b", "..", ".", "/abs", "a\\b"] {
            let mut config = Config::default();
            config.thumbnails.cache_directory = bad.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
        let mut config = Config::default();
        config.thumbnails.images_directory = "static-images".into();
        config.thumbnails.cache_directory = ".thumbs".into();
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // Stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let content = stock_config_toml();
        let config: Config = toml::from_str(content).unwrap();
        let defaults = Config::default();
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.server.web_root, defaults.server.web_root);
        assert_eq!(config.thumbnails.default_size, defaults.thumbnails.default_size);
        assert_eq!(config.thumbnails.background, defaults.thumbnails.background);
        assert_eq!(config.thumbnails.max_parallel, defaults.thumbnails.max_parallel);
        assert_eq!(config.logging.filter, defaults.logging.filter);
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        assert!(content.contains("[server]"));
        assert!(content.contains("[thumbnails]"));
        assert!(content.contains("[logging]"));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        assert!(val.get("server").is_some());
        assert!(val.get("thumbnails").is_some());
        assert!(val.get("logging").is_some());
    }

    #[test]
    fn stock_defaults_survive_merge_roundtrip() {
        let config = resolve_config(stock_defaults_value().unwrap(), None).unwrap();
        assert_eq!(config.thumbnails.background, Background::WHITE);
        assert_eq!(config.thumbnails.default_size, TargetBox::new(128, 128).unwrap());
    }
}
