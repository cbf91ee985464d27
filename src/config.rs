//! Configuration types for the background removal service

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File extensions the service accepts, lowercase and without the leading dot
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Default longer-side ceiling applied when staging an upload
pub const DEFAULT_MAX_IMAGE_SIZE: u32 = 1920;

/// Default longer-side ceiling enforced right before segmentation
pub const DEFAULT_SAFETY_MAX_IMAGE_SIZE: u32 = 4000;

/// Output image format, derived from the output file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    Png,
    /// JPEG (no transparency, composited over the background colour)
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl OutputFormat {
    /// Determine the format implied by a file extension (case-insensitive)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Determine the format implied by a path's extension
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the format can carry an alpha channel
    #[must_use]
    pub fn supports_transparency(self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }
}

/// Solid colour used when flattening transparency into an opaque format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl BackgroundColor {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Parse a colour name (`white`, `black`) or a hex string (`#RRGGBB` / `#RGB`)
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        match value.to_ascii_lowercase().as_str() {
            "white" => return Ok(Self::white()),
            "black" => return Ok(Self::new(0, 0, 0)),
            _ => {},
        }

        let hex = value.trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BgRemovalError::invalid_config(format!(
                "Invalid background colour '{}'",
                value
            )));
        }

        let component = |range: std::ops::Range<usize>, scale: u8| -> Result<u8> {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .map(|v| v * scale)
                .ok_or_else(|| {
                    BgRemovalError::invalid_config(format!("Invalid background colour '{}'", value))
                })
        };

        match hex.len() {
            6 => Ok(Self::new(component(0..2, 1)?, component(2..4, 1)?, component(4..6, 1)?)),
            3 => Ok(Self::new(component(0..1, 17)?, component(1..2, 17)?, component(2..3, 17)?)),
            _ => Err(BgRemovalError::invalid_config(
                "Colour must be a name or in #RRGGBB or #RGB format",
            )),
        }
    }
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self::white()
    }
}

/// Alpha matting parameters, passed through to the segmenter unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MattingOptions {
    /// Refine mask edges using the thresholds below
    pub alpha_matting: bool,
    /// Alpha at or above this is treated as certain foreground
    pub foreground_threshold: u8,
    /// Alpha at or below this is treated as certain background
    pub background_threshold: u8,
    /// Erosion radius (pixels) applied to the certain-foreground region
    pub erode_size: u32,
}

impl Default for MattingOptions {
    fn default() -> Self {
        Self {
            alpha_matting: false,
            foreground_threshold: 240,
            background_threshold: 10,
            erode_size: 10,
        }
    }
}

impl MattingOptions {
    #[must_use]
    pub fn with_alpha_matting(mut self, enabled: bool) -> Self {
        self.alpha_matting = enabled;
        self
    }
}

/// Retention age for a number of hours, saturating at `u64::MAX` seconds
#[must_use]
pub fn retention_from_hours(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(60 * 60))
}

/// Normalize a user-supplied comma-separated extension list.
///
/// Returns the accepted extensions and the entries that are not supported by
/// the service. Callers warn about the rejected entries and drop them.
#[must_use]
pub fn parse_format_list(formats: &str) -> (BTreeSet<String>, Vec<String>) {
    let mut accepted = BTreeSet::new();
    let mut rejected = Vec::new();

    for entry in formats.split(',') {
        let ext = entry.trim().trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() {
            continue;
        }
        if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            accepted.insert(ext);
        } else if !rejected.contains(&ext) {
            rejected.push(ext);
        }
    }

    (accepted, rejected)
}

/// Service configuration shared by the server and batch entry points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root directory for staged input/output files
    pub temp_dir: PathBuf,
    /// Accepted upload extensions (lowercase, no dot)
    pub supported_formats: BTreeSet<String>,
    /// Maximum upload size in bytes
    pub max_file_size: usize,
    /// Longer-side ceiling applied at staging time
    pub max_image_size: u32,
    /// Longer-side ceiling applied right before segmentation
    pub safety_max_image_size: u32,
    /// JPEG quality (0-100)
    pub jpeg_quality: u8,
    /// Colour used when flattening transparency into JPEG
    pub background_color: BackgroundColor,
    /// Number of concurrent segmentation workers
    pub workers: usize,
    /// Age after which staged files are deleted
    pub retention_max_age: Duration,
    /// Interval between periodic retention sweeps
    pub sweep_interval: Duration,
    /// Matting parameters used for server submissions
    pub matting: MattingOptions,
    /// Bind address for the HTTP server
    pub host: String,
    /// Bind port for the HTTP server
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            supported_formats: SUPPORTED_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            safety_max_image_size: DEFAULT_SAFETY_MAX_IMAGE_SIZE,
            jpeg_quality: 95,
            background_color: BackgroundColor::white(),
            workers: 4,
            retention_max_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            matting: MattingOptions::default(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServiceConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::new()
    }

    /// Whether a declared filename carries a supported extension
    #[must_use]
    pub fn is_supported_filename(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.supported_formats.contains(&ext.to_ascii_lowercase()))
    }

    /// Overlay `BGREMOVE_*` environment variables on top of this configuration.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn apply_env(mut self) -> Self {
        fn read<T: std::str::FromStr>(key: &str) -> Option<T> {
            let raw = std::env::var(key).ok()?;
            match raw.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "Ignoring unparseable environment value");
                    None
                },
            }
        }

        if let Ok(dir) = std::env::var("BGREMOVE_TEMP_DIR") {
            self.temp_dir = PathBuf::from(dir);
        }
        if let Ok(host) = std::env::var("BGREMOVE_HOST") {
            self.host = host;
        }
        if let Some(port) = read::<u16>("BGREMOVE_PORT") {
            self.port = port;
        }
        if let Some(workers) = read::<usize>("BGREMOVE_WORKERS") {
            self.workers = workers;
        }
        if let Some(size) = read::<usize>("BGREMOVE_MAX_FILE_SIZE") {
            self.max_file_size = size;
        }
        if let Some(size) = read::<u32>("BGREMOVE_MAX_IMAGE_SIZE") {
            self.max_image_size = size;
        }
        if let Some(hours) = read::<u64>("BGREMOVE_RETENTION_HOURS") {
            self.retention_max_age = retention_from_hours(hours);
        }
        if let Ok(color) = std::env::var("BGREMOVE_BACKGROUND_COLOR") {
            match BackgroundColor::parse(&color) {
                Ok(parsed) => self.background_color = parsed,
                Err(e) => tracing::warn!(error = %e, "Ignoring BGREMOVE_BACKGROUND_COLOR"),
            }
        }
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Zero workers, zero size limits, or a safety ceiling below the staging ceiling
    /// - JPEG quality above 100
    /// - Empty supported format set
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 || self.workers > 256 {
            return Err(BgRemovalError::config_value_error("workers", self.workers, "1-256"));
        }
        if self.jpeg_quality > 100 {
            return Err(BgRemovalError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
            ));
        }
        if self.max_file_size == 0 {
            return Err(BgRemovalError::invalid_config("max_file_size must be non-zero"));
        }
        if self.max_image_size == 0 {
            return Err(BgRemovalError::invalid_config("max_image_size must be non-zero"));
        }
        if self.safety_max_image_size < self.max_image_size {
            return Err(BgRemovalError::invalid_config(format!(
                "safety_max_image_size ({}) must not be below max_image_size ({})",
                self.safety_max_image_size, self.max_image_size
            )));
        }
        if self.supported_formats.is_empty() {
            return Err(BgRemovalError::invalid_config("at least one supported format is required"));
        }
        Ok(())
    }
}

/// Builder for `ServiceConfig`
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    #[must_use]
    pub fn temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.temp_dir = dir.into();
        self
    }

    #[must_use]
    pub fn supported_formats(mut self, formats: BTreeSet<String>) -> Self {
        self.config.supported_formats = formats;
        self
    }

    #[must_use]
    pub fn max_file_size(mut self, bytes: usize) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    #[must_use]
    pub fn max_image_size(mut self, pixels: u32) -> Self {
        self.config.max_image_size = pixels;
        self
    }

    #[must_use]
    pub fn safety_max_image_size(mut self, pixels: u32) -> Self {
        self.config.safety_max_image_size = pixels;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(0, 100);
        self
    }

    #[must_use]
    pub fn background_color(mut self, color: BackgroundColor) -> Self {
        self.config.background_color = color;
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    #[must_use]
    pub fn retention_max_age(mut self, age: Duration) -> Self {
        self.config.retention_max_age = age;
        self
    }

    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn matting(mut self, matting: MattingOptions) -> Self {
        self.config.matting = matting;
        self
    }

    #[must_use]
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Build the service configuration
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` when validation fails
    pub fn build(self) -> Result<ServiceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
