//! Reading and writing image files on disk
//!
//! Saving is extension driven. Formats without an alpha channel are
//! flattened over the configured background colour first.

use crate::{
    config::{BackgroundColor, OutputFormat},
    error::{BgRemovalError, Result},
    services::format::OutputFormatHandler,
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, GenericImageView, RgbaImage};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Basic facts about an image file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Detected container format, e.g. `Png`
    pub format: String,
    /// Pixel layout, e.g. `Rgba8`
    pub color_type: String,
    pub file_size: u64,
}

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// # Errors
    /// - `Io` if the file does not exist or cannot be read
    /// - `InvalidImage` if the contents cannot be decoded
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(BgRemovalError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                // The extension may lie; fall back to sniffing the content
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );
                let data = std::fs::read(path_ref)
                    .map_err(|io_err| BgRemovalError::file_io_error("read image data", path_ref, &io_err))?;
                image::load_from_memory(&data).map_err(|content_err| {
                    BgRemovalError::invalid_image(format!(
                        "{}: {} (content detection: {})",
                        path_ref.display(),
                        e,
                        content_err
                    ))
                })
            },
        }
    }

    /// Save a segmented image, choosing the encoding from the path extension
    ///
    /// Unknown or missing extensions are written as PNG. JPEG output is
    /// composited over `background` and encoded at `jpeg_quality`.
    ///
    /// # Errors
    /// `Save` if the parent directory cannot be created or encoding fails
    pub fn save_image<P: AsRef<Path>>(
        image: RgbaImage,
        path: P,
        background: BackgroundColor,
        jpeg_quality: u8,
    ) -> Result<OutputFormat> {
        let path_ref = path.as_ref();
        let format = OutputFormat::from_path(path_ref).unwrap_or_default();
        OutputFormatHandler::validate_for_background_removal(format);

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BgRemovalError::save(format!("create output directory '{}': {}", parent.display(), e))
            })?;
        }

        let converted = OutputFormatHandler::convert_format(image, format, background);
        let result = match (format, converted) {
            (OutputFormat::Jpeg, DynamicImage::ImageRgb8(rgb)) => File::create(path_ref)
                .map_err(image::ImageError::IoError)
                .and_then(|file| {
                    let mut writer = BufWriter::new(file);
                    JpegEncoder::new_with_quality(&mut writer, jpeg_quality).encode_image(&rgb)?;
                    writer.flush().map_err(image::ImageError::IoError)
                }),
            (OutputFormat::WebP, img) => img.save_with_format(path_ref, image::ImageFormat::WebP),
            (_, img) => img.save_with_format(path_ref, image::ImageFormat::Png),
        };

        result.map_err(|e| {
            BgRemovalError::save(format!("{:?} to '{}': {}", format, path_ref.display(), e))
        })?;

        log::debug!("Saved {:?} result to {}", format, path_ref.display());
        Ok(format)
    }

    /// Read dimensions, format and size of an image file without keeping the pixels
    ///
    /// # Errors
    /// - `Io` if the file cannot be read
    /// - `InvalidImage` if the contents cannot be decoded
    pub fn image_info<P: AsRef<Path>>(path: P) -> Result<ImageInfo> {
        let path_ref = path.as_ref();
        let file_size = std::fs::metadata(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("read metadata for", path_ref, &e))?
            .len();

        let reader = image::ImageReader::open(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("open", path_ref, &e))?
            .with_guessed_format()
            .map_err(|e| BgRemovalError::file_io_error("sniff format of", path_ref, &e))?;
        let format = reader
            .format()
            .map_or_else(|| "Unknown".to_string(), |f| format!("{f:?}"));
        let image = reader
            .decode()
            .map_err(|e| BgRemovalError::invalid_image(e.to_string()))?;
        let (width, height) = image.dimensions();

        Ok(ImageInfo {
            width,
            height,
            format,
            color_type: format!("{:?}", image.color()),
            file_size,
        })
    }

    /// Whether both sides of `image` are within `max_side`
    #[must_use]
    pub fn validate_dimensions(image: &DynamicImage, max_side: u32) -> bool {
        let (width, height) = image.dimensions();
        width > 0 && height > 0 && width <= max_side && height <= max_side
    }

    /// Check whether a path carries one of the given extensions (case-insensitive)
    pub fn has_extension<P: AsRef<Path>, S: AsRef<str>>(path: P, extensions: &[S]) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e.as_ref().eq_ignore_ascii_case(ext)))
    }

    /// Create each directory (and its parents) if missing
    ///
    /// # Errors
    /// `Io` with the offending path when creation fails
    pub fn ensure_directories<P: AsRef<Path>>(dirs: &[P]) -> Result<()> {
        for dir in dirs {
            let dir = dir.as_ref();
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| BgRemovalError::file_io_error("create directory", dir, &e))?;
                log::info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }
}
