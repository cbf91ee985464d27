//! Upload validation and normalization
//!
//! Staging turns raw uploaded bytes into a decoded, size-bounded image. It has
//! no side effects: nothing is written and no job exists until it succeeds.

use crate::config::ServiceConfig;
use crate::error::{BgRemovalError, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use std::collections::BTreeSet;
use std::path::Path;

/// A validated upload ready to be persisted for processing
#[derive(Debug, Clone)]
pub struct StagedImage {
    /// Decoded image, downsampled if it exceeded the staging ceiling
    pub image: DynamicImage,
    /// Width of the upload before any resize
    pub original_width: u32,
    /// Height of the upload before any resize
    pub original_height: u32,
}

impl StagedImage {
    /// Whether staging had to shrink the upload
    #[must_use]
    pub fn was_resized(&self) -> bool {
        self.image.width() != self.original_width || self.image.height() != self.original_height
    }
}

/// Validates and normalizes uploads
#[derive(Debug, Clone)]
pub struct ImageStager {
    supported_formats: BTreeSet<String>,
    max_file_size: usize,
    max_image_size: u32,
}

impl ImageStager {
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            supported_formats: config.supported_formats.clone(),
            max_file_size: config.max_file_size,
            max_image_size: config.max_image_size,
        }
    }

    /// Validate, decode and bound an upload.
    ///
    /// Checks run in order: declared extension, byte size, decode. The size
    /// check happens before any decoding work.
    ///
    /// # Errors
    /// - `FormatUnsupported` if the filename extension is not accepted
    /// - `PayloadTooLarge` if `bytes` exceeds the upload limit
    /// - `InvalidImage` if the bytes cannot be decoded
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn stage(&self, bytes: &[u8], filename: &str) -> Result<StagedImage> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !self.supported_formats.contains(&extension) {
            let shown = if extension.is_empty() {
                filename.to_string()
            } else {
                format!(".{extension}")
            };
            return Err(BgRemovalError::unsupported_format(shown));
        }

        if bytes.len() > self.max_file_size {
            return Err(BgRemovalError::PayloadTooLarge {
                size: bytes.len(),
                limit: self.max_file_size,
            });
        }

        let image = image::load_from_memory(bytes)
            .map_err(|e| BgRemovalError::invalid_image(e.to_string()))?;
        let (original_width, original_height) = (image.width(), image.height());
        if original_width == 0 || original_height == 0 {
            return Err(BgRemovalError::invalid_image("image has zero dimensions"));
        }

        let image = match fit_within(&image, self.max_image_size) {
            Some(resized) => {
                tracing::debug!(
                    from_width = original_width,
                    from_height = original_height,
                    to_width = resized.width(),
                    to_height = resized.height(),
                    "Downsampled upload"
                );
                resized
            },
            None => image,
        };

        Ok(StagedImage {
            image,
            original_width,
            original_height,
        })
    }
}

/// Downsample so the longer side equals `max_side`, preserving aspect ratio.
///
/// Returns `None` when the image already fits.
#[must_use]
pub fn fit_within(image: &DynamicImage, max_side: u32) -> Option<DynamicImage> {
    let (width, height) = (image.width(), image.height());
    if width <= max_side && height <= max_side {
        return None;
    }

    let (new_width, new_height) = if width >= height {
        let h = (f64::from(height) * f64::from(max_side) / f64::from(width)).round() as u32;
        (max_side, h.max(1))
    } else {
        let w = (f64::from(width) * f64::from(max_side) / f64::from(height)).round() as u32;
        (w.max(1), max_side)
    };

    Some(image.resize_exact(new_width, new_height, FilterType::Lanczos3))
}
