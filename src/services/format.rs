//! Output format handling service
//!
//! Converts segmented RGBA results into the pixel layout the output format
//! can carry. Opaque formats get the foreground composited over a solid colour.

use crate::config::{BackgroundColor, OutputFormat};
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an RGBA result to the layout required by `format`
    ///
    /// # Arguments
    /// * `rgba_image` - Segmented image with alpha
    /// * `format` - Target output format
    /// * `background` - Colour used when the format cannot carry alpha
    #[must_use]
    pub fn convert_format(
        rgba_image: RgbaImage,
        format: OutputFormat,
        background: BackgroundColor,
    ) -> DynamicImage {
        if format.supports_transparency() {
            DynamicImage::ImageRgba8(rgba_image)
        } else {
            DynamicImage::ImageRgb8(Self::composite_over(&rgba_image, background))
        }
    }

    /// Alpha-composite an RGBA image over a solid colour
    ///
    /// `out = fg * a + bg * (1 - a)` per channel, so a fully transparent
    /// pixel becomes exactly the background colour.
    #[must_use]
    pub fn composite_over(rgba_image: &RgbaImage, background: BackgroundColor) -> RgbImage {
        let (width, height) = rgba_image.dimensions();
        let bg = [background.r, background.g, background.b];

        let mut rgb_image = RgbImage::new(width, height);
        for (src, dst) in rgba_image.pixels().zip(rgb_image.pixels_mut()) {
            let alpha = u32::from(src.0[3]);
            let mut out = [0u8; 3];
            for ((o, fg), b) in out.iter_mut().zip(src.0.iter()).zip(bg.iter()) {
                let blended = u32::from(*fg) * alpha + u32::from(*b) * (255 - alpha);
                *o = ((blended + 127) / 255) as u8;
            }
            *dst = Rgb(out);
        }
        rgb_image
    }

    /// Get the canonical file extension for a given output format
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// Warn when a format will lose the transparency produced by segmentation
    pub fn validate_for_background_removal(format: OutputFormat) {
        if !format.supports_transparency() {
            log::warn!(
                "Output format {:?} does not support transparency. The result will be composited over a solid background.",
                format
            );
        }
    }
}
