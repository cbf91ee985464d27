//! Segmentation adapter
//!
//! `BackgroundRemovalProcessor` wraps a `Segmenter` with everything around
//! it: loading the input file, bounding its size, invoking segmentation and
//! saving the result. The server's job runner and the batch scheduler both go
//! through it, so a file processed either way comes out identical.

use crate::{
    config::{BackgroundColor, MattingOptions, OutputFormat, ServiceConfig, DEFAULT_SAFETY_MAX_IMAGE_SIZE},
    error::{BgRemovalError, Result},
    pool::panic_message,
    segmentation::Segmenter,
    services::{fit_within, ImageIOService},
};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use log::debug;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{instrument, span, Level};

/// Output-side settings for the processor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessorConfig {
    /// Longer-side ceiling enforced right before segmentation
    pub safety_max_image_size: u32,
    /// Colour used when flattening into an opaque format
    pub background_color: BackgroundColor,
    /// JPEG quality (0-100)
    pub jpeg_quality: u8,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            safety_max_image_size: DEFAULT_SAFETY_MAX_IMAGE_SIZE,
            background_color: BackgroundColor::white(),
            jpeg_quality: 95,
        }
    }
}

impl From<&ServiceConfig> for ProcessorConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            safety_max_image_size: config.safety_max_image_size,
            background_color: config.background_color,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// What a successful run produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub elapsed_ms: u64,
}

/// Background removal processor shared by the job runner and batch scheduler
///
/// Cheap to clone; clones share the segmenter.
#[derive(Clone)]
pub struct BackgroundRemovalProcessor {
    segmenter: Arc<dyn Segmenter>,
    config: ProcessorConfig,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("segmenter", &self.segmenter.name())
            .field("config", &self.config)
            .finish()
    }
}

impl BackgroundRemovalProcessor {
    #[must_use]
    pub fn new(segmenter: Arc<dyn Segmenter>, config: ProcessorConfig) -> Self {
        Self { segmenter, config }
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    #[must_use]
    pub fn segmenter_name(&self) -> &str {
        self.segmenter.name()
    }

    /// Remove the background of `input` and write the result to `output`.
    ///
    /// Never fails and never unwinds: every error, and any panic raised by the
    /// segmenter, is logged and reported as `false`.
    pub fn remove_background(&self, input: &Path, output: &Path, options: &MattingOptions) -> bool {
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.try_remove_background(input, output, options)
        }));

        match result {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::error!(input = %input.display(), error = %e, "Background removal failed");
                false
            },
            Err(payload) => {
                tracing::error!(
                    input = %input.display(),
                    panic = %panic_message(payload.as_ref()),
                    "Segmenter panicked"
                );
                false
            },
        }
    }

    /// Fallible form of [`remove_background`](Self::remove_background).
    ///
    /// # Errors
    /// - `Io` / `InvalidImage` if the input cannot be read
    /// - `Segmentation` if the segmenter fails or returns a mismatched image
    /// - `Save` if the result cannot be written
    #[instrument(
        skip(self, options),
        fields(
            input = %input.display(),
            output = %output.display(),
            segmenter = %self.segmenter.name(),
            alpha_matting = options.alpha_matting
        )
    )]
    pub fn try_remove_background(
        &self,
        input: &Path,
        output: &Path,
        options: &MattingOptions,
    ) -> Result<RemovalOutcome> {
        let start = Instant::now();

        let image = {
            let _span = span!(Level::DEBUG, "load").entered();
            ImageIOService::load_image(input)?
        };

        let result = self.process_image(&image, options)?;
        let (width, height) = result.dimensions();

        let format = {
            let _span = span!(Level::DEBUG, "save").entered();
            ImageIOService::save_image(
                result,
                output,
                self.config.background_color,
                self.config.jpeg_quality,
            )?
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(width, height, elapsed_ms, "Background removed");

        Ok(RemovalOutcome {
            format,
            width,
            height,
            elapsed_ms,
        })
    }

    /// Bound the image to the safety ceiling and segment it in memory.
    ///
    /// # Errors
    /// `Segmentation` if the segmenter fails or returns an image of a different size
    pub fn process_image(&self, image: &DynamicImage, options: &MattingOptions) -> Result<RgbaImage> {
        let bounded = fit_within(image, self.config.safety_max_image_size);
        if let Some(ref resized) = bounded {
            debug!(
                "Image {}x{} exceeds safety ceiling {}, resized to {}x{}",
                image.width(),
                image.height(),
                self.config.safety_max_image_size,
                resized.width(),
                resized.height()
            );
        }
        let image = bounded.as_ref().unwrap_or(image);

        let result = {
            let _span = span!(
                Level::INFO,
                "segmentation",
                width = image.width(),
                height = image.height()
            )
            .entered();
            self.segmenter
                .segment(image, options)
                .map_err(|e| match e {
                    BgRemovalError::Segmentation(_) => e,
                    other => BgRemovalError::segmentation(other.to_string()),
                })?
        };

        if result.dimensions() != (image.width(), image.height()) {
            return Err(BgRemovalError::segmentation(format!(
                "segmenter returned {}x{} for a {}x{} input",
                result.width(),
                result.height(),
                image.width(),
                image.height()
            )));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{MockBehavior, MockSegmenter};
    use crate::backends::ColorKeySegmenter;
    use image::GenericImageView;
    use tempfile::TempDir;

    fn processor_with(behavior: MockBehavior) -> (BackgroundRemovalProcessor, MockSegmenter) {
        let mock = MockSegmenter::new(behavior);
        let processor =
            BackgroundRemovalProcessor::new(Arc::new(mock.clone()), ProcessorConfig::default());
        (processor, mock)
    }

    fn write_input(dir: &TempDir, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        DynamicImage::new_rgb8(width, height).save(&path).unwrap();
        path
    }

    #[test]
    fn test_remove_background_success() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_input(&temp_dir, "in.png", 8, 4);
        let output = temp_dir.path().join("out.png");
        let (processor, mock) = processor_with(MockBehavior::Succeed);

        assert!(processor.remove_background(&input, &output, &MattingOptions::default()));
        assert!(output.exists());
        assert_eq!(mock.call_count(), 1);

        let saved = image::open(&output).unwrap();
        assert_eq!(saved.dimensions(), (8, 4));
        assert_eq!(saved.to_rgba8().get_pixel(7, 0).0[3], 0);
    }

    #[test]
    fn test_matting_options_pass_through() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_input(&temp_dir, "in.png", 4, 4);
        let output = temp_dir.path().join("out.png");
        let (processor, mock) = processor_with(MockBehavior::Succeed);

        let options = MattingOptions {
            alpha_matting: true,
            foreground_threshold: 200,
            background_threshold: 5,
            erode_size: 3,
        };
        assert!(processor.remove_background(&input, &output, &options));
        assert_eq!(mock.calls(), vec![options]);
    }

    #[test]
    fn test_missing_input_returns_false() {
        let temp_dir = TempDir::new().unwrap();
        let (processor, mock) = processor_with(MockBehavior::Succeed);

        let ok = processor.remove_background(
            &temp_dir.path().join("missing.png"),
            &temp_dir.path().join("out.png"),
            &MattingOptions::default(),
        );
        assert!(!ok);
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_segmenter_error_returns_false() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_input(&temp_dir, "in.png", 4, 4);
        let output = temp_dir.path().join("out.png");
        let (processor, _) = processor_with(MockBehavior::Fail);

        assert!(!processor.remove_background(&input, &output, &MattingOptions::default()));
        assert!(!output.exists());

        let err = processor
            .try_remove_background(&input, &output, &MattingOptions::default())
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::Segmentation(_)));
    }

    #[test]
    fn test_segmenter_panic_is_contained() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_input(&temp_dir, "in.png", 4, 4);
        let output = temp_dir.path().join("out.png");
        let (processor, _) = processor_with(MockBehavior::Panic);

        assert!(!processor.remove_background(&input, &output, &MattingOptions::default()));
    }

    #[test]
    fn test_safety_ceiling_downsamples() {
        let config = ProcessorConfig {
            safety_max_image_size: 50,
            ..ProcessorConfig::default()
        };
        let processor = BackgroundRemovalProcessor::new(Arc::new(ColorKeySegmenter::new()), config);

        let result = processor
            .process_image(&DynamicImage::new_rgb8(200, 100), &MattingOptions::default())
            .unwrap();
        assert_eq!(result.dimensions(), (50, 25));
    }

    #[test]
    fn test_transparent_result_to_jpeg_is_background() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_input(&temp_dir, "in.png", 16, 16);
        let output = temp_dir.path().join("out.jpg");
        let config = ProcessorConfig {
            background_color: BackgroundColor::new(0, 0, 255),
            ..ProcessorConfig::default()
        };
        let processor =
            BackgroundRemovalProcessor::new(Arc::new(MockSegmenter::new(MockBehavior::Transparent)), config);

        let outcome = processor
            .try_remove_background(&input, &output, &MattingOptions::default())
            .unwrap();
        assert_eq!(outcome.format, OutputFormat::Jpeg);

        let saved = image::open(&output).unwrap().to_rgb8();
        let pixel = saved.get_pixel(8, 8).0;
        assert!(pixel[0] <= 3 && pixel[1] <= 3 && pixel[2] >= 250, "got {pixel:?}");
    }
}
