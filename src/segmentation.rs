//! Segmentation capability
//!
//! The service treats foreground segmentation as an opaque capability: given
//! an RGB(A) image and matting options, produce the same image with an alpha
//! channel where background pixels are transparent.

use crate::config::MattingOptions;
use crate::error::Result;
use image::{DynamicImage, RgbaImage};

/// Foreground segmentation capability
///
/// Implementations are invoked from blocking worker threads and must be
/// shareable across them.
pub trait Segmenter: Send + Sync {
    /// Produce an RGBA image with the background made transparent.
    ///
    /// # Errors
    /// Implementation-defined; any error fails the current image only
    fn segment(&self, image: &DynamicImage, options: &MattingOptions) -> Result<RgbaImage>;

    /// Short human-readable name, used in logs
    fn name(&self) -> &str;
}

impl<S: Segmenter + ?Sized> Segmenter for std::sync::Arc<S> {
    fn segment(&self, image: &DynamicImage, options: &MattingOptions) -> Result<RgbaImage> {
        (**self).segment(image, options)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
