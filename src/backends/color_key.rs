//! Built-in colour-key segmenter
//!
//! Estimates the background colour from the image border and derives alpha
//! from each pixel's distance to it. Works well for product shots and scans
//! on a roughly uniform backdrop, and needs no model files.

use crate::config::MattingOptions;
use crate::error::{BgRemovalError, Result};
use crate::segmentation::Segmenter;
use image::{DynamicImage, Rgba, RgbaImage};

/// Largest possible RGB euclidean distance (black to white)
const MAX_DISTANCE: f32 = 441.673;

/// Segmenter that keys out the dominant border colour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorKeySegmenter {
    /// Distance at or below which a pixel is fully background
    low_tolerance: f32,
    /// Distance at or above which a pixel is fully foreground
    high_tolerance: f32,
}

impl Default for ColorKeySegmenter {
    fn default() -> Self {
        Self {
            low_tolerance: 30.0,
            high_tolerance: 90.0,
        }
    }
}

impl ColorKeySegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the distance band over which alpha ramps from 0 to 255
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` if the band is empty or out of range
    pub fn with_tolerance(low: f32, high: f32) -> Result<Self> {
        if !(0.0..=MAX_DISTANCE).contains(&low) || !(0.0..=MAX_DISTANCE).contains(&high) {
            return Err(BgRemovalError::config_value_error(
                "colour tolerance",
                format!("{low}..{high}"),
                "0-441",
            ));
        }
        if low >= high {
            return Err(BgRemovalError::invalid_config(
                "low colour tolerance must be below the high tolerance",
            ));
        }
        Ok(Self {
            low_tolerance: low,
            high_tolerance: high,
        })
    }

    /// Mean colour of the outer ring of pixels
    fn estimate_background(image: &RgbaImage) -> [f32; 3] {
        let (width, height) = image.dimensions();
        let ring = (width.min(height) / 50).max(1);
        let mut sum = [0.0f64; 3];
        let mut count = 0u64;

        for (x, y, pixel) in image.enumerate_pixels() {
            let on_border = x < ring || y < ring || x >= width - ring || y >= height - ring;
            if on_border {
                for (acc, channel) in sum.iter_mut().zip(pixel.0.iter()) {
                    *acc += f64::from(*channel);
                }
                count += 1;
            }
        }

        let count = count.max(1) as f64;
        [
            (sum[0] / count) as f32,
            (sum[1] / count) as f32,
            (sum[2] / count) as f32,
        ]
    }

    fn alpha_for(&self, pixel: &Rgba<u8>, background: [f32; 3]) -> u8 {
        let distance = pixel
            .0
            .iter()
            .zip(background.iter())
            .map(|(c, b)| {
                let d = f32::from(*c) - b;
                d * d
            })
            .sum::<f32>()
            .sqrt();

        let t = ((distance - self.low_tolerance) / (self.high_tolerance - self.low_tolerance))
            .clamp(0.0, 1.0);
        (t * 255.0).round() as u8
    }
}

impl Segmenter for ColorKeySegmenter {
    fn segment(&self, image: &DynamicImage, options: &MattingOptions) -> Result<RgbaImage> {
        let mut rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(BgRemovalError::segmentation("image has zero dimensions"));
        }

        let background = Self::estimate_background(&rgba);
        let mut alpha: Vec<u8> = rgba
            .pixels()
            .map(|pixel| self.alpha_for(pixel, background))
            .collect();

        if options.alpha_matting {
            refine_alpha(&mut alpha, width as usize, height as usize, options);
        }

        // Keep any transparency the input already had
        for (pixel, a) in rgba.pixels_mut().zip(alpha) {
            pixel.0[3] = pixel.0[3].min(a);
        }

        Ok(rgba)
    }

    fn name(&self) -> &str {
        "color-key"
    }
}

/// Trimap refinement: confident regions are eroded by `erode_size` and
/// snapped to fully opaque / transparent; the band in between keeps its soft alpha.
fn refine_alpha(alpha: &mut [u8], width: usize, height: usize, options: &MattingOptions) {
    let foreground: Vec<bool> = alpha
        .iter()
        .map(|a| *a >= options.foreground_threshold)
        .collect();
    let background: Vec<bool> = alpha
        .iter()
        .map(|a| *a <= options.background_threshold)
        .collect();

    let radius = options.erode_size as usize;
    let foreground = erode(&foreground, width, height, radius);
    let background = erode(&background, width, height, radius);

    for ((a, fg), bg) in alpha.iter_mut().zip(foreground).zip(background) {
        if fg {
            *a = 255;
        } else if bg {
            *a = 0;
        }
    }
}

/// Binary erosion with a square structuring element of the given radius,
/// done as two separable 1-D passes.
fn erode(mask: &[bool], width: usize, height: usize, radius: usize) -> Vec<bool> {
    if radius == 0 {
        return mask.to_vec();
    }

    let mut horizontal = vec![false; mask.len()];
    for (src, dst) in mask.chunks(width).zip(horizontal.chunks_mut(width)) {
        erode_line(src, dst, radius);
    }

    let mut result = vec![false; mask.len()];
    let mut column = vec![false; height];
    let mut eroded = vec![false; height];
    for x in 0..width {
        for (y, cell) in column.iter_mut().enumerate() {
            *cell = horizontal[y * width + x];
        }
        erode_line(&column, &mut eroded, radius);
        for (y, cell) in eroded.iter().enumerate() {
            result[y * width + x] = *cell;
        }
    }
    result
}

/// `dst[i]` is true when every in-bounds `src[j]` with `|i - j| <= radius` is true.
fn erode_line(src: &[bool], dst: &mut [bool], radius: usize) {
    // Prefix count of false entries
    let mut misses = Vec::with_capacity(src.len() + 1);
    misses.push(0usize);
    for value in src {
        let last = misses.last().copied().unwrap_or(0);
        misses.push(last + usize::from(!*value));
    }

    for (i, out) in dst.iter_mut().enumerate() {
        let start = i.saturating_sub(radius);
        let end = (i + radius + 1).min(src.len());
        *out = misses[end] == misses[start];
    }
}
