//! Mock segmenters for exercising the pipeline without real segmentation

use crate::{
    config::MattingOptions,
    error::{BgRemovalError, Result},
    segmentation::Segmenter,
};
use image::{DynamicImage, RgbaImage};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a `MockSegmenter` responds to `segment`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Left half opaque, right half transparent
    Succeed,
    /// Return a segmentation error
    Fail,
    /// Panic inside `segment`
    Panic,
    /// Return a fully transparent image
    Transparent,
}

/// Mock segmenter with scripted behaviour and call recording
#[derive(Debug, Clone)]
pub struct MockSegmenter {
    behavior: MockBehavior,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<MattingOptions>>>,
}

impl MockSegmenter {
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep this long inside every call
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Options received by each call, in order
    pub fn calls(&self) -> Vec<MattingOptions> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Segmenter for MockSegmenter {
    fn segment(&self, image: &DynamicImage, options: &MattingOptions) -> Result<RgbaImage> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(*options);
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut rgba = image.to_rgba8();
        match self.behavior {
            MockBehavior::Succeed => {
                let half = rgba.width() / 2;
                for (x, _, pixel) in rgba.enumerate_pixels_mut() {
                    pixel.0[3] = if x < half { 255 } else { 0 };
                }
                Ok(rgba)
            },
            MockBehavior::Transparent => {
                for pixel in rgba.pixels_mut() {
                    pixel.0[3] = 0;
                }
                Ok(rgba)
            },
            MockBehavior::Fail => Err(BgRemovalError::segmentation("mock segmentation failure")),
            MockBehavior::Panic => panic!("mock segmenter panic"),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mock = MockSegmenter::new(MockBehavior::Succeed);
        let img = DynamicImage::new_rgb8(4, 2);
        let options = MattingOptions::default().with_alpha_matting(true);

        let out = mock.segment(&img, &options).unwrap();
        assert_eq!(out.get_pixel(0, 0).0[3], 255);
        assert_eq!(out.get_pixel(3, 0).0[3], 0);
        assert_eq!(mock.calls(), vec![options]);
    }

    #[test]
    fn test_mock_failure() {
        let mock = MockSegmenter::new(MockBehavior::Fail);
        let img = DynamicImage::new_rgb8(2, 2);
        assert!(mock.segment(&img, &MattingOptions::default()).is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
