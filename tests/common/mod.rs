//! Shared fixtures for integration tests
#![allow(dead_code)]

use bgremove_service::{
    BackgroundRemovalService, BgRemovalError, JobId, JobSnapshot, MattingOptions, Segmenter,
    ServiceConfig,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Segmenter keeping the left half of the image, with optional injected faults
#[derive(Debug, Default)]
pub struct TestSegmenter {
    delay: Duration,
    fail_width: Option<u32>,
    panic_width: Option<u32>,
    calls: AtomicUsize,
}

impl TestSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Return a segmentation error for images of this width
    pub fn failing_on_width(mut self, width: u32) -> Self {
        self.fail_width = Some(width);
        self
    }

    /// Panic for images of this width
    pub fn panicking_on_width(mut self, width: u32) -> Self {
        self.panic_width = Some(width);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Segmenter for TestSegmenter {
    fn segment(
        &self,
        image: &DynamicImage,
        _options: &MattingOptions,
    ) -> bgremove_service::Result<RgbaImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let width = image.width();
        if self.fail_width == Some(width) {
            return Err(BgRemovalError::segmentation("simulated fault"));
        }
        if self.panic_width == Some(width) {
            panic!("simulated segmenter crash");
        }

        let mut rgba = image.to_rgba8();
        for (x, _, pixel) in rgba.enumerate_pixels_mut() {
            if x >= width / 2 {
                *pixel = Rgba([pixel[0], pixel[1], pixel[2], 0]);
            }
        }
        Ok(rgba)
    }

    fn name(&self) -> &str {
        "test"
    }
}

/// Encode a solid image of the given size as PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Write a solid image to `dir/name`, encoded by extension
pub fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    DynamicImage::new_rgb8(width, height).save(&path).unwrap();
    path
}

pub fn config_for(temp_dir: &TempDir, workers: usize) -> ServiceConfig {
    ServiceConfig::builder()
        .temp_dir(temp_dir.path().join("staged"))
        .workers(workers)
        .build()
        .unwrap()
}

pub fn service_with(
    config: ServiceConfig,
    segmenter: TestSegmenter,
) -> (BackgroundRemovalService, Arc<TestSegmenter>) {
    let segmenter = Arc::new(segmenter);
    let service = BackgroundRemovalService::new(config, segmenter.clone()).unwrap();
    (service, segmenter)
}

/// Poll until the job is terminal, recording every snapshot seen
pub async fn wait_terminal(service: &BackgroundRemovalService, id: &JobId) -> Vec<JobSnapshot> {
    let mut seen = Vec::new();
    for _ in 0..500 {
        let snapshot = service.status(id).unwrap();
        let done = snapshot.state.is_terminal();
        seen.push(snapshot);
        if done {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} did not reach a terminal state");
}
