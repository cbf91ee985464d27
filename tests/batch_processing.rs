//! Batch scheduler against real files on disk

mod common;

use bgremove_service::{
    BackgroundColor, BackgroundRemovalProcessor, BatchItemOutcome, BatchProgressReporter,
    BatchScheduler, BatchSummary, MattingOptions, ProcessorConfig,
};
use common::{write_image, TestSegmenter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const FAULT_WIDTH: u32 = 13;
const PANIC_WIDTH: u32 = 17;

fn scheduler(segmenter: TestSegmenter, workers: usize) -> BatchScheduler {
    let processor = BackgroundRemovalProcessor::new(Arc::new(segmenter), ProcessorConfig::default());
    BatchScheduler::new(processor, workers)
}

fn output_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().is_file())
        .count()
}

#[derive(Default)]
struct RecordingReporter {
    started: AtomicUsize,
    completed: Mutex<Vec<usize>>,
    finished: AtomicUsize,
}

impl BatchProgressReporter for RecordingReporter {
    fn batch_started(&self, total: usize) {
        self.started.store(total, Ordering::SeqCst);
    }

    fn item_finished(&self, _outcome: &BatchItemOutcome, completed: usize, _total: usize) {
        self.completed.lock().unwrap().push(completed);
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        self.finished.store(summary.total, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_batch_with_faults_counts_and_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    std::fs::create_dir_all(&input_dir).unwrap();

    // N = 8, K = 3: one segmenter error, one segmenter panic, one corrupt file
    let mut inputs: Vec<PathBuf> = (0..5)
        .map(|i| write_image(&input_dir, &format!("ok_{i}.png"), 10, 10))
        .collect();
    inputs.push(write_image(&input_dir, "fault.png", FAULT_WIDTH, 10));
    inputs.push(write_image(&input_dir, "crash.png", PANIC_WIDTH, 10));
    let corrupt = input_dir.join("corrupt.png");
    std::fs::write(&corrupt, b"definitely not a png").unwrap();
    inputs.push(corrupt);

    let segmenter = TestSegmenter::new()
        .failing_on_width(FAULT_WIDTH)
        .panicking_on_width(PANIC_WIDTH);
    let reporter = RecordingReporter::default();
    let summary = scheduler(segmenter, 3)
        .run_batch(&inputs, &output_dir, MattingOptions::default(), &reporter)
        .await
        .unwrap();

    assert_eq!(summary.counts(), (5, 3));
    assert_eq!(summary.total, 8);
    assert_eq!(output_count(&output_dir), 5);

    let failed: Vec<_> = summary
        .failures()
        .map(|o| o.item.input.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(failed, vec!["corrupt.png", "crash.png", "fault.png"]);

    assert_eq!(reporter.started.load(Ordering::SeqCst), 8);
    assert_eq!(reporter.finished.load(Ordering::SeqCst), 8);
    assert_eq!(*reporter.completed.lock().unwrap(), (1..=8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_batch_output_naming() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    std::fs::create_dir_all(&input_dir).unwrap();

    let inputs = vec![
        write_image(&input_dir, "cat.jpg", 12, 12),
        write_image(&input_dir, "dog.png", 12, 12),
    ];
    let summary = scheduler(TestSegmenter::new(), 2)
        .run_batch(&inputs, &output_dir, MattingOptions::default(), &RecordingReporter::default())
        .await
        .unwrap();

    assert_eq!(summary.counts(), (2, 0));
    // JPEG inputs are written as PNG so the cut-out keeps its alpha
    let cat = image::open(output_dir.join("no_bg_cat.png")).unwrap().to_rgba8();
    assert_eq!(cat.get_pixel(11, 0).0[3], 0);
    assert!(output_dir.join("no_bg_dog.png").is_file());
}

#[tokio::test]
async fn test_batch_creates_output_dir_and_handles_empty_input() {
    let temp_dir = TempDir::new().unwrap();
    let output_dir = temp_dir.path().join("nested/output");

    let summary = scheduler(TestSegmenter::new(), 4)
        .run_batch(&[], &output_dir, MattingOptions::default(), &RecordingReporter::default())
        .await
        .unwrap();

    assert_eq!(summary.counts(), (0, 0));
    assert!(summary.success_rate().abs() < f64::EPSILON);
    assert!(output_dir.is_dir());
}

#[tokio::test]
async fn test_batch_parallelism_is_bounded() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    std::fs::create_dir_all(&input_dir).unwrap();
    let inputs: Vec<PathBuf> = (0..6)
        .map(|i| write_image(&input_dir, &format!("{i}.png"), 8, 8))
        .collect();

    let segmenter = Arc::new(TestSegmenter::new().with_delay(Duration::from_millis(40)));
    let processor = BackgroundRemovalProcessor::new(segmenter.clone(), ProcessorConfig::default());
    let summary = BatchScheduler::new(processor, 2)
        .run_batch(
            &inputs,
            &temp_dir.path().join("output"),
            MattingOptions::default(),
            &RecordingReporter::default(),
        )
        .await
        .unwrap();

    assert_eq!(summary.counts(), (6, 0));
    assert_eq!(segmenter.call_count(), 6);
    // 6 items, 2 at a time, 40 ms each: at least three rounds
    assert!(summary.duration >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_transparent_cutout_to_jpeg_uses_background_color() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_image(temp_dir.path(), "in.png", 64, 64);
    let output = temp_dir.path().join("out.jpg");

    let processor = BackgroundRemovalProcessor::new(
        Arc::new(TestSegmenter::new()),
        ProcessorConfig {
            background_color: BackgroundColor::new(0, 255, 0),
            ..ProcessorConfig::default()
        },
    );
    assert!(processor.remove_background(&input, &output, &MattingOptions::default()));

    // Right half was cut out, so it shows the background colour
    let saved = image::open(&output).unwrap().to_rgb8();
    let pixel = saved.get_pixel(60, 32).0;
    assert!(pixel[0] <= 8 && pixel[1] >= 245 && pixel[2] <= 8, "got {pixel:?}");
}
