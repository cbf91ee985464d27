//! Parallel batch processing of image files
//!
//! Every input is dispatched onto a `WorkerPool` sized to the requested worker
//! count. Items are independent: one failing or panicking never affects the
//! others, and the scheduler only returns once every item has an outcome.

use crate::{
    config::{MattingOptions, OutputFormat},
    error::Result,
    jobs::runner::PROCESSING_FAILED,
    pool::WorkerPool,
    processor::BackgroundRemovalProcessor,
    services::{BatchProgressReporter, ImageIOService, OutputFormatHandler},
};
use futures::stream::{FuturesUnordered, StreamExt};
use instant::Instant;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix given to every batch output file
pub const OUTPUT_PREFIX: &str = "no_bg_";

/// One input file and where its result goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Result of processing one batch item
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemOutcome {
    pub item: BatchItem,
    pub succeeded: bool,
    /// Set for failures: the pool fault, or the generic processing failure
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Aggregate result of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub duration: Duration,
    /// Per-item outcomes, ordered by input path
    pub outcomes: Vec<BatchItemOutcome>,
}

impl BatchSummary {
    /// Percentage of items that succeeded; 0 for an empty batch
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64 * 100.0
        }
    }

    /// `(successes, failures)`
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        (self.successful, self.failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchItemOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }
}

/// Output path for a batch input.
///
/// JPEG inputs become `no_bg_<stem>.png` so transparency survives; every
/// other input keeps its filename: `no_bg_<name>`.
#[must_use]
pub fn batch_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let name = input.file_name().unwrap_or_default().to_string_lossy();

    if OutputFormat::from_path(input) == Some(OutputFormat::Jpeg) {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let ext = OutputFormatHandler::get_extension(OutputFormat::Png);
        output_dir.join(format!("{OUTPUT_PREFIX}{stem}.{ext}"))
    } else {
        output_dir.join(format!("{OUTPUT_PREFIX}{name}"))
    }
}

/// Fans batch items out over a bounded worker pool
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    processor: BackgroundRemovalProcessor,
    pool: WorkerPool,
}

impl BatchScheduler {
    /// Create a scheduler running at most `worker_count` items at once
    #[must_use]
    pub fn new(processor: BackgroundRemovalProcessor, worker_count: usize) -> Self {
        Self {
            processor,
            pool: WorkerPool::new(worker_count),
        }
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    /// Pair each input with its output path under `output_dir`.
    ///
    /// Inputs that map to an output already claimed by an earlier input are
    /// still planned; the later result overwrites the earlier one.
    #[must_use]
    pub fn plan(inputs: &[PathBuf], output_dir: &Path) -> Vec<BatchItem> {
        let mut seen = HashSet::new();
        inputs
            .iter()
            .map(|input| {
                let output = batch_output_path(input, output_dir);
                if !seen.insert(output.clone()) {
                    tracing::warn!(
                        input = %input.display(),
                        output = %output.display(),
                        "Output path collides with an earlier input"
                    );
                }
                BatchItem {
                    input: input.clone(),
                    output,
                }
            })
            .collect()
    }

    /// Process every input and summarize the outcomes.
    ///
    /// # Errors
    /// Only top-level faults: the output directory cannot be created.
    /// Per-item failures are reported in the summary.
    #[tracing::instrument(skip_all, fields(items = inputs.len(), workers = self.pool.size()))]
    pub async fn run_batch(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        options: MattingOptions,
        reporter: &dyn BatchProgressReporter,
    ) -> Result<BatchSummary> {
        ImageIOService::ensure_directories(&[output_dir])?;

        let items = Self::plan(inputs, output_dir);
        let total = items.len();
        let start = Instant::now();
        reporter.batch_started(total);

        let mut pending: FuturesUnordered<_> = items
            .into_iter()
            .map(|item| self.process_item(item, options))
            .collect();

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = pending.next().await {
            outcomes.push(outcome);
            if let Some(last) = outcomes.last() {
                reporter.item_finished(last, outcomes.len(), total);
            }
        }
        outcomes.sort_by(|a, b| a.item.input.cmp(&b.item.input));

        let successful = outcomes.iter().filter(|o| o.succeeded).count();
        let summary = BatchSummary {
            successful,
            failed: total - successful,
            total,
            duration: start.elapsed(),
            outcomes,
        };
        reporter.batch_finished(&summary);
        Ok(summary)
    }

    async fn process_item(&self, item: BatchItem, options: MattingOptions) -> BatchItemOutcome {
        let start = Instant::now();
        let processor = self.processor.clone();
        let (input, output) = (item.input.clone(), item.output.clone());

        let result = self
            .pool
            .execute(move || processor.remove_background(&input, &output, &options))
            .await;

        let error = match result {
            Ok(true) => None,
            Ok(false) => Some(PROCESSING_FAILED.to_string()),
            Err(e) => Some(e.to_string()),
        };

        BatchItemOutcome {
            item,
            succeeded: error.is_none(),
            error,
            elapsed: start.elapsed(),
        }
    }
}
