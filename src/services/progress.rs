//! Progress reporting service
//!
//! Separates batch progress reporting from the scheduler, so the CLI can
//! draw a progress bar while library callers log or stay silent.

use crate::batch::{BatchItemOutcome, BatchSummary};

/// Receives progress events from the batch scheduler
///
/// Events for different items may arrive from concurrent tasks; `completed`
/// is the number of items finished so far, including this one.
pub trait BatchProgressReporter: Send + Sync {
    /// Called once before any item starts
    fn batch_started(&self, total: usize);

    /// Called once per item, in completion order
    fn item_finished(&self, outcome: &BatchItemOutcome, completed: usize, total: usize);

    /// Called once after every item has finished
    fn batch_finished(&self, summary: &BatchSummary);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl BatchProgressReporter for NoOpProgressReporter {
    fn batch_started(&self, _total: usize) {}

    fn item_finished(&self, _outcome: &BatchItemOutcome, _completed: usize, _total: usize) {}

    fn batch_finished(&self, _summary: &BatchSummary) {}
}

/// Progress reporter that writes through the `log` facade
pub struct LogProgressReporter {
    verbose: bool,
}

impl LogProgressReporter {
    /// Create a new log progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Also log every successful item, not just failures
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl BatchProgressReporter for LogProgressReporter {
    fn batch_started(&self, total: usize) {
        log::info!("Processing {} images", total);
    }

    fn item_finished(&self, outcome: &BatchItemOutcome, completed: usize, total: usize) {
        if outcome.succeeded {
            if self.verbose {
                log::info!(
                    "[{}/{}] ✓ {} -> {}",
                    completed,
                    total,
                    outcome.item.input.display(),
                    outcome.item.output.display()
                );
            }
        } else {
            log::warn!(
                "[{}/{}] ✗ {}: {}",
                completed,
                total,
                outcome.item.input.display(),
                outcome.error.as_deref().unwrap_or("Failed to process image")
            );
        }
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        log::info!(
            "Batch finished in {:.2}s: {} succeeded, {} failed, {} total ({:.1}% success)",
            summary.duration.as_secs_f64(),
            summary.successful,
            summary.failed,
            summary.total,
            summary.success_rate()
        );
    }
}
