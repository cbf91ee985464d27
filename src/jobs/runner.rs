//! Drives submitted jobs through the worker pool.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::state::Job;
use crate::config::MattingOptions;
use crate::pool::WorkerPool;
use crate::processor::BackgroundRemovalProcessor;

/// Error recorded when the processor reports failure without more detail.
pub const PROCESSING_FAILED: &str = "Failed to process image";

/// Runs jobs in the background.
///
/// Each submission gets its own tokio task. That task moves the job to
/// `Processing`, waits for a pool slot, and records the terminal state once
/// the processor returns. The caller's task never blocks on the work.
#[derive(Debug, Clone)]
pub struct AsyncJobRunner {
    processor: BackgroundRemovalProcessor,
    pool: WorkerPool,
}

impl AsyncJobRunner {
    #[must_use]
    pub fn new(processor: BackgroundRemovalProcessor, pool: WorkerPool) -> Self {
        Self { processor, pool }
    }

    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Spawn `run` for this job and return immediately.
    ///
    /// The handle is only useful to tests; production callers drop it.
    pub fn submit(
        &self,
        job: Arc<Job>,
        input: PathBuf,
        output: PathBuf,
        options: MattingOptions,
    ) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(job, input, output, options).await })
    }

    /// Process one job to completion. Never returns an error: every outcome,
    /// including pool faults, ends up as the job's terminal state.
    #[tracing::instrument(skip_all, fields(job_id = %job.id()))]
    pub async fn run(&self, job: Arc<Job>, input: PathBuf, output: PathBuf, options: MattingOptions) {
        if !job.start_processing() {
            return;
        }

        let processor = self.processor.clone();
        let output_for_task = output.clone();
        let outcome = self
            .pool
            .execute(move || processor.remove_background(&input, &output_for_task, &options))
            .await;

        match outcome {
            Ok(true) => {
                job.complete(output);
            },
            Ok(false) => {
                job.fail(PROCESSING_FAILED);
            },
            Err(e) => {
                job.fail(e.to_string());
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{MockBehavior, MockSegmenter};
    use crate::jobs::{InMemoryJobStore, JobState, JobStore};
    use crate::processor::ProcessorConfig;
    use image::DynamicImage;
    use std::time::Duration;
    use tempfile::TempDir;

    fn runner_with(segmenter: MockSegmenter, workers: usize) -> AsyncJobRunner {
        let processor =
            BackgroundRemovalProcessor::new(Arc::new(segmenter), ProcessorConfig::default());
        AsyncJobRunner::new(processor, WorkerPool::new(workers))
    }

    fn write_input(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("input.png");
        DynamicImage::new_rgb8(6, 6).save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_completes_job() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_input(&temp_dir);
        let output = temp_dir.path().join("output.png");
        let store = InMemoryJobStore::new();
        let job = store.create();

        let runner = runner_with(MockSegmenter::new(MockBehavior::Succeed), 1);
        runner
            .run(Arc::clone(&job), input, output.clone(), MattingOptions::default())
            .await;

        let snap = job.snapshot();
        assert_eq!(snap.state, JobState::Completed);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.result_path, Some(output.clone()));
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_run_records_processing_failure() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_input(&temp_dir);
        let store = InMemoryJobStore::new();
        let job = store.create();

        let runner = runner_with(MockSegmenter::new(MockBehavior::Fail), 1);
        runner
            .run(
                Arc::clone(&job),
                input,
                temp_dir.path().join("output.png"),
                MattingOptions::default(),
            )
            .await;

        let snap = job.snapshot();
        assert_eq!(snap.state, JobState::Failed);
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.error.as_deref(), Some(PROCESSING_FAILED));
    }

    #[tokio::test]
    async fn test_closed_pool_fails_job_with_fault() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_input(&temp_dir);
        let store = InMemoryJobStore::new();
        let job = store.create();

        let runner = runner_with(MockSegmenter::new(MockBehavior::Succeed), 1);
        runner.pool().close();
        runner
            .run(
                Arc::clone(&job),
                input,
                temp_dir.path().join("output.png"),
                MattingOptions::default(),
            )
            .await;

        let snap = job.snapshot();
        assert_eq!(snap.state, JobState::Failed);
        assert!(snap.error.unwrap().contains("closed"));
    }

    #[tokio::test]
    async fn test_submit_returns_before_work_finishes() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_input(&temp_dir);
        let store = InMemoryJobStore::new();
        let job = store.create();

        let segmenter =
            MockSegmenter::new(MockBehavior::Succeed).with_delay(Duration::from_millis(100));
        let runner = runner_with(segmenter, 1);
        let handle = runner.submit(
            Arc::clone(&job),
            input,
            temp_dir.path().join("output.png"),
            MattingOptions::default(),
        );

        assert_ne!(job.state(), JobState::Completed);
        handle.await.unwrap();
        assert_eq!(job.state(), JobState::Completed);
    }

    #[tokio::test]
    async fn test_terminal_job_is_not_rerun() {
        let temp_dir = TempDir::new().unwrap();
        let store = InMemoryJobStore::new();
        let job = store.create();
        job.fail("staging failed");

        let segmenter = MockSegmenter::new(MockBehavior::Succeed);
        let runner = runner_with(segmenter.clone(), 1);
        runner
            .run(
                Arc::clone(&job),
                temp_dir.path().join("in.png"),
                temp_dir.path().join("out.png"),
                MattingOptions::default(),
            )
            .await;

        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(segmenter.call_count(), 0);
    }
}
