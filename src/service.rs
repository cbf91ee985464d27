//! Submission, status and result retrieval for asynchronous jobs
//!
//! `BackgroundRemovalService` is the library-level entry point used by the HTTP
//! server. It owns the job registry, the stager and the runner, and lays out
//! staged files as `input_<id>.png` / `output_<id>.png` under the temp root.

use crate::{
    config::{MattingOptions, ServiceConfig},
    error::{BgRemovalError, Result},
    jobs::{AsyncJobRunner, InMemoryJobStore, JobId, JobSnapshot, JobState, JobStore},
    pool::WorkerPool,
    processor::{BackgroundRemovalProcessor, ProcessorConfig},
    segmentation::Segmenter,
    services::{ImageIOService, ImageStager},
};
use image::ImageFormat;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Location of a completed job's artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub id: JobId,
    pub path: PathBuf,
}

impl JobResult {
    /// Download filename offered to clients
    #[must_use]
    pub fn download_name(&self) -> String {
        format!("background_removed_{}.png", self.id)
    }
}

pub struct BackgroundRemovalService {
    config: ServiceConfig,
    store: Arc<dyn JobStore>,
    stager: ImageStager,
    runner: AsyncJobRunner,
    started_at: Instant,
}

impl std::fmt::Debug for BackgroundRemovalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalService")
            .field("config", &self.config)
            .field("jobs", &self.store.len())
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalService {
    /// Create a service with an in-memory job registry
    ///
    /// # Errors
    /// - `InvalidConfig` if the configuration does not validate
    /// - `Io` if the temp directory cannot be created
    pub fn new(config: ServiceConfig, segmenter: Arc<dyn Segmenter>) -> Result<Self> {
        Self::with_store(config, segmenter, Arc::new(InMemoryJobStore::new()))
    }

    /// Create a service backed by a caller-supplied job registry
    ///
    /// # Errors
    /// Same as [`new`](Self::new)
    pub fn with_store(
        config: ServiceConfig,
        segmenter: Arc<dyn Segmenter>,
        store: Arc<dyn JobStore>,
    ) -> Result<Self> {
        config.validate()?;
        ImageIOService::ensure_directories(&[&config.temp_dir])?;

        let processor = BackgroundRemovalProcessor::new(segmenter, ProcessorConfig::from(&config));
        tracing::info!(
            temp_dir = %config.temp_dir.display(),
            workers = config.workers,
            segmenter = processor.segmenter_name(),
            "Background removal service ready"
        );
        let runner = AsyncJobRunner::new(processor, WorkerPool::new(config.workers));

        Ok(Self {
            stager: ImageStager::new(&config),
            config,
            store,
            runner,
            started_at: Instant::now(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    #[must_use]
    pub fn input_path(&self, id: JobId) -> PathBuf {
        self.config.temp_dir.join(format!("input_{id}.png"))
    }

    #[must_use]
    pub fn output_path(&self, id: JobId) -> PathBuf {
        self.config.temp_dir.join(format!("output_{id}.png"))
    }

    /// Validate an upload, register a job and start processing it in the background.
    ///
    /// Returns as soon as the job is enqueued. Client input errors are raised
    /// before any job exists.
    ///
    /// # Errors
    /// - `FormatUnsupported`, `PayloadTooLarge`, `InvalidImage` for bad uploads
    /// - `Save` if the staged input cannot be written (the job is marked failed)
    pub async fn submit(&self, bytes: Vec<u8>, filename: &str) -> Result<JobId> {
        self.submit_with_options(bytes, filename, self.config.matting)
            .await
    }

    /// [`submit`](Self::submit) with explicit matting options
    ///
    /// # Errors
    /// Same as [`submit`](Self::submit)
    #[tracing::instrument(skip(self, bytes, options), fields(size = bytes.len()))]
    pub async fn submit_with_options(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        options: MattingOptions,
    ) -> Result<JobId> {
        let stager = self.stager.clone();
        let declared = filename.to_string();
        let staged = tokio::task::spawn_blocking(move || stager.stage(&bytes, &declared))
            .await
            .map_err(|e| BgRemovalError::unexpected(format!("staging task failed: {e}")))??;

        let job = self.store.create();
        let id = job.id();
        let input = self.input_path(id);
        let output = self.output_path(id);

        let input_for_task = input.clone();
        let saved = tokio::task::spawn_blocking(move || {
            staged
                .image
                .save_with_format(&input_for_task, ImageFormat::Png)
                .map_err(|e| BgRemovalError::save(format!("staged input: {e}")))
        })
        .await
        .map_err(|e| BgRemovalError::unexpected(format!("staging task failed: {e}")))
        .and_then(|result| result);

        if let Err(e) = saved {
            job.fail(e.to_string());
            return Err(e);
        }

        tracing::info!(job_id = %id, "Job submitted");
        self.runner.submit(job, input, output, options);
        Ok(id)
    }

    /// Current state of a job
    ///
    /// # Errors
    /// `JobNotFound` if no such job exists
    pub fn status(&self, id: &JobId) -> Result<JobSnapshot> {
        Ok(self.store.get(id)?.snapshot())
    }

    /// Locate the artifact of a completed job
    ///
    /// # Errors
    /// - `JobNotFound` if no such job exists
    /// - `ResultNotReady` if the job has not completed
    /// - `ResultMissing` if the artifact was removed from storage
    pub fn result(&self, id: &JobId) -> Result<JobResult> {
        let snapshot = self.status(id)?;

        let path = match (snapshot.state, snapshot.result_path) {
            (JobState::Completed, Some(path)) => path,
            (state, _) => {
                return Err(BgRemovalError::ResultNotReady {
                    id: id.to_string(),
                    state,
                    progress: snapshot.progress,
                })
            },
        };

        if !path.is_file() {
            return Err(BgRemovalError::ResultMissing {
                id: id.to_string(),
                path: path.display().to_string(),
            });
        }

        Ok(JobResult { id: *id, path })
    }
}
