#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal Service
//!
//! Background removal exposed two ways: an asynchronous job service behind an
//! HTTP API, and a parallel batch mode for directories of images.
//!
//! ## Features
//!
//! - **Asynchronous jobs**: submit an image, poll its status, fetch the result
//! - **Bounded concurrency**: a fixed-size worker pool shared by all jobs
//! - **Batch processing**: fan a directory out over N workers with a summary
//! - **Retention**: periodic age-based cleanup of staged files
//! - **Pluggable segmentation**: any [`Segmenter`] implementation; a colour-key
//!   segmenter ships with the crate
//! - **CLI Integration**: `bgremove` binary (enable with the `cli` feature)
//! - **HTTP server**: Axum job API (enable with the `server` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_service::{BackgroundRemovalService, ColorKeySegmenter, ServiceConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::builder().temp_dir("temp").workers(2).build()?;
//! let service = BackgroundRemovalService::new(config, Arc::new(ColorKeySegmenter::new()))?;
//!
//! let bytes = std::fs::read("photo.jpg")?;
//! let id = service.submit(bytes, "photo.jpg").await?;
//!
//! let snapshot = service.status(&id)?;
//! println!("{} {}%", snapshot.state, snapshot.progress);
//! # Ok(())
//! # }
//! ```
//!
//! ### Batch processing
//!
//! ```rust,no_run
//! use bgremove_service::{
//!     BackgroundRemovalProcessor, BatchScheduler, ColorKeySegmenter, MattingOptions,
//!     NoOpProgressReporter, ProcessorConfig,
//! };
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let processor = BackgroundRemovalProcessor::new(
//!     Arc::new(ColorKeySegmenter::new()),
//!     ProcessorConfig::default(),
//! );
//! let inputs = vec![PathBuf::from("input/a.jpg"), PathBuf::from("input/b.png")];
//! let summary = BatchScheduler::new(processor, 4)
//!     .run_batch(&inputs, Path::new("output"), MattingOptions::default(), &NoOpProgressReporter)
//!     .await?;
//! println!("{} ok, {} failed", summary.successful, summary.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): `bgremove` binary, progress bars and tracing subscriber setup
//! - `server` (default): Axum HTTP job API
//! - `webp-support` (default): WebP image format support
//! - `tracing-json`: JSON structured log output for the binary

pub mod backends;
pub mod batch;
pub mod config;
pub mod error;
pub mod jobs;
pub mod pool;
pub mod processor;
pub mod retention;
pub mod segmentation;
pub mod service;
pub mod services;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod tracing_config;

pub use backends::ColorKeySegmenter;
pub use batch::{batch_output_path, BatchItem, BatchItemOutcome, BatchScheduler, BatchSummary};
pub use config::{
    BackgroundColor, MattingOptions, OutputFormat, ServiceConfig, ServiceConfigBuilder,
};
pub use error::{BgRemovalError, Result};
pub use jobs::{AsyncJobRunner, InMemoryJobStore, Job, JobId, JobSnapshot, JobState, JobStore};
pub use pool::WorkerPool;
pub use processor::{BackgroundRemovalProcessor, ProcessorConfig, RemovalOutcome};
pub use retention::{sweep, SweepReport};
pub use segmentation::Segmenter;
pub use service::{BackgroundRemovalService, JobResult};
pub use services::{
    BatchProgressReporter, ImageIOService, ImageInfo, ImageStager, LogProgressReporter,
    NoOpProgressReporter, StagedImage,
};
