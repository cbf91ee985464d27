//! Job lifecycle for asynchronous background removal.
//!
//! Provides:
//! - `JobStore` / `InMemoryJobStore` — registry of jobs keyed by `JobId`
//! - `Job` — per-job record guarded by its own lock, with crate-private transitions
//! - `AsyncJobRunner` — drives a job through the worker pool
//! - `JobSnapshot` — consistent read-only view for callers

pub mod registry;
pub mod runner;
pub mod state;
pub mod types;

pub use registry::{InMemoryJobStore, JobStore};
pub use runner::AsyncJobRunner;
pub use state::Job;
pub use types::{JobId, JobSnapshot, JobState};
