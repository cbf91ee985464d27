//! Per-job record and its state machine.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::types::{JobId, JobSnapshot, JobState};

/// Progress reported once a job is picked up for processing.
pub const PROCESSING_PROGRESS: u8 = 10;

#[derive(Debug)]
struct JobRecord {
    state: JobState,
    progress: u8,
    result_path: Option<PathBuf>,
    error: Option<String>,
}

/// A single background removal job.
///
/// Identity and creation time are immutable. The mutable record lives behind
/// its own `RwLock`; every transition rewrites the whole record under one
/// write lock so readers never see a half-applied transition.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    created_at: DateTime<Utc>,
    record: RwLock<JobRecord>,
}

impl Job {
    /// Create a job in `Pending` with progress 0.
    #[must_use]
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            record: RwLock::new(JobRecord {
                state: JobState::Pending,
                progress: 0,
                result_path: None,
                error: None,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.read().state
    }

    /// Get a consistent copy of the current record.
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        let record = self.read();
        JobSnapshot {
            id: self.id,
            state: record.state,
            progress: record.progress,
            result_path: record.result_path.clone(),
            error: record.error.clone(),
            created_at: self.created_at,
        }
    }

    /// `Pending -> Processing`, progress 10.
    pub(crate) fn start_processing(&self) -> bool {
        let mut record = self.write();
        if record.state != JobState::Pending {
            self.reject(record.state, JobState::Processing);
            return false;
        }
        record.state = JobState::Processing;
        record.progress = record.progress.max(PROCESSING_PROGRESS);
        tracing::debug!(job_id = %self.id, "Job processing");
        true
    }

    /// `Processing -> Completed`, progress 100, result path recorded.
    pub(crate) fn complete(&self, result_path: PathBuf) -> bool {
        let mut record = self.write();
        if record.state != JobState::Processing {
            self.reject(record.state, JobState::Completed);
            return false;
        }
        record.state = JobState::Completed;
        record.progress = 100;
        record.result_path = Some(result_path);
        record.error = None;
        tracing::info!(job_id = %self.id, "Job completed");
        true
    }

    /// `Pending | Processing -> Failed`, progress reset to 0.
    ///
    /// An empty message is replaced so a failed job always carries a cause.
    pub(crate) fn fail(&self, error: impl Into<String>) -> bool {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Unknown error".to_string();
        }

        let mut record = self.write();
        if record.state.is_terminal() {
            self.reject(record.state, JobState::Failed);
            return false;
        }
        tracing::warn!(job_id = %self.id, error = %error, "Job failed");
        record.state = JobState::Failed;
        record.progress = 0;
        record.result_path = None;
        record.error = Some(error);
        true
    }

    fn reject(&self, from: JobState, to: JobState) {
        tracing::error!(job_id = %self.id, %from, %to, "Rejected illegal job transition");
    }

    fn read(&self) -> RwLockReadGuard<'_, JobRecord> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, JobRecord> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }
}
