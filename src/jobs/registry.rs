//! Job registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::state::Job;
use super::types::JobId;
use crate::error::{BgRemovalError, Result};

/// Storage for jobs, shared between the submission path, the runner and readers.
pub trait JobStore: Send + Sync {
    /// Register a new `Pending` job under a fresh identifier.
    fn create(&self) -> Arc<Job>;

    /// Look up a job by identifier.
    ///
    /// # Errors
    /// `BgRemovalError::JobNotFound` when no job is registered under `id`
    fn get(&self, id: &JobId) -> Result<Arc<Job>>;

    /// Number of registered jobs.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process job registry. Jobs live until the process exits.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self) -> Arc<Job> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let mut id = JobId::new();
        while jobs.contains_key(&id) {
            id = JobId::new();
        }
        let job = Arc::new(Job::new(id));
        jobs.insert(id, Arc::clone(&job));
        tracing::debug!(job_id = %id, "Job created");
        job
    }

    fn get(&self, id: &JobId) -> Result<Arc<Job>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| BgRemovalError::job_not_found(id.to_string()))
    }

    fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
