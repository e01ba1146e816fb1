use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::runtime::job::{Job, JobUpdate};
use crate::runtime::types::{JobId, JobStatus, RuntimeError};

/// Durable record of every submission.
///
/// Implementations must apply [`JobStore::update`] atomically per job: a
/// concurrent [`JobStore::get`] observes either the previous job or the fully
/// updated one. No cross-job transaction is required.
pub trait JobStore: Clone + Send + Sync + 'static {
    /// Persist a new `Pending` job and return its id.
    fn create(
        &self,
        upload_ref: &str,
        form_type: &str,
    ) -> impl Future<Output = Result<JobId, RuntimeError>> + Send;

    /// Fetch a job; unknown ids yield [`RuntimeError::NotFound`].
    fn get(&self, id: JobId) -> impl Future<Output = Result<Job, RuntimeError>> + Send;

    /// Apply `update` atomically and return the new job.
    ///
    /// Unknown ids yield [`RuntimeError::NotFound`]; a record is never created here.
    fn update(
        &self,
        id: JobId,
        update: JobUpdate,
    ) -> impl Future<Output = Result<Job, RuntimeError>> + Send;

    /// All jobs, newest first, optionally filtered by status.
    fn list(
        &self,
        status: Option<JobStatus>,
    ) -> impl Future<Output = Result<Vec<Job>, RuntimeError>> + Send;

    /// Jobs that have not reached a terminal state.
    fn non_terminal(&self) -> impl Future<Output = Result<Vec<Job>, RuntimeError>> + Send {
        async move {
            let jobs = self.list(None).await?;
            Ok(jobs
                .into_iter()
                .filter(|job| !job.status.is_terminal())
                .collect())
        }
    }
}

/// In-process job store.
///
/// Uses a `tokio::sync::RwLock<HashMap>` so many readers can observe jobs
/// concurrently while updates are serialized behind the write lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    inner: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed job, replacing any job with the same id.
    pub async fn insert(&self, job: Job) {
        self.inner.write().await.insert(job.id, job);
    }
}

impl JobStore for MemoryJobStore {
    async fn create(&self, upload_ref: &str, form_type: &str) -> Result<JobId, RuntimeError> {
        let job = Job::new(upload_ref, form_type);
        let id = job.id;
        self.inner.write().await.insert(id, job);
        Ok(id)
    }

    async fn get(&self, id: JobId) -> Result<Job, RuntimeError> {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RuntimeError::NotFound { job_id: id })
    }

    async fn update(&self, id: JobId, update: JobUpdate) -> Result<Job, RuntimeError> {
        let mut guard = self.inner.write().await;
        let job = guard
            .get_mut(&id)
            .ok_or(RuntimeError::NotFound { job_id: id })?;
        update.apply(job)?;
        Ok(job.clone())
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, RuntimeError> {
        let mut jobs: Vec<Job> = self
            .inner
            .read()
            .await
            .values()
            .filter(|job| status.is_none_or(|s| job.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}
