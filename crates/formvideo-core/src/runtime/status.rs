use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runtime::job::Job;
use crate::runtime::stage::{StageKind, STAGE_COUNT};
use crate::runtime::storage::JobStore;
use crate::runtime::types::{JobId, JobStatus, RuntimeError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    /// Stages whose artifact is persisted.
    pub completed: usize,
    pub total: usize,
    /// Stage the next (or running) attempt works on; `None` once terminal.
    pub current_stage: Option<String>,
}

/// Read-only snapshot of a job for status consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub id: JobId,
    pub form_type: String,
    pub status: JobStatus,
    pub stage_progress: StageProgress,
    pub error_message: Option<String>,
    /// The form record; present only when `status` is `Completed`.
    pub output: Option<Value>,
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for StatusView {
    fn from(job: &Job) -> Self {
        let current_stage = if job.status.is_terminal() {
            None
        } else {
            StageKind::at(job.stage_cursor + 1).map(|k| k.name().to_owned())
        };
        Self {
            id: job.id,
            form_type: job.form_type.clone(),
            status: job.status,
            stage_progress: StageProgress {
                completed: job.stage_cursor,
                total: STAGE_COUNT,
                current_stage,
            },
            error_message: job.error_message.clone(),
            output: job.output().cloned(),
            attempt_count: job.attempt_count,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Query side of the job store. Never mutates a job.
#[derive(Debug, Clone)]
pub struct StatusService<S: JobStore> {
    store: S,
}

impl<S: JobStore> StatusService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Unknown ids yield [`RuntimeError::NotFound`].
    pub async fn status(&self, id: JobId) -> Result<StatusView, RuntimeError> {
        let job = self.store.get(id).await?;
        Ok(StatusView::from(&job))
    }

    /// Newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<JobStatus>) -> Result<Vec<StatusView>, RuntimeError> {
        let jobs = self.store.list(status).await?;
        Ok(jobs.iter().map(StatusView::from).collect())
    }
}
