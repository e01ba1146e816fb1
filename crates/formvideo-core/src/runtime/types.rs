use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a submitted job.
pub type JobId = Uuid;

/// Lifecycle state of a [`Job`](crate::Job).
///
/// `Pending` and `Processing` are non-terminal; `Completed` and `Failed` are
/// terminal and no transition ever leaves them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    /// Accepted by intake, no attempt started yet.
    Pending,
    /// An attempt is running or a retry is scheduled.
    Processing,
    /// Every stage succeeded; the form record is attached.
    Completed,
    /// A permanent failure, or transient failures past the retry budget.
    Failed,
}

impl JobStatus {
    /// Returns `true` for `Completed` and `Failed`.
    ///
    /// Polling loops should stop on this rather than matching variants.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `to`.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        match (self, to) {
            (Pending, Processing) | (Pending, Failed) => true,
            (Processing, Processing) | (Processing, Completed) | (Processing, Failed) => true,
            _ => false,
        }
    }
}

/// Classified failure reported by a stage operation.
///
/// The pipeline never retries on its own; the classification tells the
/// orchestrator whether another attempt is worth scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// Network, model or service hiccup. Retrying the attempt may succeed.
    #[error("transient collaborator failure: {0}")]
    TransientCollaboratorFailure(String),

    /// Structurally invalid input (empty media, unparseable output...).
    #[error("permanent input failure: {0}")]
    PermanentInputFailure(String),
}

impl StageError {
    pub fn transient(message: impl Into<String>) -> Self {
        StageError::TransientCollaboratorFailure(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        StageError::PermanentInputFailure(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::TransientCollaboratorFailure(_))
    }

    pub fn message(&self) -> &str {
        match self {
            StageError::TransientCollaboratorFailure(m) | StageError::PermanentInputFailure(m) => m,
        }
    }
}

/// Errors produced by the job runtime.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// The referenced job does not exist.
    #[error("job not found: {job_id}")]
    NotFound { job_id: JobId },

    /// A stage operation failed; `source` carries the classification.
    #[error("stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: StageError,
    },

    /// Transient failures persisted past the retry budget.
    #[error("stage '{stage}' failed after {attempts} attempts: {message}")]
    AttemptsExhausted {
        stage: String,
        attempts: u32,
        message: String,
    },

    /// An update tried to write an artifact that is already persisted.
    #[error("artifact '{name}' already written for job {job_id}")]
    ArtifactConflict { job_id: JobId, name: String },

    /// An update tried to move the job along a forbidden edge.
    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// An update violated a job invariant other than the state machine.
    #[error("invalid update for job {job_id}: {message}")]
    InvalidUpdate { job_id: JobId, message: String },

    /// A pipeline definition does not match the fixed stage order.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// The orchestrator submission queue is at capacity.
    #[error("orchestrator queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The orchestrator loop has stopped.
    #[error("orchestrator shut down")]
    Shutdown,

    /// The backing store failed (I/O, SQL, serialization).
    #[error("store error: {0}")]
    Store(String),
}
