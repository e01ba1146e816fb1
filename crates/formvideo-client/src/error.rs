use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server does not know the submission.
    #[error("video submission {0} not found")]
    NotFound(Uuid),

    /// The job reached `failed`; carries the server's error message.
    #[error("processing failed: {0}")]
    JobFailed(String),

    /// `max_wait` elapsed before the job reached a terminal status.
    #[error("gave up on job {job_id} after {}", humantime::format_duration(*.waited))]
    Timeout { job_id: Uuid, waited: Duration },

    /// Any other non-success response.
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
