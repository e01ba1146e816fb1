use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ClientError;
use crate::poll::PollPolicy;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

/// Status values reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Reply to `POST /v1/videos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub message: String,
    pub status: JobState,
}

/// Reply to `GET /v1/videos/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStatus {
    pub id: Uuid,
    pub status: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub output_available: bool,
    pub output: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for a formvideo server.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("formvideo-client/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Upload `path` for processing. Returns once the server has queued the job.
    pub async fn submit(&self, path: &Path, form_type: Option<&str>) -> Result<Submission, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_owned();
        let size = bytes.len();

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(media_type(path))?;
        let mut form = Form::new().part("video_file", part);
        if let Some(form_type) = form_type {
            form = form.text("form_type", form_type.to_owned());
        }

        let response = self
            .http
            .post(format!("{}/v1/videos", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let submission: Submission = decode(response, None).await?;
        info!(job_id = %submission.id, file_name = %file_name, size_bytes = size, "video submitted");
        Ok(submission)
    }

    /// One point-in-time status snapshot.
    pub async fn status(&self, id: Uuid) -> Result<VideoStatus, ClientError> {
        let response = self
            .http
            .get(format!("{}/v1/videos/{id}/status", self.base_url))
            .send()
            .await?;
        decode(response, Some(id)).await
    }

    /// Poll until the job completes, fails or `policy.max_wait` elapses.
    ///
    /// Returns the extracted form on success. A completed job without output
    /// yields `Value::Null`.
    pub async fn wait(&self, id: Uuid, policy: &PollPolicy) -> Result<Value, ClientError> {
        let started = Instant::now();
        let deadline = policy.max_wait.map(|d| started + d);
        let mut interval = policy.interval;

        loop {
            let status = self.status(id).await?;
            debug!(job_id = %id, status = ?status.status, "polled");
            match status.status {
                JobState::Completed => return Ok(status.output.unwrap_or(Value::Null)),
                JobState::Failed => {
                    return Err(ClientError::JobFailed(
                        status
                            .error_message
                            .unwrap_or_else(|| "unknown error".to_owned()),
                    ))
                }
                JobState::Pending | JobState::Processing => {}
            }

            let sleep_for = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ClientError::Timeout {
                            job_id: id,
                            waited: now - started,
                        });
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };
            tokio::time::sleep(sleep_for).await;
            interval = policy.next_interval(interval);
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response, id: Option<Uuid>) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return Err(ClientError::NotFound(id));
        }
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

/// Content type for a media file, by extension; unknown extensions are sent as MP4.
fn media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        // The server only accepts video/* and audio/*.
        _ => "video/mp4",
    }
}
