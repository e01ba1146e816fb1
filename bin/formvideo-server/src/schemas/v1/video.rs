use chrono::{DateTime, Utc};
use formvideo_core::{artifact, Job, StatusView};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const SUBMITTED_MESSAGE: &str = "Video submitted successfully. Processing has started.";

/// `multipart/form-data` body of `POST /v1/videos`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct VideoUpload {
    /// The recorded video (any `video/*` or `audio/*` type).
    #[schema(value_type = String, format = Binary)]
    pub video_file: Vec<u8>,
    /// Form schema to fill; defaults to `personal_info`.
    pub form_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub id: Uuid,
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoStatusResponse {
    pub id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub output_available: bool,
    #[schema(value_type = Option<Object>)]
    pub output: Option<Value>,
}

impl From<&StatusView> for VideoStatusResponse {
    fn from(view: &StatusView) -> Self {
        Self {
            id: view.id,
            status: view.status.to_string(),
            created_at: view.created_at,
            updated_at: view.updated_at,
            error_message: view.error_message.clone(),
            output_available: view.output.is_some(),
            output: view.output.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StageProgressResponse {
    pub completed: usize,
    pub total: usize,
    pub current_stage: Option<String>,
}

/// Status plus intermediate artifacts, for operators.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoDetailResponse {
    pub id: Uuid,
    pub form_type: String,
    pub status: String,
    pub stage_progress: StageProgressResponse,
    pub attempt_count: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub audio_path: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub transcript: Option<Value>,
    pub translated_text: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub output: Option<Value>,
}

impl From<&Job> for VideoDetailResponse {
    fn from(job: &Job) -> Self {
        let view = StatusView::from(job);
        Self {
            id: view.id,
            form_type: view.form_type,
            status: view.status.to_string(),
            stage_progress: StageProgressResponse {
                completed: view.stage_progress.completed,
                total: view.stage_progress.total,
                current_stage: view.stage_progress.current_stage,
            },
            attempt_count: view.attempt_count,
            error_message: view.error_message,
            created_at: view.created_at,
            updated_at: view.updated_at,
            audio_path: job.artifacts.text(artifact::AUDIO_PATH).map(str::to_owned),
            transcript: job.artifacts.get(artifact::TRANSCRIPT).cloned(),
            translated_text: job.artifacts.text(artifact::TRANSLATED_TEXT).map(str::to_owned),
            output: view.output,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct VideoListQuery {
    /// Filter by status: `pending`, `processing`, `completed` or `failed`.
    pub status: Option<String>,
}
