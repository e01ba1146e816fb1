//! Video submission and status polling.
//!
//! Intake stores the upload, creates a `pending` job and enqueues it; it
//! never waits for processing. Clients poll `GET /v1/videos/{id}/status`
//! until the status is `completed` or `failed`.

use std::path::Path as FsPath;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use formvideo_core::{JobId, JobStatus, JobStore, DEFAULT_FORM_TYPE};
use tracing::{debug, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::ServerError;
use crate::schemas::v1::video::{
    StageProgressResponse, SubmitResponse, VideoDetailResponse, VideoListQuery, VideoStatusResponse,
    VideoUpload, SUBMITTED_MESSAGE,
};
use crate::state::AppState;

/// Multipart framing allowance on top of the file size cap.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(submit_video, get_video_status, get_video, list_videos),
    components(schemas(
        SubmitResponse,
        VideoStatusResponse,
        VideoDetailResponse,
        StageProgressResponse,
        VideoListQuery,
        VideoUpload
    ))
)]
pub struct VideosApi;

pub fn router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/videos",
            post(submit_video)
                .layer(DefaultBodyLimit::max(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)))
                .get(list_videos),
        )
        .route("/videos/{id}", get(get_video))
        .route("/videos/{id}/status", get(get_video_status))
}

/// Submit a recorded video for form extraction (`POST /v1/videos`).
///
/// Returns `202 Accepted` as soon as the upload is stored and the job is queued.
#[utoipa::path(
    post,
    path = "/v1/videos",
    tag = "videos",
    request_body(content = VideoUpload, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Video accepted for processing", body = SubmitResponse),
        (status = 400, description = "Missing file or unsupported type"),
        (status = 413, description = "File too large"),
        (status = 503, description = "Processing queue is full"),
    )
)]
pub async fn submit_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), ServerError> {
    let max_bytes = state.config.max_upload_size_bytes();
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut form_type: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_owned();
        match field_name.as_str() {
            "video_file" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                if !content_type.starts_with("video/") && !content_type.starts_with("audio/") {
                    return Err(ServerError::BadRequest(format!(
                        "Invalid file type: {content_type}. Only video and audio files are allowed."
                    )));
                }
                let file_name = field.file_name().unwrap_or("upload").to_owned();

                let mut bytes: Vec<u8> = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read file chunk: {e}")))?
                {
                    bytes.extend_from_slice(&chunk);
                    if bytes.len() > max_bytes {
                        return Err(ServerError::PayloadTooLarge(format!(
                            "File too large: exceeds maximum of {}MB",
                            state.config.max_upload_size_mb
                        )));
                    }
                }
                debug!(file_name = %file_name, content_type = %content_type, size_bytes = bytes.len(), "received upload");
                upload = Some((file_name, bytes));
            }
            "form_type" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read form_type: {e}")))?;
                let value = value.trim();
                if !value.is_empty() {
                    form_type = Some(value.to_owned());
                }
            }
            other => {
                return Err(ServerError::BadRequest(format!("Unknown field: {other}")));
            }
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ServerError::BadRequest("video_file is required".into()))?;
    if bytes.is_empty() {
        return Err(ServerError::BadRequest("Uploaded file is empty".into()));
    }
    let form_type = form_type.unwrap_or_else(|| DEFAULT_FORM_TYPE.to_owned());

    let upload_ref = save_upload(&state.config.media_root, &file_name, &bytes).await?;
    let id = match state.orchestrator.submit(&upload_ref, &form_type).await {
        Ok(id) => id,
        Err(e) => {
            // No job references the file.
            if let Err(rm) = tokio::fs::remove_file(state.config.media_root.join(&upload_ref)).await {
                warn!(upload_ref = %upload_ref, error = %rm, "failed to remove rejected upload");
            }
            return Err(e.into());
        }
    };
    info!(job_id = %id, upload_ref = %upload_ref, form_type = %form_type, size_bytes = bytes.len(), "video submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            id,
            message: SUBMITTED_MESSAGE.to_owned(),
            status: JobStatus::Processing.to_string(),
        }),
    ))
}

/// Poll a submission (`GET /v1/videos/{id}/status`).
#[utoipa::path(
    get,
    path = "/v1/videos/{id}/status",
    tag = "videos",
    params(("id" = String, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Current status", body = VideoStatusResponse),
        (status = 404, description = "Unknown submission"),
    )
)]
pub async fn get_video_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VideoStatusResponse>, ServerError> {
    let id = parse_id(&id)?;
    let view = state.status.status(id).await?;
    Ok(Json(VideoStatusResponse::from(&view)))
}

/// Full submission detail including intermediate artifacts (`GET /v1/videos/{id}`).
#[utoipa::path(
    get,
    path = "/v1/videos/{id}",
    tag = "videos",
    params(("id" = String, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Submission detail", body = VideoDetailResponse),
        (status = 404, description = "Unknown submission"),
    )
)]
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VideoDetailResponse>, ServerError> {
    let id = parse_id(&id)?;
    let job = state.store.get(id).await?;
    Ok(Json(VideoDetailResponse::from(&job)))
}

/// List submissions, newest first (`GET /v1/videos`).
#[utoipa::path(
    get,
    path = "/v1/videos",
    tag = "videos",
    params(VideoListQuery),
    responses(
        (status = 200, description = "Submissions", body = [VideoStatusResponse]),
        (status = 400, description = "Unknown status filter"),
    )
)]
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(q): Query<VideoListQuery>,
) -> Result<Json<Vec<VideoStatusResponse>>, ServerError> {
    let status = q
        .status
        .as_deref()
        .map(|s| {
            JobStatus::from_str(s)
                .map_err(|_| ServerError::BadRequest(format!("Unknown status filter: {s}")))
        })
        .transpose()?;
    let views = state.status.list(status).await?;
    Ok(Json(views.iter().map(VideoStatusResponse::from).collect()))
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn parse_id(raw: &str) -> Result<JobId, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::NotFound(format!("Video submission {raw} not found")))
}

/// Store the upload under `videos/YYYY/MM/DD/<uuid>_<name>` and return that relative path.
async fn save_upload(media_root: &FsPath, file_name: &str, bytes: &[u8]) -> Result<String, ServerError> {
    let relative = format!(
        "videos/{}/{}_{}",
        Utc::now().format("%Y/%m/%d"),
        Uuid::new_v4().simple(),
        sanitize_filename(file_name)
    );
    let path = media_root.join(&relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await?;
    Ok(relative)
}

/// Keep only characters that cannot escape the upload directory.
fn sanitize_filename(filename: &str) -> String {
    let name = FsPath::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
