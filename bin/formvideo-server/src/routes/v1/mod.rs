pub mod videos;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/v1`.
pub fn router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new().merge(videos::router(max_upload_bytes))
}

pub fn api_docs() -> utoipa::openapi::OpenApi {
    videos::VideosApi::openapi()
}
