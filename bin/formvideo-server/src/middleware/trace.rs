use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::BodyExt;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::state::AppState;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Small JSON bodies are logged verbatim at debug level.
const MAX_LOGGED_BODY: usize = 1024;

/// Tag every request with a trace id (taken from `x-trace-id` when it is a
/// UUID, generated otherwise), echo it on the response and log latency.
pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        if let Some(v) = &header_value {
            req.headers_mut().insert(X_TRACE_ID, v.clone());
        }

        let response = next.run(req).await;
        let (mut parts, body) = response.into_parts();
        let body = log_json_body(&parts.headers, body).await;
        if let Some(v) = header_value {
            parts.headers.insert(X_TRACE_ID, v);
        }

        info!(
            status = parts.status.as_u16(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "← response finished"
        );
        Response::from_parts(parts, body)
    }
    .instrument(span)
    .await
}

/// Buffer and log small JSON responses; stream everything else untouched.
async fn log_json_body(headers: &HeaderMap, body: Body) -> Body {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if !is_json {
        return body;
    }

    let bytes: Bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Body::empty(),
    };
    if bytes.len() < MAX_LOGGED_BODY {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            debug!(body = %text, "response body");
        }
    } else {
        debug!(size = bytes.len(), "response body [skipped]");
    }
    Body::from(bytes)
}
