//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - CORS and per-request trace-id middleware
//! - Optional Swagger UI / OpenAPI document (disable with `FORMVIDEO_ENABLE_SWAGGER=false`)
//! - Health route
//! - Video intake and polling under `/v1`

pub mod doc;
mod health;
mod v1;

use std::sync::Arc;

use axum::{middleware, Router};
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/v1", v1::router(state.config.max_upload_size_bytes()));

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(cors::cors_layer(&state))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}
