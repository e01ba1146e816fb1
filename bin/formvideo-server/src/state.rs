//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use formvideo_core::{Orchestrator, Pipeline, Services, StatusService};

use crate::config::Config;
use crate::db::sqlite::SqliteJobStore;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Durable job store.
    pub store: SqliteJobStore,
    /// Background job runner; intake enqueues through it.
    pub orchestrator: Orchestrator<SqliteJobStore>,
    /// Read-only job snapshots for polling clients.
    pub status: StatusService<SqliteJobStore>,
}

impl AppState {
    /// Wire the pipeline to `services` and start the orchestrator.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: Config, store: SqliteJobStore, services: Services) -> Self {
        let pipeline = Pipeline::standard(services, config.pipeline_options());
        let orchestrator = Orchestrator::start(store.clone(), pipeline, config.runner_config());
        Self {
            status: StatusService::new(store.clone()),
            config: Arc::new(config),
            store,
            orchestrator,
        }
    }
}
