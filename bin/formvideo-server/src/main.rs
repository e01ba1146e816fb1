//! formvideo-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Prepare the media root and locate ffmpeg.
//! 4. Open the SQLite database and run pending migrations.
//! 5. Build the stage collaborators and start the orchestrator.
//! 6. Re-enqueue jobs left unfinished by a previous process.
//! 7. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod schemas;
mod services;
mod state;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::sqlite::SqliteJobStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: FORMVIDEO_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "formvideo-server starting");

    // ── 3. Media root and ffmpeg ───────────────────────────────────────────────
    tokio::fs::create_dir_all(&cfg.media_root).await?;
    if cfg.ffmpeg_auto_download {
        tokio::task::spawn_blocking(ffmpeg_sidecar::download::auto_download)
            .await?
            .map_err(|e| anyhow::anyhow!("ffmpeg download failed: {e}"))?;
        info!("ffmpeg available");
    } else if !ffmpeg_sidecar::command::ffmpeg_is_installed() {
        warn!("ffmpeg not found on PATH; audio extraction will fail until it is installed");
    }

    // ── 4. Database ────────────────────────────────────────────────────────────
    let store = SqliteJobStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 5. Collaborators and orchestrator ──────────────────────────────────────
    let service_handles = services::build(&cfg)?;
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let state = Arc::new(AppState::new(cfg, store, service_handles));
    info!(
        workers = state.config.worker_capacity,
        queue = state.config.queue_capacity,
        max_attempts = state.config.max_attempts,
        "orchestrator started"
    );

    // ── 6. Restart recovery ────────────────────────────────────────────────────
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.recover().await {
            error!(error = %e, "restart recovery failed");
        }
    });

    // ── 7. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("formvideo-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
