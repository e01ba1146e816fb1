//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use formvideo_core::{Backoff, PipelineOptions, RetryPolicy, RunnerConfig};

/// Runtime configuration for formvideo-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set (except the model API key, which
/// only the model-backed stages need).
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://formvideo.db"`).
    pub database_url: String,

    /// Root directory for uploaded videos and extracted audio.
    pub media_root: PathBuf,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,

    /// Comma-separated allowed origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Upload size cap in MiB.
    pub max_upload_size_mb: usize,

    /// Orchestrator queue capacity.
    pub queue_capacity: usize,

    /// Attempts allowed to run at the same time.
    pub worker_capacity: usize,

    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    /// `"fixed"` or `"exponential"`.
    pub retry_backoff: String,
    pub retry_backoff_factor: f64,
    pub retry_max_delay_secs: u64,

    /// Per-stage timeout.
    pub stage_timeout_secs: u64,

    /// Language the extractor reads; transcripts in it skip translation.
    pub target_language: String,

    /// Bearer token for the OpenAI-compatible model service.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub transcription_model: String,
    pub chat_model: String,
    /// Per-request timeout for model calls.
    pub http_timeout_secs: u64,

    /// Download an ffmpeg binary on startup when none is installed.
    pub ffmpeg_auto_download: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("FORMVIDEO_BIND", "0.0.0.0:8000"),
            database_url: env_or("FORMVIDEO_DATABASE_URL", "sqlite://formvideo.db"),
            media_root: PathBuf::from(env_or("FORMVIDEO_MEDIA_ROOT", "media")),
            log_level: env_or("FORMVIDEO_LOG", "info"),
            log_json: parse_bool("FORMVIDEO_LOG_JSON", false),
            enable_swagger: parse_bool("FORMVIDEO_ENABLE_SWAGGER", true),
            cors_allowed_origins: std::env::var("FORMVIDEO_CORS_ORIGINS").ok(),
            max_upload_size_mb: parse_env("FORMVIDEO_MAX_UPLOAD_SIZE_MB", 200),
            queue_capacity: parse_env("FORMVIDEO_QUEUE_CAPACITY", 64),
            worker_capacity: parse_env("FORMVIDEO_WORKER_CAPACITY", 4),
            max_attempts: parse_env("FORMVIDEO_MAX_ATTEMPTS", 3),
            retry_delay_secs: parse_env("FORMVIDEO_RETRY_DELAY_SECS", 60),
            retry_backoff: env_or("FORMVIDEO_RETRY_BACKOFF", "fixed"),
            retry_backoff_factor: parse_env("FORMVIDEO_RETRY_BACKOFF_FACTOR", 2.0),
            retry_max_delay_secs: parse_env("FORMVIDEO_RETRY_MAX_DELAY_SECS", 900),
            stage_timeout_secs: parse_env("FORMVIDEO_STAGE_TIMEOUT_SECS", 600),
            target_language: env_or("FORMVIDEO_TARGET_LANGUAGE", "en"),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_base_url: env_or("FORMVIDEO_OPENAI_BASE_URL", "https://api.openai.com/v1"),
            transcription_model: env_or("FORMVIDEO_TRANSCRIPTION_MODEL", "whisper-1"),
            chat_model: env_or("FORMVIDEO_CHAT_MODEL", "gpt-4o-mini"),
            http_timeout_secs: parse_env("FORMVIDEO_HTTP_TIMEOUT_SECS", 120),
            ffmpeg_auto_download: parse_bool("FORMVIDEO_FFMPEG_AUTO_DOWNLOAD", false),
        }
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_secs(self.retry_delay_secs);
        let backoff = if self.retry_backoff.eq_ignore_ascii_case("exponential") {
            Backoff::Exponential {
                factor: self.retry_backoff_factor.max(1.0),
                max_delay: Duration::from_secs(self.retry_max_delay_secs),
            }
        } else {
            Backoff::Fixed
        };
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            delay,
            backoff,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            retry: self.retry_policy(),
            worker_capacity: self.worker_capacity,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            target_language: self.target_language.clone(),
            stage_timeout: Duration::from_secs(self.stage_timeout_secs),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
impl Config {
    /// Defaults without consulting the environment.
    pub fn for_tests(media_root: impl Into<PathBuf>) -> Self {
        Self {
            bind_address: "127.0.0.1:0".into(),
            database_url: "sqlite::memory:".into(),
            media_root: media_root.into(),
            log_level: "debug".into(),
            log_json: false,
            enable_swagger: false,
            cors_allowed_origins: None,
            max_upload_size_mb: 1,
            queue_capacity: 16,
            worker_capacity: 2,
            max_attempts: 3,
            retry_delay_secs: 0,
            retry_backoff: "fixed".into(),
            retry_backoff_factor: 2.0,
            retry_max_delay_secs: 0,
            stage_timeout_secs: 5,
            target_language: "en".into(),
            openai_api_key: None,
            openai_base_url: "http://127.0.0.1:9".into(),
            transcription_model: "whisper-1".into(),
            chat_model: "gpt-4o-mini".into(),
            http_timeout_secs: 5,
            ffmpeg_auto_download: false,
        }
    }
}
