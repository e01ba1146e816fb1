//! Concrete collaborators for the pipeline stages.

pub mod ffmpeg;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use formvideo_core::{Services, StaticSchemaProvider};
use tracing::warn;

use crate::config::Config;
use ffmpeg::FfmpegAudioExtractor;
use openai::{OpenAiService, OpenAiSettings};

/// Construct every collaborator once, for the lifetime of the process.
pub fn build(cfg: &Config) -> anyhow::Result<Services> {
    if cfg.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; transcription, translation and extraction will fail");
    }
    let model = Arc::new(OpenAiService::new(OpenAiSettings {
        base_url: cfg.openai_base_url.clone(),
        api_key: cfg.openai_api_key.clone(),
        transcription_model: cfg.transcription_model.clone(),
        chat_model: cfg.chat_model.clone(),
        timeout: Duration::from_secs(cfg.http_timeout_secs),
        media_root: cfg.media_root.clone(),
    })?);

    Ok(Services {
        audio: Arc::new(FfmpegAudioExtractor::new(cfg.media_root.clone())),
        transcriber: model.clone(),
        translator: model.clone(),
        extractor: model,
        schemas: Arc::new(StaticSchemaProvider::new()),
    })
}
