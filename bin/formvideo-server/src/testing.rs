//! Fakes and fixtures shared by the router tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use formvideo_core::{
    AudioExtractor, FieldExtractor, FormSchema, Services, StageError, StaticSchemaProvider,
    Transcriber, Transcript, Translator,
};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::sqlite::SqliteJobStore;
use crate::routes;
use crate::state::AppState;

/// Collaborators that answer with English text, after `transcribe_delay`.
#[derive(Default)]
pub struct FakeModel {
    pub transcribe_delay: Duration,
}

#[async_trait]
impl AudioExtractor for FakeModel {
    async fn extract_audio(&self, media_ref: &str) -> Result<String, StageError> {
        Ok(format!("audio/extracted/{media_ref}.mp3"))
    }
}

#[async_trait]
impl Transcriber for FakeModel {
    async fn transcribe(&self, _audio_ref: &str) -> Result<Transcript, StageError> {
        tokio::time::sleep(self.transcribe_delay).await;
        Ok(Transcript {
            text: "My name is Ada and I am a software engineer".into(),
            language: "en".into(),
        })
    }
}

#[async_trait]
impl Translator for FakeModel {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String, StageError> {
        Ok(text.to_owned())
    }
}

#[async_trait]
impl FieldExtractor for FakeModel {
    async fn extract_fields(&self, _text: &str, _schema: &FormSchema) -> Result<Value, StageError> {
        Ok(json!({ "full_name": "Ada", "occupation": "software engineer" }))
    }
}

pub fn fake_services(model: FakeModel) -> Services {
    let model = Arc::new(model);
    Services {
        audio: model.clone(),
        transcriber: model.clone(),
        translator: model.clone(),
        extractor: model,
        schemas: Arc::new(StaticSchemaProvider::new()),
    }
}

/// App state over an in-memory database and a temporary media root.
///
/// Keep the returned [`TempDir`] alive for the duration of the test.
pub async fn test_state_with(configure: impl FnOnce(&mut Config)) -> (Arc<AppState>, TempDir) {
    test_state_with_model(configure, FakeModel::default()).await
}

pub async fn test_state_with_model(
    configure: impl FnOnce(&mut Config),
    model: FakeModel,
) -> (Arc<AppState>, TempDir) {
    let media = tempfile::tempdir().unwrap();
    let mut config = Config::for_tests(media.path());
    configure(&mut config);
    let store = SqliteJobStore::connect(&config.database_url).await.unwrap();
    (Arc::new(AppState::new(config, store, fake_services(model))), media)
}

pub async fn test_state() -> (Arc<AppState>, TempDir) {
    test_state_with(|_| {}).await
}

pub fn test_app(state: Arc<AppState>) -> Router {
    routes::build(state)
}
