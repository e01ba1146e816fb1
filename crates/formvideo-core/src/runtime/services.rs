//! Collaborator contracts for the four stage operations.
//!
//! Each handle is constructed once at worker start and injected through
//! [`Services`]; nothing here is a lazily-initialised global.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runtime::schema::{FormSchema, SchemaProvider};
use crate::runtime::types::StageError;

/// Transcription output: text plus the detected language code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub language: String,
}

#[async_trait]
pub trait AudioExtractor: Send + Sync + 'static {
    /// Extract the audio track of `media_ref`, returning a reference to the audio file.
    async fn extract_audio(&self, media_ref: &str) -> Result<String, StageError>;
}

#[async_trait]
pub trait Transcriber: Send + Sync + 'static {
    async fn transcribe(&self, audio_ref: &str) -> Result<Transcript, StageError>;
}

#[async_trait]
pub trait Translator: Send + Sync + 'static {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, StageError>;
}

#[async_trait]
pub trait FieldExtractor: Send + Sync + 'static {
    /// Fill `schema` from `text`, returning a structured record.
    async fn extract_fields(&self, text: &str, schema: &FormSchema) -> Result<Value, StageError>;
}

/// The collaborator handles a pipeline is built from.
#[derive(Clone)]
pub struct Services {
    pub audio: Arc<dyn AudioExtractor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub extractor: Arc<dyn FieldExtractor>,
    pub schemas: Arc<dyn SchemaProvider>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
