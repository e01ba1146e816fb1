//! OpenAI-compatible model service: transcription, translation and form
//! field extraction.
//!
//! Any endpoint speaking the `/audio/transcriptions` and `/chat/completions`
//! wire format works (OpenAI, a local whisper/llama server, ...).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use formvideo_core::{FieldExtractor, FormSchema, StageError, Transcriber, Transcript, Translator};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Settings for [`OpenAiService`].
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub transcription_model: String,
    pub chat_model: String,
    pub timeout: Duration,
    /// Audio references are resolved against this directory.
    pub media_root: PathBuf,
}

/// One HTTP client shared by the three model-backed collaborators.
#[derive(Debug, Clone)]
pub struct OpenAiService {
    http: Client,
    settings: OpenAiSettings,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiService {
    pub fn new(settings: OpenAiSettings) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("formvideo-server/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<&str, StageError> {
        self.settings
            .api_key
            .as_deref()
            .ok_or_else(|| StageError::permanent("OPENAI_API_KEY is not configured"))
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, StageError> {
        let request = ChatRequest {
            model: &self.settings.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.1,
        };
        let response = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .await
            .map_err(classify_request_error)?;
        let body: ChatResponse = read_json(response).await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| StageError::permanent("model returned an empty completion"))
    }
}

#[async_trait]
impl Transcriber for OpenAiService {
    async fn transcribe(&self, audio_ref: &str) -> Result<Transcript, StageError> {
        let path = self.settings.media_root.join(audio_ref);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StageError::permanent(format!("cannot read audio '{audio_ref}': {e}")))?;
        if bytes.is_empty() {
            return Err(StageError::permanent(format!("audio '{audio_ref}' is empty")));
        }

        let file_name = Path::new(audio_ref)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_owned();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| StageError::permanent(format!("invalid audio part: {e}")))?;
        let form = Form::new()
            .text("model", self.settings.transcription_model.clone())
            .text("response_format", "verbose_json")
            .part("file", part);

        let response = self
            .http
            .post(self.url("audio/transcriptions"))
            .bearer_auth(self.api_key()?)
            .multipart(form)
            .send()
            .await
            .map_err(classify_request_error)?;
        let body: TranscriptionResponse = read_json(response).await?;

        let transcript = Transcript {
            text: body.text.trim().to_owned(),
            language: normalize_language(body.language.as_deref()),
        };
        debug!(audio_ref, language = %transcript.language, chars = transcript.text.len(), "transcribed");
        Ok(transcript)
    }
}

#[async_trait]
impl Translator for OpenAiService {
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String, StageError> {
        let system = format!(
            "You are a translation engine. Translate the user's text from language '{source_lang}' \
             to language '{target_lang}'. Reply with the translation only."
        );
        let translated = self.chat(&system, text).await?;
        Ok(translated.trim().to_owned())
    }
}

#[async_trait]
impl FieldExtractor for OpenAiService {
    async fn extract_fields(&self, text: &str, schema: &FormSchema) -> Result<Value, StageError> {
        let schema_json = serde_json::to_string_pretty(&schema.to_json())
            .map_err(|e| StageError::permanent(format!("cannot render schema: {e}")))?;
        let prompt = format!(
            "Extract the following information from this transcript and format it as JSON.\n\n\
             Form fields: {schema_json}\n\n\
             Transcript: \"{text}\"\n\n\
             Return ONLY a valid JSON object with the extracted data. \
             If a field is not found in the transcript, set it to null."
        );
        let reply = self.chat("You are a form-filling assistant.", &prompt).await?;
        extract_json(&reply)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StageError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }
    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            StageError::transient(format!("model response timed out: {e}"))
        } else {
            StageError::permanent(format!("malformed model response: {e}"))
        }
    })
}

/// Network-level failures never reached the model and are worth retrying.
fn classify_request_error(e: reqwest::Error) -> StageError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        StageError::transient(format!("model service unreachable: {e}"))
    } else {
        StageError::permanent(format!("model request failed: {e}"))
    }
}

fn classify_status(status: StatusCode, body: &str) -> StageError {
    let body: String = body.chars().take(512).collect();
    let message = format!("model service returned {status}: {body}");
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        StageError::transient(message)
    } else {
        StageError::permanent(message)
    }
}

/// Cut the JSON object out of a chat reply: first `{` to last `}`.
fn extract_json(reply: &str) -> Result<Value, StageError> {
    let candidate = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply.trim(),
    };
    serde_json::from_str(candidate).map_err(|e| {
        StageError::permanent(format!("model reply did not contain a JSON object: {e}"))
    })
}

/// Whisper reports full language names (`"english"`); the pipeline compares codes.
pub fn normalize_language(raw: Option<&str>) -> String {
    let lang = raw.map(|l| l.trim().to_lowercase()).unwrap_or_default();
    if lang.is_empty() {
        return "unknown".to_owned();
    }
    let code = match lang.as_str() {
        "english" => "en",
        "spanish" => "es",
        "french" => "fr",
        "german" => "de",
        "italian" => "it",
        "portuguese" => "pt",
        "dutch" => "nl",
        "russian" => "ru",
        "ukrainian" => "uk",
        "polish" => "pl",
        "turkish" => "tr",
        "swedish" => "sv",
        "arabic" => "ar",
        "chinese" => "zh",
        "japanese" => "ja",
        "korean" => "ko",
        "vietnamese" => "vi",
        "indonesian" => "id",
        "hindi" => "hi",
        "bengali" => "bn",
        "tamil" => "ta",
        "telugu" => "te",
        "marathi" => "mr",
        "gujarati" => "gu",
        "kannada" => "kn",
        "malayalam" => "ml",
        "punjabi" => "pa",
        "urdu" => "ur",
        other => return other.to_owned(),
    };
    code.to_owned()
}
