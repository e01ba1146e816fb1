use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::runtime::job::{artifact, Job, JobUpdate};
use crate::runtime::schema::SchemaProvider;
use crate::runtime::services::{AudioExtractor, FieldExtractor, Services, Transcriber, Translator};
use crate::runtime::stage::{Stage, StageInput, StageKind, STAGE_COUNT};
use crate::runtime::storage::JobStore;
use crate::runtime::types::{JobStatus, RuntimeError, StageError};

/// Deployment-wide pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Language the field extractor reads. Transcripts already in this
    /// language skip the translator entirely.
    pub target_language: String,
    /// Upper bound for a single stage invocation.
    pub stage_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            target_language: "en".to_owned(),
            stage_timeout: Duration::from_secs(300),
        }
    }
}

/// The fixed stage sequence applied to one job at a time.
///
/// The pipeline never retries: [`Pipeline::run_attempt`] stops at the first
/// failing stage and reports its classification, leaving the cursor at the
/// last stage whose artifact was persisted.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
    options: PipelineOptions,
}

impl Pipeline {
    /// audio extraction → transcription → conditional translation → field extraction.
    pub fn standard(services: Services, options: PipelineOptions) -> Self {
        let stages = vec![
            audio_extraction(services.audio),
            transcription(services.transcriber),
            translation(services.translator, options.target_language.clone()),
            field_extraction(services.extractor, services.schemas),
        ];
        Self { stages, options }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the stages after `job.stage_cursor`, persisting each artifact and
    /// cursor advance in one store update before the next stage starts.
    ///
    /// The last stage's artifact is written together with `Completed`.
    pub async fn run_attempt<S: JobStore>(&self, store: &S, mut job: Job) -> Result<Job, RuntimeError> {
        for stage in self.stages.iter().skip(job.stage_cursor) {
            let position = stage.kind.position();
            let output_name = stage.output_artifact();
            let mut update = JobUpdate::new().advance_to(position);

            if job.artifacts.contains(output_name) {
                debug!(job_id = %job.id, stage = stage.name(), "artifact already persisted; skipping stage");
            } else {
                debug!(job_id = %job.id, stage = stage.name(), "stage started");
                let started = Instant::now();
                let output = stage
                    .run(StageInput::from_job(&job), self.options.stage_timeout)
                    .await
                    .map_err(|source| RuntimeError::StageFailed {
                        stage: stage.name().to_owned(),
                        source,
                    })?;
                info!(
                    job_id = %job.id,
                    stage = stage.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "stage completed"
                );
                update = update.artifact(output_name, output);
            }

            if position == STAGE_COUNT {
                update = update.status(JobStatus::Completed);
            }
            job = store.update(job.id, update).await?;
        }

        if job.status != JobStatus::Completed {
            job = store
                .update(job.id, JobUpdate::new().status(JobStatus::Completed))
                .await?;
        }
        Ok(job)
    }
}

/// Assembles a pipeline from custom stage operations.
///
/// Stages must be supplied exactly once each, in [`StageKind::ALL`] order; the
/// ordering is part of the job model and cannot vary per deployment.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
    options: PipelineOptions,
}

impl PipelineBuilder {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            stages: Vec::new(),
            options,
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Result<Pipeline, RuntimeError> {
        let kinds: Vec<StageKind> = self.stages.iter().map(|s| s.kind).collect();
        if kinds != StageKind::ALL {
            return Err(RuntimeError::InvalidPipeline(format!(
                "expected stages {:?}, got {:?}",
                StageKind::ALL,
                kinds
            )));
        }
        Ok(Pipeline {
            stages: self.stages,
            options: self.options,
        })
    }
}

// ── Standard stage operations ────────────────────────────────────────────────

fn audio_extraction(audio: Arc<dyn AudioExtractor>) -> Stage {
    Stage::new(StageKind::AudioExtraction, move |input: StageInput| {
        let audio = Arc::clone(&audio);
        async move {
            if input.upload_ref.trim().is_empty() {
                return Err(StageError::permanent("upload reference is empty"));
            }
            let audio_ref = audio.extract_audio(&input.upload_ref).await?;
            if audio_ref.trim().is_empty() {
                return Err(StageError::permanent("audio extractor returned an empty reference"));
            }
            Ok(Value::String(audio_ref))
        }
    })
}

fn transcription(transcriber: Arc<dyn Transcriber>) -> Stage {
    Stage::new(StageKind::Transcription, move |input: StageInput| {
        let transcriber = Arc::clone(&transcriber);
        async move {
            let audio_ref = input.require_text(artifact::AUDIO_PATH)?;
            let transcript = transcriber.transcribe(audio_ref).await?;
            if transcript.text.trim().is_empty() {
                return Err(StageError::permanent("transcription produced no text"));
            }
            Ok(json!({
                "text": transcript.text,
                "language": transcript.language,
            }))
        }
    })
}

fn translation(translator: Arc<dyn Translator>, target_language: String) -> Stage {
    Stage::new(StageKind::Translation, move |input: StageInput| {
        let translator = Arc::clone(&translator);
        let target = target_language.clone();
        async move {
            let transcript = input.transcript()?;
            // Exact code comparison: "en" and "en-US" are different languages here.
            if transcript.language == target {
                debug!(job_id = %input.job_id, language = %target, "transcript already in target language; translation skipped");
                return Ok(Value::String(transcript.text));
            }
            let translated = translator
                .translate(&transcript.text, &transcript.language, &target)
                .await?;
            Ok(Value::String(translated))
        }
    })
}

fn field_extraction(extractor: Arc<dyn FieldExtractor>, schemas: Arc<dyn SchemaProvider>) -> Stage {
    Stage::new(StageKind::FieldExtraction, move |input: StageInput| {
        let extractor = Arc::clone(&extractor);
        let schemas = Arc::clone(&schemas);
        async move {
            let transcript = input.transcript()?;
            let text = input.require_text(artifact::TRANSLATED_TEXT)?;
            let schema = schemas.get_schema(&input.form_type);
            let record = extractor.extract_fields(text, &schema).await?;

            let mut record = match record {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_owned(), other);
                    map
                }
            };
            record.insert("form_type".to_owned(), Value::String(input.form_type.clone()));
            record.insert("original_language".to_owned(), Value::String(transcript.language));
            Ok(Value::Object(record))
        }
    })
}
