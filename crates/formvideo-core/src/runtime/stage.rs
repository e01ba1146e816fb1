use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::runtime::job::{artifact, Artifacts, Job};
use crate::runtime::services::Transcript;
use crate::runtime::types::{JobId, StageError};

/// Number of stages in the fixed pipeline.
pub const STAGE_COUNT: usize = 4;

/// The fixed, ordered stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StageKind {
    AudioExtraction,
    Transcription,
    Translation,
    FieldExtraction,
}

impl StageKind {
    /// Every stage in execution order.
    pub const ALL: [StageKind; STAGE_COUNT] = [
        StageKind::AudioExtraction,
        StageKind::Transcription,
        StageKind::Translation,
        StageKind::FieldExtraction,
    ];

    pub fn name(&self) -> &'static str {
        (*self).into()
    }

    /// 1-based position; a job whose cursor equals this has completed the stage.
    pub fn position(&self) -> usize {
        match self {
            StageKind::AudioExtraction => 1,
            StageKind::Transcription => 2,
            StageKind::Translation => 3,
            StageKind::FieldExtraction => 4,
        }
    }

    /// Stage at 1-based `position`, if any.
    pub fn at(position: usize) -> Option<StageKind> {
        position
            .checked_sub(1)
            .and_then(|i| StageKind::ALL.get(i).copied())
    }

    /// Artifacts that must exist before this stage can run.
    pub fn input_artifacts(&self) -> &'static [&'static str] {
        match self {
            StageKind::AudioExtraction => &[],
            StageKind::Transcription => &[artifact::AUDIO_PATH],
            StageKind::Translation => &[artifact::TRANSCRIPT],
            StageKind::FieldExtraction => &[artifact::TRANSCRIPT, artifact::TRANSLATED_TEXT],
        }
    }

    /// The single artifact this stage produces.
    pub fn output_artifact(&self) -> &'static str {
        match self {
            StageKind::AudioExtraction => artifact::AUDIO_PATH,
            StageKind::Transcription => artifact::TRANSCRIPT,
            StageKind::Translation => artifact::TRANSLATED_TEXT,
            StageKind::FieldExtraction => artifact::FORM_DATA,
        }
    }
}

/// Snapshot of the job fields a stage operation may read.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub job_id: JobId,
    pub form_type: String,
    pub upload_ref: String,
    pub artifacts: Artifacts,
}

impl StageInput {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            form_type: job.form_type.clone(),
            upload_ref: job.upload_ref.clone(),
            artifacts: job.artifacts.clone(),
        }
    }

    /// A required string artifact. Absent or empty input cannot be fixed by retrying.
    pub fn require_text(&self, name: &str) -> Result<&str, StageError> {
        match self.artifacts.text(name) {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(StageError::permanent(format!("artifact '{name}' is empty"))),
            None => Err(StageError::permanent(format!("missing artifact '{name}'"))),
        }
    }

    /// The transcription stage's output.
    pub fn transcript(&self) -> Result<Transcript, StageError> {
        let value = self
            .artifacts
            .get(artifact::TRANSCRIPT)
            .ok_or_else(|| StageError::permanent(format!("missing artifact '{}'", artifact::TRANSCRIPT)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| StageError::permanent(format!("malformed transcript artifact: {e}")))
    }
}

/// Boxed stage operation: required inputs in, output artifact (or a classified failure) out.
pub type StageFn = Arc<dyn Fn(StageInput) -> BoxFuture<'static, Result<Value, StageError>> + Send + Sync>;

/// One entry of the pipeline: what it consumes, what it produces, and how.
#[derive(Clone)]
pub struct Stage {
    pub kind: StageKind,
    work: StageFn,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name())
            .field("inputs", &self.kind.input_artifacts())
            .field("output", &self.kind.output_artifact())
            .finish()
    }
}

impl Stage {
    pub fn new<F, Fut>(kind: StageKind, work: F) -> Self
    where
        F: Fn(StageInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StageError>> + Send + 'static,
    {
        Self {
            kind,
            work: Arc::new(move |input| work(input).boxed()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn output_artifact(&self) -> &'static str {
        self.kind.output_artifact()
    }

    /// Run the operation, bounded by `timeout`.
    ///
    /// Missing inputs fail as `PermanentInputFailure` without invoking the
    /// operation; an elapsed timeout is a `TransientCollaboratorFailure`.
    pub async fn run(&self, input: StageInput, timeout: Duration) -> Result<Value, StageError> {
        for name in self.kind.input_artifacts() {
            if !input.artifacts.contains(name) {
                return Err(StageError::permanent(format!(
                    "stage '{}' requires artifact '{name}'",
                    self.name()
                )));
            }
        }

        match tokio::time::timeout(timeout, (self.work)(input)).await {
            Ok(result) => result,
            Err(_) => Err(StageError::transient(format!(
                "stage '{}' timed out after {}s",
                self.name(),
                timeout.as_secs_f32()
            ))),
        }
    }
}
