use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::runtime::stage::{StageKind, STAGE_COUNT};
use crate::runtime::types::{JobId, JobStatus, RuntimeError};

/// Well-known artifact names, one per stage output.
pub mod artifact {
    /// Storage path of the extracted audio track.
    pub const AUDIO_PATH: &str = "audio_path";
    /// `{ "text": ..., "language": ... }` from the transcription stage.
    pub const TRANSCRIPT: &str = "transcript";
    /// Transcript text in the target language.
    pub const TRANSLATED_TEXT: &str = "translated_text";
    /// Final form record, tagged with `form_type` and `original_language`.
    pub const FORM_DATA: &str = "form_data";
}

/// Append-only map from artifact name to stage output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifacts(BTreeMap<String, Value>);

impl Artifacts {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// String value of `name`, if present and a JSON string.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Insert only if `name` is absent. Returns `false` when it already exists.
    fn insert_new(&mut self, name: String, value: Value) -> bool {
        if self.0.contains_key(&name) {
            return false;
        }
        self.0.insert(name, value);
        true
    }
}

impl From<BTreeMap<String, Value>> for Artifacts {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Artifacts(map)
    }
}

/// One submission's end-to-end processing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Which form schema the extraction stage uses.
    pub form_type: String,
    /// Storage reference of the uploaded media.
    pub upload_ref: String,
    pub status: JobStatus,
    /// Position of the last successfully completed stage (0 = none).
    pub stage_cursor: usize,
    /// Set only when `status` is `Failed`.
    pub error_message: Option<String>,
    pub artifacts: Artifacts,
    /// Pipeline attempts started so far.
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A fresh `Pending` job with cursor 0 and no artifacts.
    pub fn new(upload_ref: impl Into<String>, form_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            form_type: form_type.into(),
            upload_ref: upload_ref.into(),
            status: JobStatus::Pending,
            stage_cursor: 0,
            error_message: None,
            artifacts: Artifacts::default(),
            attempt_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The final form record, present only once the job has completed.
    pub fn output(&self) -> Option<&Value> {
        if self.status == JobStatus::Completed {
            self.artifacts.get(artifact::FORM_DATA)
        } else {
            None
        }
    }
}

/// A declarative mutation applied atomically to a single job.
///
/// Stores apply it under their own per-job serialization (a write lock, a
/// transaction), and [`JobUpdate::apply`] validates the whole update before
/// touching any field, so readers see either the old job or the new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub artifacts: Vec<(String, Value)>,
    pub stage_cursor: Option<usize>,
    pub start_attempt: bool,
    pub error_message: Option<String>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn artifact(mut self, name: impl Into<String>, value: Value) -> Self {
        self.artifacts.push((name.into(), value));
        self
    }

    pub fn advance_to(mut self, cursor: usize) -> Self {
        self.stage_cursor = Some(cursor);
        self
    }

    /// Re-affirm `Processing` and count one more attempt.
    pub fn start_attempt(mut self) -> Self {
        self.status = Some(JobStatus::Processing);
        self.start_attempt = true;
        self
    }

    /// Move to `Failed` with a human-readable reason.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.status = Some(JobStatus::Failed);
        self.error_message = Some(message.into());
        self
    }

    /// Validate against `job` and, if every check passes, apply in place.
    pub fn apply(self, job: &mut Job) -> Result<(), RuntimeError> {
        let job_id = job.id;
        let invalid = |message: String| RuntimeError::InvalidUpdate { job_id, message };

        if job.status.is_terminal() {
            return Err(RuntimeError::InvalidTransition {
                job_id,
                from: job.status,
                to: self.status.unwrap_or(job.status),
            });
        }

        let next_status = match self.status {
            Some(to) if !job.status.can_transition_to(to) => {
                return Err(RuntimeError::InvalidTransition {
                    job_id,
                    from: job.status,
                    to,
                });
            }
            Some(to) => to,
            None => job.status,
        };

        if let Some(cursor) = self.stage_cursor {
            if cursor < job.stage_cursor {
                return Err(invalid(format!(
                    "stage cursor cannot move backwards ({} -> {cursor})",
                    job.stage_cursor
                )));
            }
            if cursor > STAGE_COUNT {
                return Err(invalid(format!(
                    "stage cursor {cursor} exceeds stage count {STAGE_COUNT}"
                )));
            }
        }

        match (&self.error_message, next_status) {
            (Some(_), status) if status != JobStatus::Failed => {
                return Err(invalid("error message set on a non-failed job".into()));
            }
            (None, JobStatus::Failed) => {
                return Err(invalid("failed job requires an error message".into()));
            }
            (Some(m), _) if m.trim().is_empty() => {
                return Err(invalid("failed job requires an error message".into()));
            }
            _ => {}
        }

        for (i, (name, _)) in self.artifacts.iter().enumerate() {
            let repeated = self.artifacts[..i].iter().any(|(n, _)| n == name);
            if repeated || job.artifacts.contains(name) {
                return Err(RuntimeError::ArtifactConflict {
                    job_id,
                    name: name.clone(),
                });
            }
        }

        if next_status == JobStatus::Completed {
            let missing: Vec<&str> = StageKind::ALL
                .iter()
                .map(|kind| kind.output_artifact())
                .filter(|name| {
                    !job.artifacts.contains(name) && !self.artifacts.iter().any(|(n, _)| n == name)
                })
                .collect();
            if !missing.is_empty() {
                return Err(invalid(format!(
                    "cannot complete with missing artifacts: {}",
                    missing.join(", ")
                )));
            }
        }

        for (name, value) in self.artifacts {
            job.artifacts.insert_new(name, value);
        }
        if let Some(cursor) = self.stage_cursor {
            job.stage_cursor = cursor;
        }
        if self.start_attempt {
            job.attempt_count += 1;
        }
        job.status = next_status;
        job.error_message = self.error_message;
        job.updated_at = Utc::now();
        Ok(())
    }
}
