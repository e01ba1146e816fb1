//! formvideo-core – job model and processing pipeline for video form submissions.
//!
//! A submitted video becomes a [`Job`] in a [`JobStore`]. The [`Orchestrator`]
//! runs the fixed stage sequence (audio extraction → transcription →
//! conditional translation → field extraction) against it in the background,
//! and [`StatusService`] answers polling clients from a point-in-time snapshot
//! of the store.

mod runtime;

pub use runtime::job::{artifact, Artifacts, Job, JobUpdate};
pub use runtime::orchestrator::{AttemptOutcome, Backoff, Orchestrator, RetryPolicy, RunnerConfig};
pub use runtime::pipeline::{Pipeline, PipelineBuilder, PipelineOptions};
pub use runtime::schema::{
    FieldType, FormSchema, SchemaField, SchemaProvider, StaticSchemaProvider, DEFAULT_FORM_TYPE,
};
pub use runtime::services::{
    AudioExtractor, FieldExtractor, Services, Transcriber, Transcript, Translator,
};
pub use runtime::stage::{Stage, StageInput, StageKind, STAGE_COUNT};
pub use runtime::status::{StageProgress, StatusService, StatusView};
pub use runtime::storage::{JobStore, MemoryJobStore};
pub use runtime::types::{JobId, JobStatus, RuntimeError, StageError};
