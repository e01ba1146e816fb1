#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tracing_test::traced_test;
    use uuid::Uuid;

    use crate::runtime::job::{artifact, Job, JobUpdate};
    use crate::runtime::orchestrator::{AttemptOutcome, Backoff, Orchestrator, RetryPolicy, RunnerConfig};
    use crate::runtime::pipeline::{Pipeline, PipelineBuilder, PipelineOptions};
    use crate::runtime::schema::{FormSchema, StaticSchemaProvider};
    use crate::runtime::services::{
        AudioExtractor, FieldExtractor, Services, Transcriber, Transcript, Translator,
    };
    use crate::runtime::stage::{Stage, StageKind};
    use crate::runtime::status::StatusService;
    use crate::runtime::storage::{JobStore, MemoryJobStore};
    use crate::runtime::types::{JobId, JobStatus, RuntimeError, StageError};

    // ── Fake collaborators ───────────────────────────────────────────────────

    #[derive(Default)]
    struct Fake {
        language: String,
        text: String,
        transcribe_delay: Duration,
        transcribe_errors: Mutex<VecDeque<StageError>>,
        extract_result: Option<Value>,
        schemas_seen: Mutex<Vec<String>>,
        audio_calls: AtomicU32,
        transcribe_calls: AtomicU32,
        translate_calls: AtomicU32,
        extract_calls: AtomicU32,
    }

    impl Fake {
        fn speaking(language: &str, text: &str) -> Self {
            Self {
                language: language.to_owned(),
                text: text.to_owned(),
                ..Default::default()
            }
        }

        fn failing_transcription(mut self, errors: Vec<StageError>) -> Self {
            self.transcribe_errors = Mutex::new(errors.into());
            self
        }

        fn slow_transcription(mut self, delay: Duration) -> Self {
            self.transcribe_delay = delay;
            self
        }

        fn extracting(mut self, value: Value) -> Self {
            self.extract_result = Some(value);
            self
        }

        fn calls(&self) -> [u32; 4] {
            [
                self.audio_calls.load(Ordering::SeqCst),
                self.transcribe_calls.load(Ordering::SeqCst),
                self.translate_calls.load(Ordering::SeqCst),
                self.extract_calls.load(Ordering::SeqCst),
            ]
        }
    }

    #[async_trait]
    impl AudioExtractor for Fake {
        async fn extract_audio(&self, media_ref: &str) -> Result<String, StageError> {
            self.audio_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("audio/extracted/{media_ref}.mp3"))
        }
    }

    #[async_trait]
    impl Transcriber for Fake {
        async fn transcribe(&self, _audio_ref: &str) -> Result<Transcript, StageError> {
            self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
            if !self.transcribe_delay.is_zero() {
                tokio::time::sleep(self.transcribe_delay).await;
            }
            if let Some(err) = self.transcribe_errors.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(Transcript {
                text: self.text.clone(),
                language: self.language.clone(),
            })
        }
    }

    #[async_trait]
    impl Translator for Fake {
        async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String, StageError> {
            self.translate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[{target}] {text}"))
        }
    }

    #[async_trait]
    impl FieldExtractor for Fake {
        async fn extract_fields(&self, _text: &str, schema: &FormSchema) -> Result<Value, StageError> {
            self.extract_calls.fetch_add(1, Ordering::SeqCst);
            self.schemas_seen.lock().unwrap().push(schema.name.clone());
            Ok(self
                .extract_result
                .clone()
                .unwrap_or_else(|| json!({ "name": "Jane Doe" })))
        }
    }

    fn services(fake: &Arc<Fake>) -> Services {
        Services {
            audio: fake.clone(),
            transcriber: fake.clone(),
            translator: fake.clone(),
            extractor: fake.clone(),
            schemas: Arc::new(StaticSchemaProvider::new()),
        }
    }

    fn fast_config(max_attempts: u32) -> RunnerConfig {
        RunnerConfig {
            retry: RetryPolicy {
                max_attempts,
                delay: Duration::from_millis(10),
                backoff: Backoff::Fixed,
            },
            worker_capacity: 4,
            queue_capacity: 16,
        }
    }

    fn start(fake: &Arc<Fake>, options: PipelineOptions, config: RunnerConfig) -> Orchestrator<MemoryJobStore> {
        let pipeline = Pipeline::standard(services(fake), options);
        Orchestrator::start(MemoryJobStore::new(), pipeline, config)
    }

    /// Poll until the job reaches a terminal state.
    async fn wait_terminal(store: &MemoryJobStore, id: JobId) -> Job {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = store.get(id).await.expect("job should exist");
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not finish in time")
    }

    /// Delegates to a [`MemoryJobStore`] but fails every second `update`, so each
    /// attempt starts and then loses its first stage write.
    #[derive(Clone, Default)]
    struct FlakyStore {
        inner: MemoryJobStore,
        updates: Arc<AtomicU32>,
    }

    impl JobStore for FlakyStore {
        async fn create(&self, upload_ref: &str, form_type: &str) -> Result<JobId, RuntimeError> {
            self.inner.create(upload_ref, form_type).await
        }

        async fn get(&self, id: JobId) -> Result<Job, RuntimeError> {
            self.inner.get(id).await
        }

        async fn update(&self, id: JobId, update: JobUpdate) -> Result<Job, RuntimeError> {
            if self.updates.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(RuntimeError::Store("disk I/O error".into()));
            }
            self.inner.update(id, update).await
        }

        async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, RuntimeError> {
            self.inner.list(status).await
        }
    }

    // ── End-to-end ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn job_application_in_english_completes_without_translation() {
        let fake = Arc::new(
            Fake::speaking("en", "My name is Jane Doe and I have five years of experience.").extracting(json!({
                "name": "Jane Doe",
                "experience_years": 5,
                "skills": ["rust", "sql"],
            })),
        );
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator
            .submit("videos/jane.mp4", "job_application")
            .await
            .expect("submit");
        let job = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.stage_cursor, 4);
        assert_eq!(job.attempt_count, 1);
        assert!(job.error_message.is_none());
        assert_eq!(fake.calls(), [1, 1, 0, 1]);
        assert_eq!(
            job.artifacts.text(artifact::TRANSLATED_TEXT),
            Some("My name is Jane Doe and I have five years of experience.")
        );
        assert_eq!(*fake.schemas_seen.lock().unwrap(), vec!["job_application".to_owned()]);

        let output = job.output().expect("completed job has output");
        assert_eq!(output["experience_years"], 5);
        assert_eq!(output["form_type"], "job_application");
        assert_eq!(output["original_language"], "en");
    }

    #[tokio::test]
    async fn non_target_language_is_translated() {
        let fake = Arc::new(Fake::speaking("es", "Me llamo Ana."));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator.submit("videos/ana.mp4", "personal_info").await.unwrap();
        let job = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(fake.translate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(job.artifacts.text(artifact::TRANSLATED_TEXT), Some("[en] Me llamo Ana."));
        assert_eq!(job.output().unwrap()["original_language"], "es");
    }

    #[tokio::test]
    async fn unknown_form_type_keeps_tag_and_uses_default_schema() {
        let fake = Arc::new(Fake::speaking("en", "hello"));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator.submit("videos/a.mp4", "tax_return").await.unwrap();
        let job = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(job.output().unwrap()["form_type"], "tax_return");
        assert_eq!(*fake.schemas_seen.lock().unwrap(), vec!["personal_info".to_owned()]);
    }

    #[tokio::test]
    async fn non_object_extraction_is_wrapped() {
        let fake = Arc::new(Fake::speaking("en", "hello").extracting(json!("free text")));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator.submit("videos/a.mp4", "personal_info").await.unwrap();
        let job = wait_terminal(orchestrator.store(), id).await;

        let output = job.output().unwrap();
        assert_eq!(output["value"], "free text");
        assert_eq!(output["form_type"], "personal_info");
    }

    // ── Failure handling ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn transient_failures_exhaust_retry_budget() {
        let errors = (0..5).map(|_| StageError::transient("connection reset")).collect();
        let fake = Arc::new(Fake::speaking("en", "hello").failing_transcription(errors));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator.submit("videos/a.mp4", "personal_info").await.unwrap();
        let job = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 3);
        let message = job.error_message.as_deref().unwrap();
        assert!(message.contains("transcription"), "{message}");
        assert!(message.contains("after 3 attempts"), "{message}");
        assert!(message.contains("connection reset"), "{message}");

        // Audio was extracted once; later attempts resumed at transcription.
        assert_eq!(fake.calls(), [1, 3, 0, 0]);
        assert_eq!(job.stage_cursor, 1);
        assert!(job.artifacts.contains(artifact::AUDIO_PATH));
        assert!(job.output().is_none());
    }

    #[tokio::test]
    async fn permanent_failure_short_circuits_retries() {
        let fake = Arc::new(
            Fake::speaking("en", "hello")
                .failing_transcription(vec![StageError::permanent("audio stream is empty")]),
        );
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator.submit("videos/a.mp4", "personal_info").await.unwrap();
        let job = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 1);
        assert_eq!(fake.calls(), [1, 1, 0, 0]);
        assert!(job.artifacts.contains(artifact::AUDIO_PATH));
        let message = job.error_message.unwrap();
        assert!(message.starts_with("Error processing video:"), "{message}");
        assert!(message.contains("audio stream is empty"), "{message}");
    }

    #[tokio::test]
    async fn retry_resumes_from_cursor_without_rerunning_stages() {
        let fake = Arc::new(
            Fake::speaking("en", "hello").failing_transcription(vec![StageError::transient("503")]),
        );
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator.submit("videos/a.mp4", "personal_info").await.unwrap();
        let job = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempt_count, 2);
        assert_eq!(fake.calls(), [1, 2, 0, 1]);
    }

    #[tokio::test]
    async fn empty_upload_reference_fails_permanently() {
        let fake = Arc::new(Fake::speaking("en", "hello"));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator.submit("", "personal_info").await.unwrap();
        let job = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 1);
        assert!(job.error_message.unwrap().contains("audio_extraction"));
        assert_eq!(fake.calls(), [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn stage_timeout_counts_as_transient() {
        let fake = Arc::new(Fake::speaking("en", "hello").slow_transcription(Duration::from_millis(500)));
        let options = PipelineOptions {
            stage_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let orchestrator = start(&fake, options, fast_config(2));

        let id = orchestrator.submit("videos/a.mp4", "personal_info").await.unwrap();
        let job = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 2);
        assert!(job.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn interrupted_attempts_past_budget_fail_without_running() {
        let fake = Arc::new(Fake::speaking("en", "hello"));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let mut job = Job::new("videos/a.mp4", "personal_info");
        job.status = JobStatus::Processing;
        job.attempt_count = 3;
        let id = job.id;
        orchestrator.store().insert(job).await;

        let outcome = orchestrator.run_attempt(id).await;
        assert!(matches!(outcome, AttemptOutcome::Failed { ref message } if message.contains("after 3 attempts")));
        assert_eq!(fake.calls(), [0, 0, 0, 0]);
        assert_eq!(orchestrator.store().get(id).await.unwrap().status, JobStatus::Failed);
    }

    // ── Orchestrator behaviour ───────────────────────────────────────────────

    #[tokio::test]
    async fn duplicate_enqueue_never_runs_concurrently() {
        let fake = Arc::new(Fake::speaking("en", "hello").slow_transcription(Duration::from_millis(50)));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator.store().create("videos/a.mp4", "personal_info").await.unwrap();
        for _ in 0..3 {
            orchestrator.enqueue(id).unwrap();
        }
        let job = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempt_count, 1);
        assert_eq!(fake.calls(), [1, 1, 0, 1]);
    }

    #[tokio::test]
    async fn enqueue_of_terminal_job_is_a_noop() {
        let fake = Arc::new(Fake::speaking("en", "hello"));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));

        let id = orchestrator.submit("videos/a.mp4", "personal_info").await.unwrap();
        let before = wait_terminal(orchestrator.store(), id).await;

        assert_eq!(orchestrator.run_attempt(id).await, AttemptOutcome::Skipped);
        let after = orchestrator.store().get(id).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn full_queue_rejects_enqueue() {
        let fake = Arc::new(Fake::speaking("en", "hello"));
        let config = RunnerConfig {
            worker_capacity: 1,
            queue_capacity: 1,
            ..fast_config(3)
        };
        let orchestrator = start(&fake, PipelineOptions::default(), config);

        let results: Vec<_> = (0..4).map(|_| orchestrator.enqueue(Uuid::new_v4())).collect();
        assert!(results[0].is_ok());
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(RuntimeError::QueueFull { capacity: 1 }))),
            "{results:?}"
        );
    }

    #[tokio::test]
    async fn recover_reenqueues_unfinished_jobs() {
        let fake = Arc::new(Fake::speaking("en", "hello"));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));
        let store = orchestrator.store().clone();

        let pending = store.create("videos/a.mp4", "personal_info").await.unwrap();
        let midway = store.create("videos/b.mp4", "personal_info").await.unwrap();
        store
            .update(
                midway,
                JobUpdate::new()
                    .start_attempt()
                    .artifact(artifact::AUDIO_PATH, json!("audio/extracted/b.mp3"))
                    .advance_to(1),
            )
            .await
            .unwrap();

        assert_eq!(orchestrator.recover().await.unwrap(), 2);

        let pending = wait_terminal(&store, pending).await;
        let midway = wait_terminal(&store, midway).await;
        assert_eq!(pending.status, JobStatus::Completed);
        assert_eq!(midway.status, JobStatus::Completed);
        assert_eq!(midway.attempt_count, 2);
        // Only the pending job needed audio extraction.
        assert_eq!(fake.audio_calls.load(Ordering::SeqCst), 1);

        assert_eq!(orchestrator.recover().await.unwrap(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn inline_attempt_logs_translation_skip() {
        let fake = Arc::new(Fake::speaking("en", "hello"));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));
        let id = orchestrator.store().create("videos/a.mp4", "personal_info").await.unwrap();

        assert_eq!(orchestrator.run_attempt(id).await, AttemptOutcome::Completed);
        assert!(logs_contain("translation skipped"));
    }

    #[tokio::test]
    #[traced_test]
    async fn recover_reports_its_count_once() {
        let fake = Arc::new(Fake::speaking("en", "hello"));
        let orchestrator = start(&fake, PipelineOptions::default(), fast_config(3));
        orchestrator.store().create("videos/a.mp4", "personal_info").await.unwrap();

        assert_eq!(orchestrator.recover().await.unwrap(), 1);
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("re-enqueued unfinished jobs")).count() {
                1 => Ok(()),
                n => Err(format!("expected one recovery line, found {n}")),
            }
        });
    }

    #[tokio::test]
    async fn store_failures_exhaust_budget_and_name_the_stage() {
        let fake = Arc::new(Fake::speaking("en", "hello"));
        let store = FlakyStore::default();
        let orchestrator = Orchestrator::start(
            store.clone(),
            Pipeline::standard(services(&fake), PipelineOptions::default()),
            fast_config(3),
        );

        let id = orchestrator.submit("videos/a.mp4", "personal_info").await.unwrap();
        let job = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = store.get(id).await.unwrap();
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not finish in time");

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 3);
        assert_eq!(job.stage_cursor, 0);
        let message = job.error_message.unwrap();
        assert!(message.contains("audio_extraction"), "{message}");
        assert!(message.contains("disk I/O error"), "{message}");
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(2), Duration::from_secs(60));
    }

    #[test]
    fn exponential_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            delay: Duration::from_secs(1),
            backoff: Backoff::Exponential {
                factor: 2.0,
                max_delay: Duration::from_secs(5),
            },
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[test]
    fn exponential_backoff_ignores_shrinking_factors() {
        for factor in [-2.0, 0.0, 0.5, f64::NAN] {
            let policy = RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_secs(60),
                backoff: Backoff::Exponential {
                    factor,
                    max_delay: Duration::from_secs(900),
                },
            };
            assert_eq!(policy.delay_for(1), Duration::from_secs(60), "factor {factor}");
            assert_eq!(policy.delay_for(2), Duration::from_secs(60), "factor {factor}");
            assert_eq!(policy.delay_for(5), Duration::from_secs(60), "factor {factor}");
        }
    }

    // ── Pipeline definition ──────────────────────────────────────────────────

    #[test]
    fn builder_rejects_out_of_order_stages() {
        let noop = |kind| Stage::new(kind, |_| async { Ok(Value::Null) });
        let err = PipelineBuilder::new(PipelineOptions::default())
            .stage(noop(StageKind::Transcription))
            .stage(noop(StageKind::AudioExtraction))
            .stage(noop(StageKind::Translation))
            .stage(noop(StageKind::FieldExtraction))
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidPipeline(_)));
    }

    #[tokio::test]
    async fn custom_pipeline_runs_supplied_operations() {
        let pipeline = PipelineBuilder::new(PipelineOptions::default())
            .stage(Stage::new(StageKind::AudioExtraction, |_| async { Ok(json!("a.mp3")) }))
            .stage(Stage::new(StageKind::Transcription, |_| async {
                Ok(json!({ "text": "hi", "language": "en" }))
            }))
            .stage(Stage::new(StageKind::Translation, |_| async { Ok(json!("hi")) }))
            .stage(Stage::new(StageKind::FieldExtraction, |_| async { Ok(json!({ "name": "x" })) }))
            .build()
            .unwrap();
        let store = MemoryJobStore::new();
        let id = store.create("videos/a.mp4", "personal_info").await.unwrap();
        let job = store.update(id, JobUpdate::new().start_attempt()).await.unwrap();

        let job = pipeline.run_attempt(&store, job).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output(), Some(&json!({ "name": "x" })));
    }

    // ── Status ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn status_of_unknown_job_is_not_found() {
        let status = StatusService::new(MemoryJobStore::new());
        let id = Uuid::new_v4();
        let err = status.status(id).await.unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound { job_id } if job_id == id));
    }

    #[tokio::test]
    async fn status_reports_stage_progress() {
        let store = MemoryJobStore::new();
        let status = StatusService::new(store.clone());
        let id = store.create("videos/a.mp4", "personal_info").await.unwrap();

        let view = status.status(id).await.unwrap();
        assert_eq!(view.status, JobStatus::Pending);
        assert_eq!(view.stage_progress.completed, 0);
        assert_eq!(view.stage_progress.current_stage.as_deref(), Some("audio_extraction"));

        store
            .update(
                id,
                JobUpdate::new()
                    .start_attempt()
                    .artifact(artifact::AUDIO_PATH, json!("a.mp3"))
                    .advance_to(1),
            )
            .await
            .unwrap();
        let view = status.status(id).await.unwrap();
        assert_eq!(view.status, JobStatus::Processing);
        assert_eq!(view.stage_progress.completed, 1);
        assert_eq!(view.stage_progress.total, 4);
        assert_eq!(view.stage_progress.current_stage.as_deref(), Some("transcription"));
        assert!(view.output.is_none());

        store.update(id, JobUpdate::new().fail("boom")).await.unwrap();
        let view = status.status(id).await.unwrap();
        assert_eq!(view.error_message.as_deref(), Some("boom"));
        assert!(view.stage_progress.current_stage.is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filters_by_status() {
        let store = MemoryJobStore::new();
        let first = store.create("videos/a.mp4", "personal_info").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = store.create("videos/b.mp4", "personal_info").await.unwrap();
        store.update(first, JobUpdate::new().fail("boom")).await.unwrap();

        let status = StatusService::new(store);
        let all: Vec<_> = status.list(None).await.unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(all, vec![second, first]);

        let failed = status.list(Some(JobStatus::Failed)).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, first);
    }
}
