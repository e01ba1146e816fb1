use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::runtime::job::JobUpdate;
use crate::runtime::pipeline::Pipeline;
use crate::runtime::stage::StageKind;
use crate::runtime::storage::JobStore;
use crate::runtime::types::{JobId, RuntimeError};

/// Commands sent to the orchestrator's internal event loop.
#[derive(Debug)]
enum OrchestratorCommand {
    /// A fresh submission or recovery request.
    Run { job_id: JobId },
    /// A scheduled retry; the job is already marked in flight.
    Retry { job_id: JobId },
}

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Every retry waits the base delay.
    Fixed,
    /// The base delay is multiplied by `factor` per completed attempt, capped at `max_delay`.
    Exponential { factor: f64, max_delay: Duration },
}

/// Retry budget for transient failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(60),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max_delay } => {
                // Factors below 1 (and NaN) count as 1.
                let factor = if factor >= 1.0 { factor } else { 1.0 };
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = self.delay.as_secs_f64() * factor.powi(exponent);
                if secs <= 0.0 {
                    self.delay
                } else if !secs.is_finite() || secs >= max_delay.as_secs_f64() {
                    max_delay
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    pub retry: RetryPolicy,
    /// Attempts that may run at the same time.
    pub worker_capacity: usize,
    /// Pending enqueue requests before [`RuntimeError::QueueFull`].
    pub queue_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            worker_capacity: 4,
            queue_capacity: 64,
        }
    }
}

/// Result of a single attempt, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Completed,
    /// The job was moved to `Failed` with this message.
    Failed { message: String },
    /// A transient failure within budget; the next attempt is due after `delay`.
    Retry { delay: Duration },
    /// Nothing to do: the job is unknown, already terminal, or could not be loaded.
    Skipped,
}

/// Drives enqueued jobs through the pipeline.
///
/// Owns the only place where attempts are counted, failures classified and
/// retries scheduled. At most one attempt per job is in flight: a duplicate
/// enqueue while the job is running (or waiting for a retry) is dropped.
///
/// # Usage
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::start(store, pipeline, RunnerConfig::default());
/// let job_id = orchestrator.submit("videos/clip.mp4", "personal_info").await?;
/// ```
pub struct Orchestrator<S: JobStore> {
    tx: mpsc::Sender<OrchestratorCommand>,
    worker: Arc<Worker<S>>,
}

impl<S: JobStore> Clone for Orchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            worker: Arc::clone(&self.worker),
        }
    }
}

impl<S: JobStore> std::fmt::Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("queue_capacity", &self.tx.max_capacity())
            .field("retry", &self.worker.retry)
            .finish_non_exhaustive()
    }
}

struct Worker<S: JobStore> {
    store: S,
    pipeline: Pipeline,
    retry: RetryPolicy,
    permits: Arc<Semaphore>,
    in_flight: Mutex<HashSet<JobId>>,
    retry_tx: mpsc::WeakSender<OrchestratorCommand>,
}

impl<S: JobStore> Orchestrator<S> {
    /// Start the orchestrator.
    ///
    /// Spawns the internal dispatch loop and returns a cloneable handle. The
    /// loop stops once every handle is dropped.
    pub fn start(store: S, pipeline: Pipeline, config: RunnerConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = Arc::new(Worker {
            store,
            pipeline,
            retry: config.retry,
            permits: Arc::new(Semaphore::new(config.worker_capacity.max(1))),
            in_flight: Mutex::new(HashSet::new()),
            retry_tx: tx.downgrade(),
        });

        tokio::spawn(Self::run_loop(rx, Arc::clone(&worker)));

        Self { tx, worker }
    }

    /// Internal event loop: dedups requests and hands jobs to workers.
    async fn run_loop(mut rx: mpsc::Receiver<OrchestratorCommand>, worker: Arc<Worker<S>>) {
        while let Some(cmd) = rx.recv().await {
            let job_id = match cmd {
                OrchestratorCommand::Run { job_id } => {
                    if !worker.in_flight.lock().await.insert(job_id) {
                        warn!(job_id = %job_id, "job already in flight; duplicate enqueue dropped");
                        continue;
                    }
                    job_id
                }
                OrchestratorCommand::Retry { job_id } => job_id,
            };

            let permit = match Arc::clone(&worker.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let worker = Arc::clone(&worker);
            tokio::spawn(async move {
                let outcome = worker.execute_attempt(job_id).await;
                drop(permit);
                match outcome {
                    AttemptOutcome::Retry { delay } => worker.schedule_retry(job_id, delay),
                    _ => {
                        worker.in_flight.lock().await.remove(&job_id);
                    }
                }
            });
        }
        debug!("orchestrator loop stopped");
    }

    // ── Public API ───────────────────────────────────────────────────────────

    /// Request processing of `job_id`.
    ///
    /// Returns immediately. Enqueueing a terminal or unknown job is a no-op
    /// once the request is dequeued. Returns [`RuntimeError::QueueFull`] if the
    /// queue is saturated.
    pub fn enqueue(&self, job_id: JobId) -> Result<(), RuntimeError> {
        self.tx
            .try_send(OrchestratorCommand::Run { job_id })
            .map_err(|e| self.send_error(e))
    }

    /// Create a `Pending` job and enqueue it.
    ///
    /// A queue slot is reserved first, so a full queue fails with
    /// [`RuntimeError::QueueFull`] without creating a job.
    pub async fn submit(&self, upload_ref: &str, form_type: &str) -> Result<JobId, RuntimeError> {
        let permit = self.tx.try_reserve().map_err(|e| self.send_error(e))?;
        let job_id = self.worker.store.create(upload_ref, form_type).await?;
        info!(job_id = %job_id, form_type, "job submitted");
        permit.send(OrchestratorCommand::Run { job_id });
        Ok(job_id)
    }

    fn send_error<T>(&self, e: mpsc::error::TrySendError<T>) -> RuntimeError {
        match e {
            mpsc::error::TrySendError::Full(_) => RuntimeError::QueueFull {
                capacity: self.tx.max_capacity(),
            },
            mpsc::error::TrySendError::Closed(_) => RuntimeError::Shutdown,
        }
    }

    /// Re-enqueue every non-terminal job, oldest first.
    ///
    /// Waits for queue space instead of failing with `QueueFull`.
    pub async fn recover(&self) -> Result<usize, RuntimeError> {
        let mut jobs = self.worker.store.non_terminal().await?;
        jobs.reverse();
        let count = jobs.len();
        for job in jobs {
            self.tx
                .send(OrchestratorCommand::Run { job_id: job.id })
                .await
                .map_err(|_| RuntimeError::Shutdown)?;
        }
        if count > 0 {
            info!(count, "re-enqueued unfinished jobs");
        }
        Ok(count)
    }

    /// Run one attempt inline, bypassing the queue and retry scheduling.
    ///
    /// Callers must not combine this with a queued run of the same job.
    pub async fn run_attempt(&self, job_id: JobId) -> AttemptOutcome {
        self.worker.execute_attempt(job_id).await
    }

    pub fn store(&self) -> &S {
        &self.worker.store
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.worker.retry
    }
}

impl<S: JobStore> Worker<S> {
    /// One attempt: count it, run the pipeline from the cursor, classify the result.
    async fn execute_attempt(&self, job_id: JobId) -> AttemptOutcome {
        let job = match self.store.get(job_id).await {
            Ok(job) => job,
            Err(RuntimeError::NotFound { .. }) => {
                warn!(job_id = %job_id, "enqueued job does not exist");
                return AttemptOutcome::Skipped;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "could not load job");
                return AttemptOutcome::Skipped;
            }
        };

        if job.status.is_terminal() {
            debug!(job_id = %job_id, status = %job.status, "job already terminal");
            return AttemptOutcome::Skipped;
        }

        // Budget spent by attempts that never reported back (e.g. a crash mid-attempt).
        if job.attempt_count >= self.retry.max_attempts {
            let stage = StageKind::at(job.stage_cursor + 1)
                .map(|k| k.name())
                .unwrap_or("pipeline");
            let err = RuntimeError::AttemptsExhausted {
                stage: stage.to_owned(),
                attempts: job.attempt_count,
                message: "attempt interrupted".to_owned(),
            };
            return self.fail(job_id, format!("Error processing video: {err}")).await;
        }

        let job = match self.store.update(job_id, JobUpdate::new().start_attempt()).await {
            Ok(job) => job,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "could not start attempt");
                return AttemptOutcome::Skipped;
            }
        };
        let attempt = job.attempt_count;
        let start_cursor = job.stage_cursor;
        info!(job_id = %job_id, attempt, cursor = start_cursor, "attempt started");

        let span = info_span!("attempt", job_id = %job_id, attempt);
        let err = match self.pipeline.run_attempt(&self.store, job).instrument(span).await {
            Ok(_) => {
                info!(job_id = %job_id, attempt, "job completed");
                return AttemptOutcome::Completed;
            }
            Err(err) => err,
        };

        let retryable = match &err {
            RuntimeError::StageFailed { source, .. } => source.is_retryable(),
            RuntimeError::Store(_) => true,
            _ => false,
        };

        if !retryable {
            return self.fail(job_id, format!("Error processing video: {err}")).await;
        }

        if attempt >= self.retry.max_attempts {
            let message = match err {
                RuntimeError::StageFailed { stage, source } => RuntimeError::AttemptsExhausted {
                    stage,
                    attempts: attempt,
                    message: source.message().to_owned(),
                }
                .to_string(),
                other => RuntimeError::AttemptsExhausted {
                    stage: StageKind::at(start_cursor + 1)
                        .map(|k| k.name())
                        .unwrap_or("pipeline")
                        .to_owned(),
                    attempts: attempt,
                    message: other.to_string(),
                }
                .to_string(),
            };
            return self.fail(job_id, format!("Error processing video: {message}")).await;
        }

        let delay = self.retry.delay_for(attempt);
        warn!(
            job_id = %job_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient failure; retry scheduled"
        );
        AttemptOutcome::Retry { delay }
    }

    async fn fail(&self, job_id: JobId, message: String) -> AttemptOutcome {
        error!(job_id = %job_id, error = %message, "job failed");
        if let Err(e) = self
            .store
            .update(job_id, JobUpdate::new().fail(message.clone()))
            .await
        {
            error!(job_id = %job_id, error = %e, "could not record failure");
        }
        AttemptOutcome::Failed { message }
    }

    /// Sleep, then re-submit `job_id` while keeping it marked in flight.
    fn schedule_retry(self: &Arc<Self>, job_id: JobId, delay: Duration) {
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let sent = match worker.retry_tx.upgrade() {
                Some(tx) => tx.send(OrchestratorCommand::Retry { job_id }).await.is_ok(),
                None => false,
            };
            if !sent {
                worker.in_flight.lock().await.remove(&job_id);
                debug!(job_id = %job_id, "orchestrator stopped; retry dropped");
            }
        });
    }
}
