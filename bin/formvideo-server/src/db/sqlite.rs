//! SQLite implementation of [`JobStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature. Migrations are embedded at
//! compile time (`sqlx::migrate!` resolves `./migrations` relative to
//! `CARGO_MANIFEST_DIR`) and run on [`SqliteJobStore::connect`].
//!
//! Runtime-checked `sqlx::query` is used so no `DATABASE_URL` is needed at
//! compile time.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use formvideo_core::{Artifacts, Job, JobId, JobStatus, JobStore, JobUpdate, RuntimeError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::warn;

const SELECT_JOB: &str = "SELECT id, form_type, upload_ref, status, stage_cursor, error_message, \
                          artifacts, attempt_count, created_at, updated_at FROM jobs";

type JobRow = (
    String,
    String,
    String,
    String,
    i64,
    Option<String>,
    String,
    i64,
    String,
    String,
);

/// SQLite-backed job store.
#[derive(Clone, Debug)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://formvideo.db"` or
    /// `"sqlite::memory:"` for tests. In-memory databases use a single
    /// connection so every query sees the same database.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let in_memory = url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 8 })
            .idle_timeout(if in_memory { None } else { Some(Duration::from_secs(600)) })
            .max_lifetime(if in_memory { None } else { Some(Duration::from_secs(1800)) })
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn store_err(e: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::Store(e.to_string())
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    // Fixed-width so lexical order matches chronological order.
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        warn!(raw = %raw, error = %e, "failed to parse job timestamp; using now");
        Utc::now()
    })
}

fn row_to_job(row: JobRow) -> Result<Job, RuntimeError> {
    let (id, form_type, upload_ref, status, stage_cursor, error_message, artifacts, attempt_count, created_at, updated_at) =
        row;
    Ok(Job {
        id: id.parse::<JobId>().map_err(store_err)?,
        form_type,
        upload_ref,
        status: JobStatus::from_str(&status).map_err(|e| store_err(format!("status '{status}': {e}")))?,
        stage_cursor: usize::try_from(stage_cursor).map_err(store_err)?,
        error_message,
        artifacts: serde_json::from_str::<Artifacts>(&artifacts).map_err(store_err)?,
        attempt_count: u32::try_from(attempt_count).map_err(store_err)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

impl JobStore for SqliteJobStore {
    async fn create(&self, upload_ref: &str, form_type: &str) -> Result<JobId, RuntimeError> {
        let job = Job::new(upload_ref, form_type);
        sqlx::query(
            "INSERT INTO jobs (id, form_type, upload_ref, status, stage_cursor, error_message, \
             artifacts, attempt_count, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(job.id.to_string())
        .bind(&job.form_type)
        .bind(&job.upload_ref)
        .bind(job.status.as_ref())
        .bind(job.stage_cursor as i64)
        .bind(&job.error_message)
        .bind(serde_json::to_string(&job.artifacts).map_err(store_err)?)
        .bind(job.attempt_count as i64)
        .bind(timestamp(&job.created_at))
        .bind(timestamp(&job.updated_at))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(job.id)
    }

    async fn get(&self, id: JobId) -> Result<Job, RuntimeError> {
        let row: Option<JobRow> = sqlx::query_as(&format!("{SELECT_JOB} WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row_to_job(row.ok_or(RuntimeError::NotFound { job_id: id })?)
    }

    async fn update(&self, id: JobId, update: JobUpdate) -> Result<Job, RuntimeError> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // Take the write lock before reading so concurrent updates queue on
        // busy_timeout instead of failing on lock upgrade.
        let touched = sqlx::query("UPDATE jobs SET id = id WHERE id = ?1")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        if touched.rows_affected() == 0 {
            return Err(RuntimeError::NotFound { job_id: id });
        }

        let row: JobRow = sqlx::query_as(&format!("{SELECT_JOB} WHERE id = ?1"))
            .bind(&id_str)
            .fetch_one(&mut *tx)
            .await
            .map_err(store_err)?;
        let mut job = row_to_job(row)?;

        // A rejected update drops `tx`, which rolls back.
        update.apply(&mut job)?;

        sqlx::query(
            "UPDATE jobs SET status = ?1, stage_cursor = ?2, error_message = ?3, artifacts = ?4, \
             attempt_count = ?5, updated_at = ?6 WHERE id = ?7",
        )
        .bind(job.status.as_ref())
        .bind(job.stage_cursor as i64)
        .bind(&job.error_message)
        .bind(serde_json::to_string(&job.artifacts).map_err(store_err)?)
        .bind(job.attempt_count as i64)
        .bind(timestamp(&job.updated_at))
        .bind(&id_str)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(job)
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, RuntimeError> {
        let rows: Vec<JobRow> = if let Some(status) = status {
            sqlx::query_as(&format!("{SELECT_JOB} WHERE status = ?1 ORDER BY created_at DESC"))
                .bind(status.as_ref())
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query_as(&format!("{SELECT_JOB} ORDER BY created_at DESC"))
                .fetch_all(&self.pool)
                .await
        }
        .map_err(store_err)?;
        rows.into_iter().map(row_to_job).collect()
    }

    async fn non_terminal(&self) -> Result<Vec<Job>, RuntimeError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "{SELECT_JOB} WHERE status IN ('pending', 'processing') ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(row_to_job).collect()
    }
}
