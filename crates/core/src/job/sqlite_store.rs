//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::format::{Category, Format};

use super::{CreateJobRequest, Job, JobError, JobFilter, JobStatus, JobStore};

const JOB_COLUMNS: &str = "id, original_filename, source_format, target_format, category, \
     status, error_message, source_artifact, converted_artifact, source_size, \
     converted_size, checksum, attempts, created_at, updated_at, completed_at";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables
    /// if needed.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path).map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory().map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                original_filename TEXT NOT NULL,
                source_format TEXT NOT NULL,
                target_format TEXT NOT NULL,
                category TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                source_artifact TEXT NOT NULL,
                converted_artifact TEXT,
                source_size INTEGER NOT NULL,
                converted_size INTEGER,
                checksum TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_jobs_category ON jobs(category);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
            "#,
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }

        if let Some(category) = filter.category {
            conditions.push("category = ?");
            params.push(Box::new(category.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn conversion_failure(
        index: usize,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let id: String = row.get(0)?;
        let original_filename: String = row.get(1)?;
        let source_format_str: String = row.get(2)?;
        let target_format_str: String = row.get(3)?;
        let category_str: String = row.get(4)?;
        let status_str: String = row.get(5)?;
        let error_message: Option<String> = row.get(6)?;
        let source_artifact: String = row.get(7)?;
        let converted_artifact: Option<String> = row.get(8)?;
        let source_size: u64 = row.get::<_, i64>(9)? as u64;
        let converted_size: Option<u64> = row.get::<_, Option<i64>>(10)?.map(|v| v as u64);
        let checksum: Option<String> = row.get(11)?;
        let attempts: u32 = row.get(12)?;
        let created_at_str: String = row.get(13)?;
        let updated_at_str: String = row.get(14)?;
        let completed_at_str: Option<String> = row.get(15)?;

        let source_format =
            Format::parse(&source_format_str).map_err(|e| Self::conversion_failure(2, e))?;
        let target_format =
            Format::parse(&target_format_str).map_err(|e| Self::conversion_failure(3, e))?;
        let category =
            Category::parse(&category_str).map_err(|e| Self::conversion_failure(4, e))?;

        // Unknown status values should never appear with valid data.
        let status = JobStatus::parse(&status_str).unwrap_or(JobStatus::Failed);

        Ok(Job {
            id,
            original_filename,
            source_format,
            target_format,
            category,
            status,
            error_message,
            source_artifact,
            converted_artifact,
            source_size,
            converted_size,
            checksum,
            attempts,
            created_at: Self::parse_timestamp(&created_at_str),
            updated_at: Self::parse_timestamp(&updated_at_str),
            completed_at: completed_at_str.as_deref().map(Self::parse_timestamp),
        })
    }

    fn get_locked(conn: &Connection, id: &str) -> Result<Job, JobError> {
        let result = conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
            params![id],
            Self::row_to_job,
        );

        match result {
            Ok(job) => Ok(job),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(JobError::NotFound(id.to_string())),
            Err(e) => Err(JobError::Database(e.to_string())),
        }
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO jobs (id, original_filename, source_format, target_format, category, \
             status, source_artifact, source_size, attempts, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
            params![
                id,
                request.original_filename,
                request.source_format.as_str(),
                request.target_format.as_str(),
                request.category.as_str(),
                JobStatus::Pending.as_str(),
                request.source_artifact,
                request.source_size as i64,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(Job {
            id,
            original_filename: request.original_filename,
            source_format: request.source_format,
            target_format: request.target_format,
            category: request.category,
            status: JobStatus::Pending,
            error_message: None,
            source_artifact: request.source_artifact,
            converted_artifact: None,
            source_size: request.source_size,
            converted_size: None,
            checksum: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
        let conn = self.conn.lock().unwrap();

        match Self::get_locked(&conn, id) {
            Ok(job) => Ok(Some(job)),
            Err(JobError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_job)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut jobs = Vec::new();
        for row_result in rows {
            jobs.push(row_result.map_err(|e| JobError::Database(e.to_string()))?);
        }

        Ok(jobs)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| JobError::Database(e.to_string()))
    }

    fn mark_processing(&self, id: &str, expected_attempts: u32) -> Result<Job, JobError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let changed = conn
            .execute(
                "UPDATE jobs SET status = ?, error_message = NULL, attempts = attempts + 1, \
                 updated_at = ? WHERE id = ? AND attempts = ?",
                params![
                    JobStatus::Processing.as_str(),
                    now.to_rfc3339(),
                    id,
                    expected_attempts,
                ],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        if changed == 0 {
            // Either the job is gone or the counter moved on without us.
            let current = Self::get_locked(&conn, id)?;
            return Err(JobError::StaleClaim {
                id: id.to_string(),
                attempts: current.attempts,
            });
        }

        Self::get_locked(&conn, id)
    }

    fn complete(
        &self,
        id: &str,
        converted_artifact: &str,
        converted_size: u64,
        checksum: &str,
    ) -> Result<Job, JobError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let changed = conn
            .execute(
                "UPDATE jobs SET status = ?, converted_artifact = ?, converted_size = ?, \
                 checksum = ?, error_message = NULL, completed_at = ?, updated_at = ? \
                 WHERE id = ?",
                params![
                    JobStatus::Completed.as_str(),
                    converted_artifact,
                    converted_size as i64,
                    checksum,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                    id,
                ],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(JobError::NotFound(id.to_string()));
        }

        Self::get_locked(&conn, id)
    }

    fn fail(&self, id: &str, error: &str) -> Result<Job, JobError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let changed = conn
            .execute(
                "UPDATE jobs SET status = ?, error_message = ?, converted_artifact = NULL, \
                 converted_size = NULL, checksum = NULL, updated_at = ? WHERE id = ?",
                params![JobStatus::Failed.as_str(), error, now.to_rfc3339(), id],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(JobError::NotFound(id.to_string()));
        }

        Self::get_locked(&conn, id)
    }

    fn list_created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Job>, JobError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT {} FROM jobs WHERE created_at < ? ORDER BY created_at ASC LIMIT ?",
            JOB_COLUMNS
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![cutoff.to_rfc3339(), limit], Self::row_to_job)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut jobs = Vec::new();
        for row_result in rows {
            jobs.push(row_result.map_err(|e| JobError::Database(e.to_string()))?);
        }

        Ok(jobs)
    }

    fn delete(&self, id: &str) -> Result<Job, JobError> {
        let conn = self.conn.lock().unwrap();

        let job = Self::get_locked(&conn, id)?;

        conn.execute("DELETE FROM jobs WHERE id = ?", params![id])
            .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(job)
    }
}
