use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;

use super::task::{new_task_id, IngestionTask, TaskStatus, TaskUpdate};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ingestion_tasks (
    task_id            TEXT PRIMARY KEY,
    datasource_name    TEXT NOT NULL,
    original_filename  TEXT NOT NULL,
    file_uri           TEXT NOT NULL,
    status             TEXT NOT NULL,
    external_job_id    TEXT,
    created_at         TEXT NOT NULL,
    started_at         TEXT,
    completed_at       TEXT,
    error_message      TEXT,
    validation_errors  TEXT,
    file_size          INTEGER,
    row_count          INTEGER
);
CREATE INDEX IF NOT EXISTS idx_ingestion_tasks_created_at ON ingestion_tasks (created_at);
CREATE INDEX IF NOT EXISTS idx_ingestion_tasks_status ON ingestion_tasks (status);
";

const COLUMNS: &str = "task_id, datasource_name, original_filename, file_uri, status, external_job_id, \
    created_at, started_at, completed_at, error_message, validation_errors, file_size, row_count";

const DEFAULT_ERROR_MESSAGE: &str = "unknown error";

/// Durable task records in SQLite.
///
/// Every pipeline run writes only its own row, so a single connection behind a mutex is enough.
pub struct TaskStateStore {
    conn: Mutex<Connection>,
}

impl TaskStateStore {
    /// Open (creating if needed) a store backed by a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "wal")?;
        Self::init(conn)
    }

    /// A private in-memory store, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Create a task in `ACCEPTED` with a fresh id.
    pub fn create(
        &self,
        datasource_name: &str,
        filename: &str,
        file_uri: &str,
        size: Option<u64>,
    ) -> Result<IngestionTask, StoreError> {
        self.create_with_id(&new_task_id(), datasource_name, filename, file_uri, size)
    }

    /// Create a task in `ACCEPTED` under a caller-generated id.
    pub fn create_with_id(
        &self,
        task_id: &str,
        datasource_name: &str,
        filename: &str,
        file_uri: &str,
        size: Option<u64>,
    ) -> Result<IngestionTask, StoreError> {
        let task = IngestionTask {
            task_id: task_id.to_string(),
            datasource_name: datasource_name.to_string(),
            original_filename: filename.to_string(),
            file_uri: file_uri.to_string(),
            status: TaskStatus::Accepted,
            external_job_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            validation_errors: None,
            file_size: size,
            row_count: None,
        };

        self.conn()?.execute(
            &format!("INSERT INTO ingestion_tasks ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"),
            params![
                task.task_id,
                task.datasource_name,
                task.original_filename,
                task.file_uri,
                task.status.as_str(),
                task.external_job_id,
                ts_to_text(&task.created_at),
                Option::<String>::None,
                Option::<String>::None,
                task.error_message,
                Option::<String>::None,
                task.file_size.map(|v| v as i64),
                Option::<i64>::None,
            ],
        )?;

        tracing::debug!(task_id = %task.task_id, datasource = %task.datasource_name, "task created");
        Ok(task)
    }

    pub fn get(&self, task_id: &str) -> Result<Option<IngestionTask>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM ingestion_tasks WHERE task_id = ?1"),
                params![task_id],
                TaskRow::from_row,
            )
            .optional()?;
        row.map(TaskRow::into_task).transpose()
    }

    /// Move a task to `new_status`, merging the supplied fields.
    ///
    /// - `status` is always overwritten; other fields only when supplied.
    /// - `started_at` is stamped on entering `PROCESSING`, `completed_at` on entering a terminal
    ///   state; neither is overwritten once set.
    /// - `error_message` is stored only with `FAILED`.
    /// - Illegal transitions fail with [`StoreError::InvalidTransition`] and change nothing.
    ///
    /// Returns `Ok(None)` for an unknown task.
    pub fn update_status(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        update: TaskUpdate,
    ) -> Result<Option<IngestionTask>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let current = tx
            .query_row(
                &format!("SELECT {COLUMNS} FROM ingestion_tasks WHERE task_id = ?1"),
                params![task_id],
                TaskRow::from_row,
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(None);
        };
        let mut task = current.into_task()?;

        if !task.status.can_transition_to(new_status) {
            return Err(StoreError::InvalidTransition {
                task_id: task_id.to_string(),
                from: task.status,
                to: new_status,
            });
        }

        let now = Utc::now();
        let from = task.status;
        task.status = new_status;
        if new_status == TaskStatus::Processing && task.started_at.is_none() {
            task.started_at = Some(now);
        }
        if new_status.is_terminal() && task.completed_at.is_none() {
            task.completed_at = Some(now);
        }
        if new_status == TaskStatus::Failed {
            task.error_message = Some(
                update
                    .error_message
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            );
        }
        if let Some(job_id) = update.external_job_id {
            task.external_job_id = Some(job_id);
        }
        if let Some(issues) = update.validation_errors {
            task.validation_errors = Some(issues);
        }
        if let Some(size) = update.file_size {
            task.file_size = Some(size);
        }
        if let Some(rows) = update.row_count {
            task.row_count = Some(rows);
        }

        let validation_json = task
            .validation_errors
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        tx.execute(
            "UPDATE ingestion_tasks SET status = ?2, external_job_id = ?3, started_at = ?4, \
             completed_at = ?5, error_message = ?6, validation_errors = ?7, file_size = ?8, row_count = ?9 \
             WHERE task_id = ?1",
            params![
                task.task_id,
                task.status.as_str(),
                task.external_job_id,
                task.started_at.as_ref().map(ts_to_text),
                task.completed_at.as_ref().map(ts_to_text),
                task.error_message,
                validation_json,
                task.file_size.map(|v| v as i64),
                task.row_count.map(|v| v as i64),
            ],
        )?;
        tx.commit()?;

        tracing::debug!(task_id, %from, to = %new_status, "task status updated");
        Ok(Some(task))
    }

    /// Tasks newest first.
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<IngestionTask>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM ingestion_tasks ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], TaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Number of tasks in each status. Useful for spotting rows stuck after a crash.
    pub fn count_by_status(&self) -> Result<BTreeMap<TaskStatus, u64>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM ingestion_tasks GROUP BY status")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = BTreeMap::new();
        for (status, count) in pairs {
            out.insert(status.parse::<TaskStatus>()?, count as u64);
        }
        Ok(out)
    }
}

/// Raw column values, converted to an [`IngestionTask`] outside the rusqlite row callback.
struct TaskRow {
    task_id: String,
    datasource_name: String,
    original_filename: String,
    file_uri: String,
    status: String,
    external_job_id: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    error_message: Option<String>,
    validation_errors: Option<String>,
    file_size: Option<i64>,
    row_count: Option<i64>,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            task_id: row.get(0)?,
            datasource_name: row.get(1)?,
            original_filename: row.get(2)?,
            file_uri: row.get(3)?,
            status: row.get(4)?,
            external_job_id: row.get(5)?,
            created_at: row.get(6)?,
            started_at: row.get(7)?,
            completed_at: row.get(8)?,
            error_message: row.get(9)?,
            validation_errors: row.get(10)?,
            file_size: row.get(11)?,
            row_count: row.get(12)?,
        })
    }

    fn into_task(self) -> Result<IngestionTask, StoreError> {
        Ok(IngestionTask {
            task_id: self.task_id,
            datasource_name: self.datasource_name,
            original_filename: self.original_filename,
            file_uri: self.file_uri,
            status: self.status.parse()?,
            external_job_id: self.external_job_id,
            created_at: text_to_ts(&self.created_at)?,
            started_at: self.started_at.as_deref().map(text_to_ts).transpose()?,
            completed_at: self.completed_at.as_deref().map(text_to_ts).transpose()?,
            error_message: self.error_message,
            validation_errors: self
                .validation_errors
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            file_size: self.file_size.map(|v| v as u64),
            row_count: self.row_count.map(|v| v as u64),
        })
    }
}

fn ts_to_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn text_to_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp(raw.to_string()))
}
