//! Append-only run history backed by SQLite.
//!
//! Every backup run appends exactly one [`BackupRecord`]; records are never
//! updated or deleted. Retention cleanup may later remove the archive file a
//! record points to; the record itself keeps the dangling filename.

use crate::backup::result_error::result::Result;
use chrono::{DateTime, Utc};
use derive_more::Display;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// File name of the history database inside the backup directory
pub static HISTORY_DB_NAME: &str = "backup_history.db";

static SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS backup_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    backup_type TEXT NOT NULL,
    filename TEXT NOT NULL,
    file_size INTEGER,
    duration_seconds REAL,
    status TEXT NOT NULL,
    error_message TEXT,
    checksum TEXT,
    files_count INTEGER,
    compressed_size INTEGER
);
CREATE INDEX IF NOT EXISTS idx_timestamp ON backup_history(timestamp);
CREATE INDEX IF NOT EXISTS idx_status ON backup_history(status);
";

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupType {
    #[display("full")]
    Full,
    #[display("incremental")]
    Incremental,
    #[display("database_only")]
    DatabaseOnly,
    #[display("files_only")]
    FilesOnly,
}

impl FromStr for BackupType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "full" => Ok(BackupType::Full),
            "incremental" => Ok(BackupType::Incremental),
            "database_only" => Ok(BackupType::DatabaseOnly),
            "files_only" => Ok(BackupType::FilesOnly),
            other => Err(format!("unknown backup type: {other:?}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[display("success")]
    Success,
    #[display("error")]
    Error,
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "error" => Ok(RunStatus::Error),
            other => Err(format!("unknown run status: {other:?}")),
        }
    }
}

impl ToSql for BackupType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for BackupType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for RunStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for RunStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// One immutable row of run history
#[derive(Clone, Debug)]
pub struct BackupRecord {
    /// Assigned by the store; 0 before insertion
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub backup_type: BackupType,
    pub filename: String,
    pub file_size: u64,
    pub duration_seconds: f64,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub checksum: Option<String>,
    pub files_count: u64,
    pub compressed_size: u64,
}

/// Aggregate statistics over the whole history
#[derive(Clone, Debug, Default)]
pub struct HistoryStatistics {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub success_rate: f64,
    pub total_size: u64,
    pub avg_duration: f64,
    pub by_type: Vec<TypeStatistics>,
}

#[derive(Clone, Debug)]
pub struct TypeStatistics {
    pub backup_type: BackupType,
    pub runs: u64,
    pub avg_duration: f64,
    pub total_size: u64,
}

pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    /// Opens (creating if needed) the history database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Appends one run record, returning its assigned id.
    pub fn record(&self, record: &BackupRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO backup_history
             (timestamp, backup_type, filename, file_size, duration_seconds,
              status, error_message, checksum, files_count, compressed_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.timestamp,
                record.backup_type,
                record.filename,
                record.file_size as i64,
                record.duration_seconds,
                record.status,
                record.error_message,
                record.checksum,
                record.files_count as i64,
                record.compressed_size as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Returns the `limit` most recent records, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<BackupRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, backup_type, filename, file_size, duration_seconds,
                    status, error_message, checksum, files_count, compressed_size
             FROM backup_history ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(BackupRecord {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                backup_type: row.get(2)?,
                filename: row.get(3)?,
                file_size: row.get::<_, i64>(4)? as u64,
                duration_seconds: row.get(5)?,
                status: row.get(6)?,
                error_message: row.get(7)?,
                checksum: row.get(8)?,
                files_count: row.get::<_, i64>(9)? as u64,
                compressed_size: row.get::<_, i64>(10)? as u64,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Computes aggregate statistics; an empty history yields zeroed values.
    pub fn statistics(&self) -> Result<HistoryStatistics> {
        let (total_runs, successful_runs, total_size, avg_duration) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(file_size), 0),
                    COALESCE(AVG(duration_seconds), 0)
             FROM backup_history",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, i64>(2)? as u64,
                    row.get::<_, f64>(3)?,
                ))
            },
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT backup_type, COUNT(*),
                    COALESCE(AVG(duration_seconds), 0),
                    COALESCE(SUM(file_size), 0)
             FROM backup_history
             WHERE status = 'success'
             GROUP BY backup_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TypeStatistics {
                backup_type: row.get(0)?,
                runs: row.get::<_, i64>(1)? as u64,
                avg_duration: row.get(2)?,
                total_size: row.get::<_, i64>(3)? as u64,
            })
        })?;

        let mut by_type = Vec::new();
        for row in rows {
            by_type.push(row?);
        }

        let success_rate = if total_runs > 0 {
            successful_runs as f64 / total_runs as f64 * 100.0
        } else {
            0.0
        };

        Ok(HistoryStatistics {
            total_runs,
            successful_runs,
            success_rate,
            total_size,
            avg_duration,
            by_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(backup_type: BackupType, status: RunStatus, filename: &str) -> BackupRecord {
        BackupRecord {
            id: 0,
            timestamp: Utc::now(),
            backup_type,
            filename: filename.to_string(),
            file_size: 1000,
            duration_seconds: 2.5,
            status,
            error_message: None,
            checksum: Some("abc123".to_string()),
            files_count: 10,
            compressed_size: 400,
        }
    }

    #[test]
    fn test_empty_history_yields_zeroed_statistics() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::open(temp_dir.path().join(HISTORY_DB_NAME)).unwrap();

        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.successful_runs, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.avg_duration, 0.0);
        assert!(stats.by_type.is_empty());

        assert!(store.recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_two_runs_produce_two_distinct_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::open(temp_dir.path().join(HISTORY_DB_NAME)).unwrap();

        let id1 = store
            .record(&record(
                BackupType::Full,
                RunStatus::Success,
                "backup_full_20260101_020000.tar.xz",
            ))
            .unwrap();
        let id2 = store
            .record(&record(
                BackupType::Full,
                RunStatus::Success,
                "backup_full_20260102_020000.tar.xz",
            ))
            .unwrap();
        assert_ne!(id1, id2);

        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|r| r.status == RunStatus::Success));
        assert_ne!(recent[0].filename, recent[1].filename);
    }

    #[test]
    fn test_statistics_aggregates() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::open(temp_dir.path().join(HISTORY_DB_NAME)).unwrap();

        store
            .record(&record(BackupType::Full, RunStatus::Success, "a"))
            .unwrap();
        store
            .record(&record(BackupType::FilesOnly, RunStatus::Success, "b"))
            .unwrap();
        store
            .record(&record(BackupType::Full, RunStatus::Error, "c"))
            .unwrap();

        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_runs, 3);
        assert_eq!(stats.successful_runs, 2);
        assert!((stats.success_rate - 66.666).abs() < 0.1);
        assert_eq!(stats.total_size, 3000);
        assert!((stats.avg_duration - 2.5).abs() < f64::EPSILON);

        // Per-type breakdown only counts successful runs
        assert_eq!(stats.by_type.len(), 2);
        let full = stats
            .by_type
            .iter()
            .find(|t| t.backup_type == BackupType::Full)
            .unwrap();
        assert_eq!(full.runs, 1);
    }

    #[test]
    fn test_record_with_error_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::open(temp_dir.path().join(HISTORY_DB_NAME)).unwrap();

        let mut rec = record(BackupType::DatabaseOnly, RunStatus::Error, "");
        rec.error_message = Some("mysqldump exited with status 2".to_string());
        rec.checksum = None;
        store.record(&rec).unwrap();

        let recent = store.recent(1).unwrap();
        assert_eq!(recent[0].backup_type, BackupType::DatabaseOnly);
        assert_eq!(recent[0].status, RunStatus::Error);
        assert_eq!(
            recent[0].error_message.as_deref(),
            Some("mysqldump exited with status 2")
        );
        assert!(recent[0].checksum.is_none());
    }

    #[test]
    fn test_backup_type_display_and_parse() {
        for t in [
            BackupType::Full,
            BackupType::Incremental,
            BackupType::DatabaseOnly,
            BackupType::FilesOnly,
        ] {
            assert_eq!(t.to_string().parse::<BackupType>().unwrap(), t);
        }
        assert!("weekly".parse::<BackupType>().is_err());
    }
}
