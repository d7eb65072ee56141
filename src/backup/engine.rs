use crate::backup::archive::{ArchiveBuilder, ArchiveStats};
use crate::backup::checksum::checksum_file;
use crate::backup::collect::FileCollector;
use crate::backup::config::BackupConfig;
use crate::backup::dump::MysqlDumper;
use crate::backup::history::{
    BackupRecord, BackupType, HistoryStatistics, HistoryStore, RunStatus, HISTORY_DB_NAME,
};
use crate::backup::restore::{RestoreManager, RestoreOutcome};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::retention::{CleanupSummary, RetentionManager};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

/// Structured result of one backup run, handed off to notification rendering
/// and folded into the run's history record.
#[derive(Clone, Debug)]
pub struct BackupOutcome {
    pub backup_type: BackupType,
    pub status: RunStatus,
    pub timestamp: DateTime<Utc>,
    pub filename: Option<PathBuf>,
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub stats: ArchiveStats,
    pub checksum: Option<String>,
}

impl BackupOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// The engine context: owns the configuration and the open history store.
///
/// All state lives here rather than in process-wide registries, so multiple
/// engines can coexist in one process (tests rely on this). The engine is
/// single-threaded: one run executes to completion before the next starts.
pub struct BackupEngine {
    config: BackupConfig,
    history: HistoryStore,
}

impl BackupEngine {
    pub fn new(config: BackupConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.backup_directory)?;
        let history = HistoryStore::open(config.backup_directory.join(HISTORY_DB_NAME))?;
        Ok(Self { config, history })
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn statistics(&self) -> Result<HistoryStatistics> {
        self.history.statistics()
    }

    pub fn recent(&self, limit: u32) -> Result<Vec<BackupRecord>> {
        self.history.recent(limit)
    }

    fn collector(&self) -> Result<FileCollector> {
        FileCollector::new(
            &self.config.project_root,
            self.config.include_directories.clone(),
            &self.config.exclude_patterns,
        )
    }

    fn archive_builder(&self) -> ArchiveBuilder {
        ArchiveBuilder::new(
            &self.config.backup_directory,
            &self.config.project_root,
            self.config.compression_level as u32,
        )
    }

    /// Full backup: file tree plus database dump in one archive.
    ///
    /// A dump failure marks the whole run as failed, but the files archive
    /// is still produced so the run is not a total loss.
    pub fn run_full(&self) -> BackupOutcome {
        let started = Instant::now();
        let timestamp = Utc::now();
        info!("Starting full backup...");

        let outcome = (|| -> BackupOutcome {
            let files = match self.collector().and_then(|c| c.collect()) {
                Ok(files) => files,
                Err(e) => return self.failure(BackupType::Full, timestamp, started, e),
            };

            // Dump into a transient dir; the dump file moves into the
            // archive and must never survive on disk.
            let dump_result = tempfile::Builder::new()
                .prefix("dump_")
                .tempdir_in(&self.config.backup_directory)
                .map_err(Error::from)
                .and_then(|dir| {
                    MysqlDumper::new(self.config.database.clone())
                        .dump_to(dir.path())
                        .map(|path| (dir, path))
                });
            let (dump_dir, dump_path, dump_error) = match dump_result {
                Ok((dir, path)) => (Some(dir), Some(path), None),
                Err(e) => (None, None, Some(e)),
            };

            let archive_result =
                self.archive_builder()
                    .build(BackupType::Full, &files, dump_path.as_deref());
            drop(dump_dir);

            match (archive_result, dump_error) {
                (Ok((path, stats)), None) => BackupOutcome {
                    backup_type: BackupType::Full,
                    status: RunStatus::Success,
                    timestamp,
                    checksum: checksum_file(&path),
                    filename: Some(path),
                    error: None,
                    duration_seconds: started.elapsed().as_secs_f64(),
                    stats,
                },
                (Ok((path, stats)), Some(dump_error)) => BackupOutcome {
                    backup_type: BackupType::Full,
                    status: RunStatus::Error,
                    timestamp,
                    filename: Some(path),
                    error: Some(dump_error.to_string()),
                    duration_seconds: started.elapsed().as_secs_f64(),
                    stats,
                    checksum: None,
                },
                (Err(archive_error), None) => {
                    self.failure(BackupType::Full, timestamp, started, archive_error)
                }
                (Err(archive_error), Some(dump_error)) => self.failure(
                    BackupType::Full,
                    timestamp,
                    started,
                    dump_error.chain(archive_error),
                ),
            }
        })();

        self.finish_run(outcome)
    }

    /// Files-only backup; `Incremental` is the same lighter files-only copy
    /// fired on non-major schedule days.
    pub fn run_files(&self, backup_type: BackupType) -> BackupOutcome {
        let started = Instant::now();
        let timestamp = Utc::now();
        info!("Starting {} backup...", backup_type);

        let outcome = match self
            .collector()
            .and_then(|c| c.collect())
            .and_then(|files| self.archive_builder().build(backup_type, &files, None))
        {
            Ok((path, stats)) => BackupOutcome {
                backup_type,
                status: RunStatus::Success,
                timestamp,
                checksum: checksum_file(&path),
                filename: Some(path),
                error: None,
                duration_seconds: started.elapsed().as_secs_f64(),
                stats,
            },
            Err(e) => self.failure(backup_type, timestamp, started, e),
        };

        self.finish_run(outcome)
    }

    /// Database-only backup: a standalone dump under `database/` in the
    /// backup directory, no archive.
    pub fn run_database(&self) -> BackupOutcome {
        let started = Instant::now();
        let timestamp = Utc::now();
        info!("Starting database backup...");

        let dump_dir = self.config.backup_directory.join("database");
        let result = std::fs::create_dir_all(&dump_dir)
            .map_err(Error::from)
            .and_then(|_| MysqlDumper::new(self.config.database.clone()).dump_to(&dump_dir));

        let outcome = match result {
            Ok(path) => {
                let size = std::fs::metadata(&path).map(|md| md.len()).unwrap_or(0);
                BackupOutcome {
                    backup_type: BackupType::DatabaseOnly,
                    status: RunStatus::Success,
                    timestamp,
                    filename: Some(path),
                    error: None,
                    duration_seconds: started.elapsed().as_secs_f64(),
                    stats: ArchiveStats {
                        files_count: 1,
                        total_size: size,
                        compressed_size: 0,
                        compression_ratio: 0.0,
                    },
                    checksum: None,
                }
            }
            Err(e) => self.failure(BackupType::DatabaseOnly, timestamp, started, e),
        };

        self.finish_run(outcome)
    }

    /// Removes archives and dumps past the retention window.
    pub fn cleanup(&self) -> Result<CleanupSummary> {
        RetentionManager::new(&self.config.backup_directory, self.config.retention_days).cleanup()
    }

    /// Extracts an archive; see [`RestoreManager::restore`].
    pub fn restore(&self, archive: &Path, target: Option<PathBuf>) -> Result<RestoreOutcome> {
        RestoreManager::new(&self.config.project_root, self.config.database.clone())
            .restore(archive, target)
    }

    fn failure(
        &self,
        backup_type: BackupType,
        timestamp: DateTime<Utc>,
        started: Instant,
        error: Error,
    ) -> BackupOutcome {
        BackupOutcome {
            backup_type,
            status: RunStatus::Error,
            timestamp,
            filename: None,
            error: Some(error.to_string()),
            duration_seconds: started.elapsed().as_secs_f64(),
            stats: ArchiveStats::default(),
            checksum: None,
        }
    }

    /// Appends the run record and logs the one-line summary. A history write
    /// failure never downgrades a successful run.
    fn finish_run(&self, outcome: BackupOutcome) -> BackupOutcome {
        let record = BackupRecord {
            id: 0,
            timestamp: outcome.timestamp,
            backup_type: outcome.backup_type,
            filename: outcome
                .filename
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_size: outcome.stats.total_size,
            duration_seconds: outcome.duration_seconds,
            status: outcome.status,
            error_message: outcome.error.clone(),
            checksum: outcome.checksum.clone(),
            files_count: outcome.stats.files_count,
            compressed_size: outcome.stats.compressed_size,
        };
        if let Err(e) = self.history.record(&record) {
            error!("Failed to record backup history: {e}");
        }

        match outcome.status {
            RunStatus::Success => info!(
                "{} backup finished in {:.1}s: {:?}",
                outcome.backup_type, outcome.duration_seconds, outcome.filename
            ),
            RunStatus::Error => error!(
                "{} backup failed after {:.1}s: {}",
                outcome.backup_type,
                outcome.duration_seconds,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
        }

        outcome
    }
}
