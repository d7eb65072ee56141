use crate::backup::archive::ARCHIVE_EXT;
use crate::backup::format_size;
use crate::backup::result_error::result::Result;
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of one cleanup pass
#[derive(Clone, Copy, Debug, Default)]
pub struct CleanupSummary {
    pub removed: u64,
    pub freed_bytes: u64,
}

/// Deletes archives and standalone dumps older than the retention window.
///
/// Operates purely on the filesystem: history records pointing at a deleted
/// archive keep their filename and are never reconciled here.
pub struct RetentionManager {
    backup_dir: PathBuf,
    retention_days: i64,
}

impl RetentionManager {
    pub fn new<P: Into<PathBuf>>(backup_dir: P, retention_days: i64) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            retention_days,
        }
    }

    /// Removes every archive (`backup_*.tar.xz` in the backup directory) and
    /// standalone dump (`database_*.sql` under `database/`) whose mtime is
    /// older than `now - retention_days`.
    pub fn cleanup(&self) -> Result<CleanupSummary> {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        let mut summary = CleanupSummary::default();

        self.sweep_dir(&self.backup_dir, "backup_", &format!(".{ARCHIVE_EXT}"), cutoff, &mut summary)?;

        let dump_dir = self.backup_dir.join("database");
        if dump_dir.is_dir() {
            self.sweep_dir(&dump_dir, "database_", ".sql", cutoff, &mut summary)?;
        }

        if summary.removed > 0 {
            info!(
                "Cleanup complete: {} files removed, {} freed",
                summary.removed,
                format_size(summary.freed_bytes)
            );
        } else {
            info!("No backups past retention to remove");
        }

        Ok(summary)
    }

    fn sweep_dir(
        &self,
        dir: &Path,
        prefix: &str,
        suffix: &str,
        cutoff: DateTime<Utc>,
        summary: &mut CleanupSummary,
    ) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {e}", dir);
                    continue;
                }
            };

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(prefix) || !name.ends_with(suffix) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(md) if md.is_file() => md,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Cannot stat {:?}: {e}", entry.path());
                    continue;
                }
            };

            let modified = match metadata.modified() {
                Ok(t) => DateTime::<Utc>::from(t),
                Err(e) => {
                    warn!("Cannot read mtime of {:?}: {e}", entry.path());
                    continue;
                }
            };

            if modified < cutoff {
                match fs::remove_file(entry.path()) {
                    Ok(()) => {
                        info!("Backup removed: {}", name);
                        summary.removed += 1;
                        summary.freed_bytes += metadata.len();
                    }
                    Err(e) => warn!("Failed to remove {:?}: {e}", entry.path()),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn seed_backup_dir(dir: &Path) {
        fs::write(dir.join("backup_full_20260101_020000.tar.xz"), "aaaa").unwrap();
        fs::write(dir.join("backup_files_only_20260102_020000.tar.xz"), "bb").unwrap();
        fs::write(dir.join("backup_history.db"), "not an archive").unwrap();
        let dumps = dir.join("database");
        fs::create_dir(&dumps).unwrap();
        fs::write(dumps.join("database_20260101_020000.sql"), "cccccc").unwrap();
    }

    #[test]
    fn test_retention_zero_removes_all_archives_and_dumps() {
        let temp_dir = TempDir::new().unwrap();
        seed_backup_dir(temp_dir.path());

        let summary = RetentionManager::new(temp_dir.path(), 0).cleanup().unwrap();
        assert_eq!(summary.removed, 3);
        assert_eq!(summary.freed_bytes, 4 + 2 + 6);

        // The history database is never touched
        assert!(temp_dir.path().join("backup_history.db").exists());
        assert!(!temp_dir
            .path()
            .join("backup_full_20260101_020000.tar.xz")
            .exists());
        assert!(!temp_dir
            .path()
            .join("database/database_20260101_020000.sql")
            .exists());
    }

    #[test]
    fn test_fresh_backups_survive_thirty_day_retention() {
        let temp_dir = TempDir::new().unwrap();
        seed_backup_dir(temp_dir.path());

        let summary = RetentionManager::new(temp_dir.path(), 30).cleanup().unwrap();
        assert_eq!(summary.removed, 0);
        assert_eq!(summary.freed_bytes, 0);
        assert!(temp_dir
            .path()
            .join("backup_full_20260101_020000.tar.xz")
            .exists());
    }

    #[test]
    fn test_cleanup_of_missing_dir_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = RetentionManager::new(temp_dir.path().join("nope"), 0);
        assert!(manager.cleanup().is_err());
    }
}
