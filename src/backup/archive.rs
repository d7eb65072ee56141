use crate::backup::format_size;
use crate::backup::history::BackupType;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use chrono::{DateTime, Local};
use liblzma::write::XzEncoder;
use std::fs::File;
use std::io::{BufWriter, IntoInnerError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Extension of every archive the builder produces
pub static ARCHIVE_EXT: &str = "tar.xz";

/// Timestamp component of archive and dump file names
pub static FILE_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Transient per-run aggregate, folded into the run's history record.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveStats {
    pub files_count: u64,
    pub total_size: u64,
    pub compressed_size: u64,
    pub compression_ratio: f64,
}

/// Streams collected files plus an optional database dump into one
/// `backup_{type}_{timestamp}.tar.xz` container.
///
/// Entries are stored relative to the project root so extraction reproduces
/// the original tree. The archive is written to a `.tmp` file and renamed
/// into place once complete; a failed build removes the partial file.
pub struct ArchiveBuilder {
    backup_dir: PathBuf,
    project_root: PathBuf,
    compression_level: u32,
}

/// Names use local wall-clock time so they line up with the configured
/// schedule.
pub fn archive_file_name(backup_type: BackupType, timestamp: DateTime<Local>) -> String {
    format!(
        "backup_{}_{}.{}",
        backup_type,
        timestamp.format(FILE_TIME_FORMAT),
        ARCHIVE_EXT
    )
}

impl ArchiveBuilder {
    pub fn new<P1: Into<PathBuf>, P2: Into<PathBuf>>(
        backup_dir: P1,
        project_root: P2,
        compression_level: u32,
    ) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            project_root: project_root.into(),
            compression_level,
        }
    }

    /// Builds the archive and returns its final path plus stats.
    ///
    /// A single unreadable input file is logged and skipped; a failure to
    /// create or finish the archive itself aborts the run. When a dump file
    /// is supplied it is nested under `database/` and the on-disk dump is
    /// deleted afterwards.
    pub fn build(
        &self,
        backup_type: BackupType,
        files: &[PathBuf],
        dump_file: Option<&Path>,
    ) -> Result<(PathBuf, ArchiveStats)> {
        let file_name = archive_file_name(backup_type, Local::now());
        let final_path = self.backup_dir.join(&file_name);
        let tmp_path = self.backup_dir.join(format!("{file_name}.tmp"));

        let mut stats = ArchiveStats::default();
        match self.write_entries(&tmp_path, files, dump_file, &mut stats) {
            Ok(()) => {
                std::fs::rename(&tmp_path, &final_path)?;
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(e).with_msg(format!("Creating archive {file_name:?} failed"));
            }
        }

        stats.compressed_size = std::fs::metadata(&final_path)?.len();
        stats.compression_ratio = if stats.total_size > 0 {
            1.0 - stats.compressed_size as f64 / stats.total_size as f64
        } else {
            0.0
        };

        info!(
            "Archive created: {} | files: {} | original: {} | compressed: {} | ratio: {:.1}%",
            file_name,
            stats.files_count,
            format_size(stats.total_size),
            format_size(stats.compressed_size),
            stats.compression_ratio * 100.0
        );

        Ok((final_path, stats))
    }

    fn write_entries(
        &self,
        tmp_path: &Path,
        files: &[PathBuf],
        dump_file: Option<&Path>,
        stats: &mut ArchiveStats,
    ) -> Result<()> {
        let mut writer = File::create_new(tmp_path)
            .map(BufWriter::new)
            .map(|f| XzEncoder::new(f, self.compression_level))
            .map(tar::Builder::new)?;
        writer.follow_symlinks(true);

        for file in files {
            let metadata = match std::fs::metadata(file) {
                Ok(md) if md.is_file() => md,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping unreadable file {:?}: {e}", file);
                    continue;
                }
            };

            let rel = file.strip_prefix(&self.project_root).unwrap_or(file);
            if let Err(e) = writer.append_path_with_name(file, rel) {
                warn!("Skipping file {:?}: {e}", file);
                continue;
            }

            stats.files_count += 1;
            stats.total_size += metadata.len();
            if stats.files_count % 100 == 0 {
                info!("Files processed: {}", stats.files_count);
            }
        }

        if let Some(dump) = dump_file {
            let metadata = std::fs::metadata(dump)?;
            let name = dump
                .file_name()
                .ok_or_else(|| std::io::Error::other("dump file has no file name"))?;
            writer.append_path_with_name(dump, Path::new("database").join(name))?;
            stats.files_count += 1;
            stats.total_size += metadata.len();

            // The transient dump must never survive outside the archive
            std::fs::remove_file(dump)?;
        }

        writer
            .into_inner()?
            .finish()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use liblzma::read::XzDecoder;
    use tempfile::TempDir;

    #[test]
    fn test_archive_file_name_embeds_local_wall_clock() {
        let ts = Local.with_ymd_and_hms(2026, 8, 25, 2, 0, 0).unwrap();
        assert_eq!(
            archive_file_name(BackupType::Full, ts),
            "backup_full_20260825_020000.tar.xz"
        );
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let mut tar = tar::Archive::new(XzDecoder::new(file));
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_build_produces_named_archive_with_stats() {
        let temp_dir = TempDir::new().unwrap();
        let backup_dir = temp_dir.path().join("backups");
        std::fs::create_dir(&backup_dir).unwrap();
        let data = temp_dir.path().join("data");
        std::fs::create_dir(&data).unwrap();
        // Repetitive content so compression actually shrinks it
        std::fs::write(data.join("big.txt"), "abcdef".repeat(20_000)).unwrap();
        std::fs::write(data.join("small.txt"), "hello").unwrap();

        let builder = ArchiveBuilder::new(&backup_dir, temp_dir.path(), 6);
        let files = vec![data.join("big.txt"), data.join("small.txt")];
        let (path, stats) = builder.build(BackupType::Full, &files, None).unwrap();

        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("backup_full_"));
        assert!(name.ends_with(".tar.xz"));

        assert_eq!(stats.files_count, 2);
        assert_eq!(stats.total_size, 6 * 20_000 + 5);
        assert!(stats.compressed_size <= stats.total_size);
        assert!(stats.compression_ratio > 0.0 && stats.compression_ratio < 1.0);

        let names = entry_names(&path);
        assert!(names.contains(&"data/big.txt".to_string()));
        assert!(names.contains(&"data/small.txt".to_string()));
    }

    #[test]
    fn test_build_with_no_files_has_zero_ratio() {
        let temp_dir = TempDir::new().unwrap();
        let builder = ArchiveBuilder::new(temp_dir.path(), temp_dir.path(), 6);

        let (path, stats) = builder.build(BackupType::FilesOnly, &[], None).unwrap();
        assert!(path.exists());
        assert_eq!(stats.files_count, 0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.compression_ratio, 0.0);
    }

    #[test]
    fn test_dump_is_nested_and_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let dump = temp_dir.path().join("database_20260101_020000.sql");
        std::fs::write(&dump, "DROP TABLE IF EXISTS leads;").unwrap();

        let builder = ArchiveBuilder::new(temp_dir.path(), temp_dir.path(), 1);
        let (path, stats) = builder.build(BackupType::Full, &[], Some(&dump)).unwrap();

        assert!(!dump.exists());
        assert_eq!(stats.files_count, 1);
        let names = entry_names(&path);
        assert_eq!(names, vec!["database/database_20260101_020000.sql"]);
    }

    #[test]
    fn test_unreadable_input_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("data");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("ok.txt"), "fine").unwrap();

        let builder = ArchiveBuilder::new(temp_dir.path(), temp_dir.path(), 1);
        let files = vec![data.join("missing.txt"), data.join("ok.txt")];
        let (_, stats) = builder
            .build(BackupType::Incremental, &files, None)
            .unwrap();

        assert_eq!(stats.files_count, 1);
    }

    #[test]
    fn test_unwritable_backup_dir_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let builder = ArchiveBuilder::new(
            temp_dir.path().join("does_not_exist"),
            temp_dir.path(),
            1,
        );
        assert!(builder.build(BackupType::Full, &[], None).is_err());
    }
}
