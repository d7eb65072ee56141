use crate::backup::archive::FILE_TIME_FORMAT;
use crate::backup::config::DatabaseConfig;
use crate::backup::dump::MysqlDumper;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use chrono::Local;
use liblzma::read::XzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Clone, Debug)]
pub struct RestoreOutcome {
    pub target: PathBuf,
    pub dump_files: Vec<PathBuf>,
    /// Manual command for restoring the first embedded dump, if any
    pub restore_hint: Option<String>,
}

/// Extracts archives and detects embedded database dumps.
///
/// A found dump is only reported with the exact command an operator should
/// run; the engine never executes a database restore itself.
pub struct RestoreManager {
    project_root: PathBuf,
    dumper: MysqlDumper,
}

impl RestoreManager {
    pub fn new<P: Into<PathBuf>>(project_root: P, database: DatabaseConfig) -> Self {
        Self {
            project_root: project_root.into(),
            dumper: MysqlDumper::new(database),
        }
    }

    /// Extracts `archive` into `target` (auto-named `restore_{timestamp}`
    /// under the project root if none is given).
    ///
    /// A missing or unopenable archive fails before anything is written.
    pub fn restore(&self, archive: &Path, target: Option<PathBuf>) -> Result<RestoreOutcome> {
        // Open before creating the target so a bad archive writes nothing
        let file = File::open(archive)
            .map_err(Error::from)
            .with_msg(format!("Backup archive not found or unreadable: {archive:?}"))?;

        let target = target.unwrap_or_else(|| {
            self.project_root
                .join(format!("restore_{}", Local::now().format(FILE_TIME_FORMAT)))
        });
        std::fs::create_dir_all(&target)?;

        info!("Restoring {:?} into {:?}", archive, target);
        let mut tar = tar::Archive::new(XzDecoder::new(BufReader::new(file)));
        tar.unpack(&target)
            .map_err(Error::from)
            .with_msg(format!("Extraction of {archive:?} failed"))?;
        info!("Restore complete: {:?}", target);

        let dump_files = find_dump_files(&target);
        let restore_hint = dump_files
            .first()
            .map(|dump| self.dumper.restore_command(dump));
        if let Some(hint) = &restore_hint {
            info!("Found database dump: {:?}", dump_files[0]);
            info!("To restore the database, run manually: {hint}");
        }

        Ok(RestoreOutcome {
            target,
            dump_files,
            restore_hint,
        })
    }
}

fn find_dump_files(target: &Path) -> Vec<PathBuf> {
    WalkDir::new(target)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry while scanning for dumps: {e}");
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("database_")
                && entry.file_name().to_string_lossy().ends_with(".sql")
        })
        .map(|entry| entry.into_path())
        .collect()
}
