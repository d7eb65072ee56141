use crate::backup::result_error::result::Result;
use chrono::Local;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Path of the current month's log file under the backup directory.
pub fn current_log_file<P: AsRef<Path>>(backup_dir: P) -> PathBuf {
    backup_dir
        .as_ref()
        .join("logs")
        .join(format!("backup_{}.log", Local::now().format("%Y%m")))
}

/// Installs the process-wide subscriber: stdout plus a monthly-rotated log
/// file under `backup_directory/logs`.
///
/// Called once from `main`; the engine itself never installs global state.
/// Repeated calls in one process are a no-op rather than a panic.
pub fn init<P: AsRef<Path>>(backup_dir: P) -> Result<()> {
    let log_file = current_log_file(&backup_dir);
    std::fs::create_dir_all(backup_dir.as_ref().join("logs"))?;
    let file = OpenOptions::new().create(true).append(true).open(&log_file)?;

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .try_init();

    Ok(())
}
