use crate::backup::config::DatabaseConfig;
use crate::backup::format_size;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use chrono::Local;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// How often the runner polls a child for exit while the timeout is pending
static POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Invokes `mysqldump` for a logically consistent snapshot.
///
/// The dump runs with `--single-transaction` plus routines/triggers and
/// drop-and-recreate statements, so the output restores cleanly without the
/// application holding locks. A hard timeout turns a hung utility into a
/// failure instead of an indefinite wait.
pub struct MysqlDumper {
    config: DatabaseConfig,
}

impl MysqlDumper {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    /// Renders the manual restore command for a dump file. The engine never
    /// runs this itself.
    pub fn restore_command(&self, dump_file: &Path) -> String {
        format!(
            "mysql -u {} -p {} < {}",
            self.config.user,
            self.config.name,
            dump_file.display()
        )
    }

    /// Produces a dump file `database_{timestamp}.sql` inside `dir`.
    ///
    /// Returns the dump path, or a failure carrying the utility's stderr.
    /// A partial dump file is removed on failure.
    pub fn dump_to(&self, dir: &Path) -> Result<PathBuf> {
        let dump_file = dir.join(format!(
            "database_{}.sql",
            Local::now().format("%Y%m%d_%H%M%S")
        ));

        let mut cmd = Command::new("mysqldump");
        cmd.arg("--host")
            .arg(&self.config.host)
            .arg("--port")
            .arg(self.config.port.to_string())
            .arg("--user")
            .arg(&self.config.user)
            .arg(format!("--password={}", self.config.password.inner()))
            .args([
                "--single-transaction",
                "--routines",
                "--triggers",
                "--add-drop-table",
                "--add-locks",
                "--extended-insert",
            ])
            .arg(&self.config.name)
            .stdout(File::create(&dump_file)?)
            .stderr(Stdio::piped());

        match run_with_timeout(cmd, self.config.dump_timeout) {
            Ok(()) => {
                let size = std::fs::metadata(&dump_file)?.len();
                info!(
                    "Database dump complete: {:?} ({})",
                    dump_file,
                    format_size(size)
                );
                Ok(dump_file)
            }
            Err(e) => {
                error!("Database dump failed: {e}");
                let _ = std::fs::remove_file(&dump_file);
                Err(e)
            }
        }
    }
}

/// Runs a prepared command to completion within `timeout`.
///
/// The child's stderr (when piped) is drained on a separate thread so a
/// chatty utility cannot deadlock on a full pipe. On expiry the child is
/// killed and `DumpTimeout` returned; a non-zero exit becomes `DumpFailed`
/// carrying the captured stderr.
pub(crate) fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<()> {
    let mut child = cmd.spawn()?;

    let stderr_thread = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                if let Some(handle) = stderr_thread {
                    let _ = handle.join();
                }
                return Err(Error::DumpTimeout { timeout });
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    };

    let stderr_output = stderr_thread
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if status.success() {
        Ok(())
    } else if stderr_output.trim().is_empty() {
        Err(Error::DumpFailed {
            stderr: format!("utility exited with {status}"),
        })
    } else {
        Err(Error::DumpFailed {
            stderr: stderr_output.trim().to_string(),
        })
    }
}
