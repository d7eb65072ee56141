pub mod archive;
pub mod checksum;
pub mod collect;
pub mod config;
pub mod dump;
pub mod engine;
pub mod history;
pub mod logging;
pub mod notify;
pub mod redacted;
pub mod restore;
pub mod result_error;
pub mod retention;
pub mod scheduler;
pub mod validate;

/// Formats a byte count for log lines and status output.
pub fn format_size(bytes: u64) -> String {
    static UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    for unit in &UNITS[..UNITS.len() - 1] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} {}", UNITS[UNITS.len() - 1])
}
