use crate::backup::engine::BackupOutcome;
use crate::backup::format_size;

/// Rendered run report for notification delivery.
///
/// Delivery itself is an external collaborator; the engine only produces the
/// structured subject/body pair and hands it off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationReport {
    pub subject: String,
    pub body: String,
}

impl NotificationReport {
    pub fn render(outcome: &BackupOutcome) -> Self {
        let status = if outcome.is_success() {
            "Success"
        } else {
            "Failure"
        };

        let subject = format!("CRM Backup {} - {}", status, outcome.backup_type);

        let mut body = format!(
            "Backup Report\n\n\
             Status: {}\n\
             Type: {}\n\
             Duration: {:.1}s\n\
             File: {}\n\n\
             Files: {}\n\
             Original size: {}\n\
             Compressed size: {}\n",
            status,
            outcome.backup_type,
            outcome.duration_seconds,
            outcome
                .filename
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            outcome.stats.files_count,
            format_size(outcome.stats.total_size),
            format_size(outcome.stats.compressed_size),
        );
        if let Some(checksum) = &outcome.checksum {
            body.push_str(&format!("Checksum: {checksum}\n"));
        }
        if let Some(error) = &outcome.error {
            body.push_str(&format!("\nError: {error}\n"));
        }
        body.push_str(&format!("\nTimestamp: {}\n", outcome.timestamp));

        Self { subject, body }
    }
}
