use clap::{Parser, ValueEnum};
use crm_backup::backup::config::BackupConfig;
use crm_backup::backup::engine::{BackupEngine, BackupOutcome};
use crm_backup::backup::format_size;
use crm_backup::backup::history::BackupType;
use crm_backup::backup::logging;
use crm_backup::backup::scheduler::Scheduler;
use std::path::PathBuf;
use std::process::exit;

/// Scheduled backup/restore tool for the CRM file tree and MySQL database
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Action to execute
    #[arg(value_enum)]
    action: Action,

    /// Location of config file
    #[arg(short, long, default_value = "backup_config.json")]
    config: PathBuf,

    /// Backup archive to restore
    #[arg(long)]
    restore_file: Option<PathBuf>,

    /// Destination directory for restore
    #[arg(long)]
    restore_path: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Action {
    Full,
    Database,
    Files,
    Schedule,
    Status,
    Cleanup,
    Restore,
}

fn main() {
    let args = Args::parse();

    let config = match BackupConfig::load_or_init(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            exit(1);
        }
    };

    if let Err(e) = logging::init(&config.backup_directory) {
        eprintln!("Failed to set up logging: {e}");
        exit(1);
    }

    let engine = match BackupEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to initialize backup engine: {e}");
            exit(1);
        }
    };

    match args.action {
        Action::Full => finish(engine.run_full()),
        Action::Database => finish(engine.run_database()),
        Action::Files => finish(engine.run_files(BackupType::FilesOnly)),
        Action::Cleanup => match engine.cleanup() {
            Ok(summary) => println!(
                "Cleanup complete: {} files removed, {} freed",
                summary.removed,
                format_size(summary.freed_bytes)
            ),
            Err(e) => {
                eprintln!("Cleanup failed: {e}");
                exit(1);
            }
        },
        Action::Restore => {
            let Some(restore_file) = args.restore_file else {
                eprintln!("Specify the backup archive with --restore-file");
                exit(1);
            };
            match engine.restore(&restore_file, args.restore_path) {
                Ok(outcome) => {
                    println!("Restore complete: {:?}", outcome.target);
                    if let Some(hint) = outcome.restore_hint {
                        println!("Embedded database dump found.");
                        println!("To restore the database, run manually: {hint}");
                    }
                }
                Err(e) => {
                    eprintln!("Restore failed: {e}");
                    exit(1);
                }
            }
        }
        Action::Schedule => {
            let mut scheduler = match Scheduler::from_config(&args.config, engine.config()) {
                Ok(scheduler) => scheduler,
                Err(e) => {
                    eprintln!("Failed to build schedule: {e}");
                    exit(1);
                }
            };
            println!("Backup scheduler running, press Ctrl+C to stop");
            scheduler.run();
        }
        Action::Status => {
            if let Err(e) = print_status(&engine) {
                eprintln!("Failed to read status: {e}");
                exit(1);
            }
        }
    }
}

fn finish(outcome: BackupOutcome) {
    if outcome.is_success() {
        let filename = outcome
            .filename
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("Backup complete: {filename}");
    } else {
        eprintln!(
            "Backup failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
        exit(1);
    }
}

fn print_status(
    engine: &BackupEngine,
) -> crm_backup::backup::result_error::result::Result<()> {
    let config = engine.config();
    println!("CRM Backup - Status");
    println!("Backup directory: {:?}", config.backup_directory);
    println!("Retention: {} days", config.retention_days);
    println!(
        "Schedule: [{}] at {}",
        config.schedule_days.join(", "),
        config.schedule_time
    );

    let stats = engine.statistics()?;
    println!();
    println!("Total runs: {}", stats.total_runs);
    println!("Success rate: {:.1}%", stats.success_rate);
    println!("Total archived: {}", format_size(stats.total_size));
    println!("Average duration: {:.1}s", stats.avg_duration);
    for t in &stats.by_type {
        println!(
            "  {}: {} runs, {} archived",
            t.backup_type,
            t.runs,
            format_size(t.total_size)
        );
    }

    println!();
    println!("Recent runs:");
    for record in engine.recent(10)? {
        println!(
            "  {} | {} | {} | {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.backup_type,
            record.status,
            record.filename
        );
    }

    Ok(())
}
