//! # crm-backup
//!
//! A scheduled backup/restore engine for a CRM deployment: file tree plus
//! MySQL dump, packaged into one compressed, checksummed archive.
//!
//! ## Features
//!
//! - **Scheduled Backups**: weekday/time polling scheduler
//! - **Full / incremental / database-only / files-only** run types
//! - **Compression**: XZ (LZMA) tar archives, configurable level
//! - **Run History**: append-only SQLite log with aggregate statistics
//! - **Retention Management**: age-based archive and dump cleanup
//! - **Restore**: archive extraction with embedded dump detection
//!
//! ## Quick Start
//!
//! ```no_run
//! use crm_backup::backup::config::BackupConfig;
//! use crm_backup::backup::engine::BackupEngine;
//!
//! // Load configuration (defaults are written to disk if absent)
//! let config = BackupConfig::load_or_init("backup_config.json")?;
//!
//! // Run one full backup
//! let engine = BackupEngine::new(config)?;
//! let outcome = engine.run_full();
//! # Ok::<(), crm_backup::backup::result_error::error::Error>(())
//! ```

pub mod backup;
