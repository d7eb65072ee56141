use crate::backup::config::{BackupConfig, BackupTypes};
use crate::backup::engine::BackupEngine;
use crate::backup::history::BackupType;
use crate::backup::notify::NotificationReport;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, Weekday};
use itertools::Itertools;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Poll interval of the scheduling loop
static TICK: Duration = Duration::from_secs(60);

/// Days that get the heavier configured backup; other days run the lighter
/// incremental (files-only) copy.
static MAJOR_DAYS: [Weekday; 3] = [Weekday::Mon, Weekday::Wed, Weekday::Fri];

/// Fixed weekly retention slot
static CLEANUP_DAY: Weekday = Weekday::Sun;
static CLEANUP_HOUR: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduledJob {
    Backup,
    Cleanup,
}

/// A (weekday, time) pair bound to a job, firing at most once per day.
///
/// Matching catches up: any tick at or past the scheduled time that day is
/// due, so tick phase drift across a minute boundary cannot skip a day.
#[derive(Clone, Debug)]
pub struct ScheduleEntry {
    pub weekday: Weekday,
    pub time: NaiveTime,
    pub job: ScheduledJob,
    last_fired: Option<NaiveDate>,
}

impl ScheduleEntry {
    fn new(weekday: Weekday, time: NaiveTime, job: ScheduledJob) -> Self {
        Self {
            weekday,
            time,
            job,
            last_fired: None,
        }
    }

    fn due(&self, now: DateTime<Local>) -> bool {
        now.weekday() == self.weekday
            && now.time() >= self.time
            && self.last_fired != Some(now.date_naive())
    }
}

/// Picks the run type for a scheduled backup job.
///
/// Major days run the first enabled of full, database-only, files-only;
/// every other day gets the lighter incremental copy.
pub fn choose_backup_type(weekday: Weekday, types: &BackupTypes) -> BackupType {
    if MAJOR_DAYS.contains(&weekday) {
        if types.full {
            BackupType::Full
        } else if types.database_only {
            BackupType::DatabaseOnly
        } else {
            BackupType::FilesOnly
        }
    } else {
        BackupType::Incremental
    }
}

/// Single-threaded polling scheduler.
///
/// Sleeps a fixed interval, evaluates the schedule entries on each wake, and
/// runs at most one job at a time. The configuration file is re-read at the
/// start of every fired job, so edits take effect without a restart. A job
/// failure is logged and the loop continues with the next tick.
pub struct Scheduler {
    config_path: PathBuf,
    entries: Vec<ScheduleEntry>,
    running: bool,
}

impl Scheduler {
    pub fn from_config<P: Into<PathBuf>>(config_path: P, config: &BackupConfig) -> Result<Self> {
        let time = NaiveTime::parse_from_str(&config.schedule_time, "%H:%M")
            .map_err(|e| Error::from(std::io::Error::other(e.to_string())))
            .with_msg(format!("Invalid schedule_time {:?}", config.schedule_time))?;

        let mut entries = Vec::new();
        for day in &config.schedule_days {
            match day.parse::<Weekday>() {
                Ok(weekday) => {
                    entries.push(ScheduleEntry::new(weekday, time, ScheduledJob::Backup))
                }
                Err(_) => warn!("Ignoring invalid schedule day {day:?}"),
            }
        }

        let cleanup_time = NaiveTime::from_hms_opt(CLEANUP_HOUR, 0, 0).unwrap_or_default();
        entries.push(ScheduleEntry::new(
            CLEANUP_DAY,
            cleanup_time,
            ScheduledJob::Cleanup,
        ));

        info!(
            "Backups scheduled on [{}] at {}; cleanup on {} at {:02}:00",
            config.schedule_days.iter().join(", "),
            config.schedule_time,
            CLEANUP_DAY,
            CLEANUP_HOUR
        );

        Ok(Self {
            config_path: config_path.into(),
            entries,
            running: false,
        })
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Runs the polling loop until the process is stopped.
    pub fn run(&mut self) -> ! {
        info!("Backup scheduler started");
        loop {
            std::thread::sleep(TICK);
            self.tick(Local::now());
        }
    }

    /// One poll evaluation: fires every entry due at `now`.
    pub fn tick(&mut self, now: DateTime<Local>) {
        let due: Vec<usize> = self
            .entries
            .iter()
            .positions(|entry| entry.due(now))
            .collect();

        for idx in due {
            let job = self.entries[idx].job;

            // Structurally no two jobs overlap in this single-threaded loop;
            // the flag makes the guarantee explicit. A skipped entry stays
            // unstamped so a later tick can pick it up.
            if self.running {
                warn!("A job is already in progress, skipping {job:?}");
                continue;
            }
            self.entries[idx].last_fired = Some(now.date_naive());
            self.running = true;
            self.execute(job, now);
            self.running = false;
        }
    }

    fn execute(&self, job: ScheduledJob, now: DateTime<Local>) {
        info!("Running scheduled job: {job:?}");

        // Configuration is re-read at the start of every run
        let config = match BackupConfig::load_or_init(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                error!("Scheduled job aborted, cannot load config: {e}");
                return;
            }
        };
        let engine = match BackupEngine::new(config) {
            Ok(engine) => engine,
            Err(e) => {
                error!("Scheduled job aborted, cannot open engine: {e}");
                return;
            }
        };

        match job {
            ScheduledJob::Cleanup => {
                if let Err(e) = engine.cleanup() {
                    error!("Scheduled cleanup failed: {e}");
                }
            }
            ScheduledJob::Backup => {
                let backup_type =
                    choose_backup_type(now.weekday(), &engine.config().backup_types);
                let outcome = match backup_type {
                    BackupType::Full => engine.run_full(),
                    BackupType::DatabaseOnly => engine.run_database(),
                    other => engine.run_files(other),
                };

                let config = engine.config();
                if config.email_notifications && !config.email_recipients.is_empty() {
                    let report = NotificationReport::render(&outcome);
                    info!(
                        "Notification prepared for [{}]: {}",
                        config.email_recipients.iter().join(", "),
                        report.subject
                    );
                }
            }
        }
    }
}
