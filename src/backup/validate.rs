//! Validation functions for configuration values.
//!
//! Provides custom validation functions for schedule times, weekday names,
//! and backup directories.

use chrono::{NaiveTime, Weekday};
use validator::ValidationError;

use std::path::Path;

pub fn validate_schedule_time<S: AsRef<str>>(time: S) -> Result<(), ValidationError> {
    let time = time.as_ref();
    if NaiveTime::parse_from_str(time, "%H:%M").is_err() {
        return Err(ValidationError::new("InvalidScheduleTime")
            .with_message(format!("Invalid schedule time {time:?}, expected HH:MM").into()));
    }

    Ok(())
}

pub fn validate_weekday_names(days: &Vec<String>) -> Result<(), ValidationError> {
    for day in days {
        if day.parse::<Weekday>().is_err() {
            return Err(ValidationError::new("InvalidWeekday")
                .with_message(format!("Invalid weekday name: {day:?}").into()));
        }
    }

    Ok(())
}

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access backup directory {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}

pub fn validate_writable_dir<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    validate_dir_exist_or_created(dir)?;
    let md = std::fs::metadata(dir).map_err(|e| {
        ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot access metadata for {:?}: {}", dir, e).into())
    })?;
    if md.permissions().readonly() {
        Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot write to dir {:?}", dir).into()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_schedule_time() {
        assert!(validate_schedule_time("02:00").is_ok());
        assert!(validate_schedule_time("23:59").is_ok());
        assert!(validate_schedule_time("2am").is_err());
        assert!(validate_schedule_time("25:00").is_err());
    }

    #[test]
    fn test_validate_weekday_names() {
        let valid = vec!["monday".to_string(), "friday".to_string()];
        assert!(validate_weekday_names(&valid).is_ok());

        let invalid = vec!["someday".to_string()];
        assert!(validate_weekday_names(&invalid).is_err());
    }

    #[test]
    fn test_validate_writable_dir_creates_missing() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("backups");
        assert!(validate_writable_dir(&target).is_ok());
        assert!(target.is_dir());
    }

    #[test]
    fn test_validate_writable_dir_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not_a_dir");
        std::fs::write(&file, "x").unwrap();
        assert!(validate_writable_dir(&file).is_err());
    }
}
