//! Configuration validation

use crate::schema::{RawConfig, RawSchedule, RawSchool, RawSessionsConfig, RawUser};
use chrono::{DateTime, Local};
use fieldcheck_api::Role;
use fieldcheck_util::{DayOfWeek, WallClock};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Longest allowed auto-checkout timeout (one year)
pub const MAX_AUTO_CHECKOUT_HOURS: u32 = 24 * 365;

/// Longest allowed sweep interval (one week)
pub const MAX_SWEEP_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Duplicate {kind} ID: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("User '{user_id}': {message}")]
    UserError { user_id: String, message: String },

    #[error("School '{school_id}': {message}")]
    SchoolError { school_id: String, message: String },

    #[error("Schedule '{schedule_id}': {message}")]
    ScheduleError { schedule_id: String, message: String },

    #[error("Sessions config error: {0}")]
    SessionsError(String),
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(check_duplicates("user", config.users.iter().map(|u| &u.id)));
    errors.extend(check_duplicates("school", config.schools.iter().map(|s| &s.id)));
    errors.extend(check_duplicates(
        "schedule",
        config.schedules.iter().map(|s| &s.id),
    ));

    errors.extend(validate_sessions(&config.sessions));

    let mut roles = HashMap::new();
    for user in &config.users {
        match validate_user(user) {
            Ok(role) => {
                roles.insert(user.id.as_str(), role);
            }
            Err(e) => errors.push(e),
        }
    }

    for school in &config.schools {
        errors.extend(validate_school(school));
    }

    let school_ids: HashSet<&str> = config.schools.iter().map(|s| s.id.as_str()).collect();
    let known_users: HashSet<&str> = config.users.iter().map(|u| u.id.as_str()).collect();
    for schedule in &config.schedules {
        errors.extend(validate_schedule(schedule, &known_users, &roles, &school_ids));
    }

    errors
}

fn check_duplicates<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a String>,
) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    ids.filter(|id| !seen.insert(id.as_str()))
        .map(|id| ValidationError::DuplicateId {
            kind,
            id: id.clone(),
        })
        .collect()
}

fn validate_sessions(sessions: &RawSessionsConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if sessions.default_check_in_radius_meters == Some(0) {
        errors.push(ValidationError::SessionsError(
            "default_check_in_radius_meters must be greater than zero".into(),
        ));
    }
    match sessions.auto_checkout_hours {
        Some(0) => errors.push(ValidationError::SessionsError(
            "auto_checkout_hours must be greater than zero".into(),
        )),
        Some(h) if h > MAX_AUTO_CHECKOUT_HOURS => {
            errors.push(ValidationError::SessionsError(format!(
                "auto_checkout_hours must be at most {}",
                MAX_AUTO_CHECKOUT_HOURS
            )))
        }
        _ => {}
    }
    match sessions.sweep_interval_minutes {
        Some(0) => errors.push(ValidationError::SessionsError(
            "sweep_interval_minutes must be greater than zero".into(),
        )),
        Some(m) if m > MAX_SWEEP_INTERVAL_MINUTES => {
            errors.push(ValidationError::SessionsError(format!(
                "sweep_interval_minutes must be at most {}",
                MAX_SWEEP_INTERVAL_MINUTES
            )))
        }
        _ => {}
    }
    if sessions.notes_max_length == Some(0) {
        errors.push(ValidationError::SessionsError(
            "notes_max_length must be greater than zero".into(),
        ));
    }

    errors
}

fn validate_user(user: &RawUser) -> Result<Role, ValidationError> {
    if user.id.trim().is_empty() {
        return Err(ValidationError::UserError {
            user_id: user.id.clone(),
            message: "id cannot be empty".into(),
        });
    }
    user.role.parse::<Role>().map_err(|_| ValidationError::UserError {
        user_id: user.id.clone(),
        message: format!(
            "role must be \"provider\" or \"administrator\", got \"{}\"",
            user.role
        ),
    })
}

fn validate_school(school: &RawSchool) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| {
        errors.push(ValidationError::SchoolError {
            school_id: school.id.clone(),
            message,
        })
    };

    if school.id.trim().is_empty() {
        push("id cannot be empty".into());
    }
    if !school.latitude.is_finite() || !(-90.0..=90.0).contains(&school.latitude) {
        push(format!("latitude {} is outside [-90, 90]", school.latitude));
    }
    if !school.longitude.is_finite() || !(-180.0..=180.0).contains(&school.longitude) {
        push(format!("longitude {} is outside [-180, 180]", school.longitude));
    }
    if school.check_in_radius_meters == Some(0) {
        push("check_in_radius_meters must be greater than zero".into());
    }

    errors
}

fn validate_schedule(
    schedule: &RawSchedule,
    known_users: &HashSet<&str>,
    roles: &HashMap<&str, Role>,
    school_ids: &HashSet<&str>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| {
        errors.push(ValidationError::ScheduleError {
            schedule_id: schedule.id.clone(),
            message,
        })
    };

    if !known_users.contains(schedule.provider_id.as_str()) {
        push(format!("unknown provider '{}'", schedule.provider_id));
    } else if let Some(role) = roles.get(schedule.provider_id.as_str())
        && *role != Role::Provider
    {
        push(format!(
            "user '{}' is an {} and cannot hold a schedule",
            schedule.provider_id, role
        ));
    }

    if !school_ids.contains(schedule.school_id.as_str()) {
        push(format!("unknown school '{}'", schedule.school_id));
    }

    if let Err(e) = parse_day(&schedule.day) {
        push(e);
    }

    let start = parse_time(&schedule.start);
    let end = parse_time(&schedule.end);
    match (&start, &end) {
        (Ok(start), Ok(end)) if start > end => push(format!(
            "start {} is after end {}; overnight slots are not supported",
            start, end
        )),
        _ => {}
    }
    if let Err(e) = start {
        push(e);
    }
    if let Err(e) = end {
        push(e);
    }

    let from = parse_timestamp(&schedule.effective_from);
    let until = schedule.effective_until.as_deref().map(parse_timestamp);
    if let (Ok(from), Some(Ok(until))) = (&from, &until)
        && until < from
    {
        push("effective_until is before effective_from".into());
    }
    if let Err(e) = from {
        push(e);
    }
    if let Some(Err(e)) = until {
        push(e);
    }

    errors
}

/// Parse an `HH:MM` time of day
pub fn parse_time(s: &str) -> Result<WallClock, String> {
    s.parse::<WallClock>()
        .map_err(|e| format!("invalid time '{}': {}", s, e))
}

/// Parse a day token (`mon`, `Monday`, ...)
pub fn parse_day(s: &str) -> Result<DayOfWeek, String> {
    s.parse::<DayOfWeek>().map_err(|e| e.to_string())
}

/// Parse an RFC 3339 timestamp into local time
pub fn parse_timestamp(s: &str) -> Result<DateTime<Local>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
}
