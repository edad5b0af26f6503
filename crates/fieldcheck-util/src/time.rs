//! Time utilities for fieldcheck
//!
//! Wall-clock helpers for schedule windows (time of day, day of week,
//! inclusive range checks), duration arithmetic, and an injectable clock so
//! every time-dependent gate can be driven from fixed instants in tests.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `FIELDCHECK_MOCK_TIME` environment variable can be set
//! to override the system time seen by [`SystemClock`]. This is useful for
//! trying out schedule windows against a running daemon.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-06-02 09:00:00`)
//!
//! Example:
//! ```bash
//! FIELDCHECK_MOCK_TIME="2025-06-02 09:00:00" fieldcheckd
//! ```

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};
use thiserror::Error;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "FIELDCHECK_MOCK_TIME";

const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset between mock time and real time, computed once at first use so
/// mock time keeps advancing at the real rate.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let Ok(naive) = NaiveDateTime::parse_from_str(&raw, MOCK_TIME_FORMAT) else {
                tracing::warn!(
                    mock_time = %raw,
                    expected_format = MOCK_TIME_FORMAT,
                    "Invalid mock time format"
                );
                return None;
            };
            let Some(mock) = Local.from_local_datetime(&naive).single() else {
                tracing::warn!(mock_time = %raw, "Mock time is ambiguous in the local timezone");
                return None;
            };
            let offset = mock.signed_duration_since(Local::now());
            tracing::info!(
                mock_time = %raw,
                offset_secs = offset.num_seconds(),
                "Mock time enabled"
            );
            Some(offset)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current local time, respecting mock time in debug builds.
pub fn now() -> DateTime<Local> {
    let real_now = Local::now();
    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Source of "now" for every time-dependent decision
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The real wall clock (with debug mock-time support)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = *guard + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Errors from parsing schedule time fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("Expected HH:MM format, got '{0}'")]
    Format(String),

    #[error("Hour must be 0-23, got {0}")]
    Hour(u32),

    #[error("Minute must be 0-59, got {0}")]
    Minute(u32),

    #[error("Unknown day of week: {0}")]
    Day(String),
}

/// Day of the week, indexed from Sunday = 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    /// All seven days in index order
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => Self::Sunday,
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
        }
    }

    /// Canonical lowercase token, as stored
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "sunday",
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
        }
    }

    /// Capitalized name for display
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Sunday => "Sunday",
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sun" | "sunday" => Ok(Self::Sunday),
            "mon" | "monday" => Ok(Self::Monday),
            "tue" | "tuesday" => Ok(Self::Tuesday),
            "wed" | "wednesday" => Ok(Self::Wednesday),
            "thu" | "thursday" => Ok(Self::Thursday),
            "fri" | "friday" => Ok(Self::Friday),
            "sat" | "saturday" => Ok(Self::Saturday),
            other => Err(TimeParseError::Day(other.to_string())),
        }
    }
}

/// Day of week of a local instant (locale independent)
pub fn day_of_week(dt: &DateTime<Local>) -> DayOfWeek {
    DayOfWeek::from_weekday(dt.weekday())
}

/// Minute-precision 24-hour time of day, written `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallClock {
    // Field order matters for the derived ordering
    hour: u8,
    minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Time of day of a local instant, truncated to the minute
    pub fn of(dt: &DateTime<Local>) -> Self {
        Self {
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn minutes_from_midnight(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }

    pub fn from_minutes_from_midnight(minutes: u16) -> Option<Self> {
        let hour = u8::try_from(minutes / 60).ok()?;
        let minute = u8::try_from(minutes % 60).ok()?;
        Self::new(hour, minute)
    }

    /// 12-hour display form, e.g. `9:05 AM`
    pub fn format_12h(&self) -> String {
        let period = if self.hour >= 12 { "PM" } else { "AM" };
        let hour12 = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", hour12, self.minute, period)
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WallClock {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_err = || TimeParseError::Format(s.to_string());

        let (h, m) = s.trim().split_once(':').ok_or_else(format_err)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(format_err());
        }
        let hour: u32 = h.parse().map_err(|_| format_err())?;
        let minute: u32 = m.parse().map_err(|_| format_err())?;

        if hour >= 24 {
            return Err(TimeParseError::Hour(hour));
        }
        if minute >= 60 {
            return Err(TimeParseError::Minute(minute));
        }

        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }
}

impl TryFrom<String> for WallClock {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WallClock> for String {
    fn from(value: WallClock) -> Self {
        value.to_string()
    }
}

/// Inclusive range check on minute-resolution times of day
pub fn is_within_time_range(start: WallClock, end: WallClock, current: WallClock) -> bool {
    current >= start && current <= end
}

/// A same-day window of the clock, inclusive at both ends.
///
/// Windows never span midnight: `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: WallClock,
    end: WallClock,
}

impl TimeWindow {
    /// Returns `None` for an overnight window (`start > end`)
    pub fn new(start: WallClock, end: WallClock) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> WallClock {
        self.start
    }

    pub fn end(&self) -> WallClock {
        self.end
    }

    pub fn contains(&self, time: WallClock) -> bool {
        is_within_time_range(self.start, self.end, time)
    }

    /// Check the time of day of a local instant against this window
    pub fn contains_time_of(&self, dt: &DateTime<Local>) -> bool {
        self.contains(WallClock::of(dt))
    }

    pub fn length_minutes(&self) -> u16 {
        self.end.minutes_from_midnight() - self.start.minutes_from_midnight()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Whole minutes between two instants, rounded half up.
///
/// 45 seconds rounds to 1 minute, 29 seconds to 0.
pub fn duration_minutes(start: &DateTime<Local>, end: &DateTime<Local>) -> i64 {
    let millis = end.signed_duration_since(*start).num_milliseconds();
    (millis + 30_000).div_euclid(60_000)
}

/// Format a minute count for display: `45m`, `2h`, `2h 15m`
pub fn format_duration_minutes(minutes: i64) -> String {
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h {}m", hours, rest)
    }
}
