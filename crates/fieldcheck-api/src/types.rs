//! Shared record types for the fieldcheckd API

use chrono::{DateTime, Local};
use fieldcheck_util::{
    DayOfWeek, GeoPoint, ScheduleId, SchoolId, SessionId, TimeWindow, UserId, WallClock,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A stored enum column held a value this version does not know
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Role of a user, assigned outside fieldcheck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Works at schools on a weekly schedule
    Provider,
    /// May check in anywhere, anytime, and edit anyone's notes
    Administrator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Provider => "provider",
            Role::Administrator => "administrator",
        }
    }

    pub fn is_administrator(self) -> bool {
        matches!(self, Role::Administrator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider" => Ok(Role::Provider),
            "administrator" => Ok(Role::Administrator),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Session lifecycle state.
///
/// `Active` is the only non-terminal state. `Cancelled` is reserved and is
/// never produced by any transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    AutoCompleted,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::AutoCompleted => "auto_completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "auto_completed" => Ok(SessionStatus::AutoCompleted),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "session status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePlatform {
    Ios,
    Android,
    Web,
}

/// Client device details, recorded verbatim on the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub platform: DevicePlatform,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub location: GeoPoint,
    /// Geofence radius; `None` means the service default applies
    pub check_in_radius_meters: Option<u32>,
}

impl School {
    pub fn effective_radius(&self, default_meters: u32) -> u32 {
        self.check_in_radius_meters.unwrap_or(default_meters)
    }
}

/// One recurring weekly window in which a provider may check in at a school
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub id: ScheduleId,
    pub provider_id: UserId,
    pub school_id: SchoolId,
    pub day: DayOfWeek,
    pub start: WallClock,
    pub end: WallClock,
    pub effective_from: DateTime<Local>,
    pub effective_until: Option<DateTime<Local>>,
    pub is_active: bool,
}

impl ScheduleSlot {
    /// Active, started, and not yet expired at `now` (both bounds inclusive)
    pub fn is_currently_effective(&self, now: &DateTime<Local>) -> bool {
        self.is_active
            && *now >= self.effective_from
            && self.effective_until.is_none_or(|until| *now <= until)
    }

    /// The slot's window, or `None` for an overnight slot
    pub fn window(&self) -> Option<TimeWindow> {
        TimeWindow::new(self.start, self.end)
    }
}

/// A provider's presence at a school, from check-in to check-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub user_role: Role,
    /// Snapshot of the user's name at check-in; never refreshed
    pub user_display_name: String,
    pub school_id: SchoolId,
    /// Snapshot of the school's name at check-in; never refreshed
    pub school_name: String,
    /// Matched slot for providers, `None` for administrators
    pub schedule_id: Option<ScheduleId>,
    pub status: SessionStatus,
    pub check_in_time: DateTime<Local>,
    pub check_in_location: GeoPoint,
    pub check_in_distance_meters: i64,
    pub check_out_time: Option<DateTime<Local>>,
    pub check_out_location: Option<GeoPoint>,
    pub check_out_distance_meters: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub notes: String,
    pub notes_updated_at: Option<DateTime<Local>>,
    pub device_info: Option<DeviceInfo>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Outcome of one stale-session sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Active sessions older than the cutoff
    pub matched: usize,
    /// Sessions moved to `auto_completed`
    pub closed: usize,
    /// Sessions closed by someone else between query and update
    pub skipped: usize,
    /// Sessions whose update failed
    pub failed: usize,
}

/// Authorization level of an IPC peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Authenticating front end relaying end-user requests
    Frontend,
    /// Local admin (root or the daemon's own uid)
    Admin,
}

impl ClientRole {
    pub fn can_run_sweep(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slot() -> ScheduleSlot {
        ScheduleSlot {
            id: ScheduleId::new("sch-1"),
            provider_id: UserId::new("u-prov"),
            school_id: SchoolId::new("s-1"),
            day: DayOfWeek::Monday,
            start: WallClock::new(9, 0).unwrap(),
            end: WallClock::new(17, 0).unwrap(),
            effective_from: Local.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            effective_until: Some(Local.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap()),
            is_active: true,
        }
    }

    #[test]
    fn slot_effective_bounds_are_inclusive() {
        let slot = slot();
        assert!(slot.is_currently_effective(&slot.effective_from));
        assert!(slot.is_currently_effective(&slot.effective_until.unwrap()));

        let before = slot.effective_from - chrono::Duration::seconds(1);
        let after = slot.effective_until.unwrap() + chrono::Duration::seconds(1);
        assert!(!slot.is_currently_effective(&before));
        assert!(!slot.is_currently_effective(&after));
    }

    #[test]
    fn inactive_or_open_ended_slots() {
        let mut slot = slot();
        slot.effective_until = None;
        let far_future = Local.with_ymd_and_hms(2040, 1, 1, 0, 0, 0).unwrap();
        assert!(slot.is_currently_effective(&far_future));

        slot.is_active = false;
        assert!(!slot.is_currently_effective(&far_future));
    }

    #[test]
    fn school_radius_falls_back_to_default() {
        let mut school = School {
            id: SchoolId::new("s-1"),
            name: "Lincoln Elementary".into(),
            location: GeoPoint::new(40.7128, -74.0060),
            check_in_radius_meters: None,
        };
        assert_eq!(school.effective_radius(150), 150);

        school.check_in_radius_meters = Some(300);
        assert_eq!(school.effective_radius(150), 300);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            SessionStatus::Active,
            SessionStatus::Completed,
            SessionStatus::AutoCompleted,
            SessionStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::AutoCompleted.is_terminal());
        assert!("paused".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn role_parsing() {
        assert_eq!("administrator".parse::<Role>().unwrap(), Role::Administrator);
        assert_eq!("provider".parse::<Role>().unwrap(), Role::Provider);
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn device_info_optional_fields() {
        let info: DeviceInfo = serde_json::from_str(r#"{"platform":"ios"}"#).unwrap();
        assert_eq!(info.platform, DevicePlatform::Ios);
        assert!(info.device_id.is_none());
    }
}
