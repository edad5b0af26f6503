//! Session state machine
//!
//! Pure builders for each transition. The engine and the sweep load state,
//! call these, and hand the resulting record or patch to the store.

use chrono::{DateTime, Local};
use fieldcheck_api::{DeviceInfo, School, Session, SessionStatus, User};
use fieldcheck_store::SessionPatch;
use fieldcheck_util::{GeoPoint, ScheduleId, SessionId, duration_minutes};

pub const MSG_ALREADY_CHECKED_IN: &str = "Already checked in. Please check out first.";
pub const MSG_OUTSIDE_SCHEDULE: &str = "Check-in not allowed outside your scheduled times.";
pub const MSG_SESSION_NOT_ACTIVE: &str = "Session is not active";
pub const MSG_NOT_YOUR_SESSION: &str = "Not your session";

pub fn too_far_message(distance_meters: i64, radius_meters: u32) -> String {
    format!(
        "Too far from school. You are {}m away (max {}m).",
        distance_meters, radius_meters
    )
}

pub fn notes_too_long_message(max: usize) -> String {
    format!("Notes must be {} characters or less", max)
}

/// Everything decided by the check-in gates
#[derive(Debug, Clone)]
pub struct CheckInPlan<'a> {
    pub user: &'a User,
    pub school: &'a School,
    pub schedule_id: Option<ScheduleId>,
    pub location: GeoPoint,
    pub distance_meters: i64,
    pub device_info: Option<DeviceInfo>,
}

/// Build the record for a new active session.
///
/// Display names are copied from the user and school as they are now and are
/// not refreshed afterwards.
pub fn open_session(plan: CheckInPlan<'_>, now: DateTime<Local>) -> Session {
    Session {
        id: SessionId::generate(),
        user_id: plan.user.id.clone(),
        user_role: plan.user.role,
        user_display_name: plan.user.display_name.clone(),
        school_id: plan.school.id.clone(),
        school_name: plan.school.name.clone(),
        schedule_id: plan.schedule_id,
        status: SessionStatus::Active,
        check_in_time: now,
        check_in_location: plan.location,
        check_in_distance_meters: plan.distance_meters,
        check_out_time: None,
        check_out_location: None,
        check_out_distance_meters: None,
        duration_minutes: None,
        notes: String::new(),
        notes_updated_at: None,
        device_info: plan.device_info,
        created_at: now,
        updated_at: now,
    }
}

/// A closing transition ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Closing {
    pub patch: SessionPatch,
    pub duration_minutes: i64,
}

/// Close time never precedes check-in, even if the clock stepped back
fn close_time(session: &Session, now: DateTime<Local>) -> DateTime<Local> {
    now.max(session.check_in_time)
}

/// User-initiated close: `active -> completed`
pub fn check_out(
    session: &Session,
    location: GeoPoint,
    distance_meters: i64,
    now: DateTime<Local>,
) -> Closing {
    let closed_at = close_time(session, now);
    let minutes = duration_minutes(&session.check_in_time, &closed_at);

    Closing {
        patch: SessionPatch {
            status: Some(SessionStatus::Completed),
            check_out_time: Some(closed_at),
            check_out_location: Some(location),
            check_out_distance_meters: Some(distance_meters),
            duration_minutes: Some(minutes),
            ..SessionPatch::new(now).only_if(SessionStatus::Active)
        },
        duration_minutes: minutes,
    }
}

/// Sweep-initiated close: `active -> auto_completed`, no location.
///
/// The marker is appended by the store to the notes current at write time,
/// so an edit landing after the sweep's read is kept.
pub fn auto_check_out(session: &Session, timeout_hours: u32, now: DateTime<Local>) -> Closing {
    let closed_at = close_time(session, now);
    let minutes = duration_minutes(&session.check_in_time, &closed_at);

    Closing {
        patch: SessionPatch {
            status: Some(SessionStatus::AutoCompleted),
            check_out_time: Some(closed_at),
            duration_minutes: Some(minutes),
            append_note: Some(auto_checkout_marker(timeout_hours)),
            ..SessionPatch::new(now).only_if(SessionStatus::Active)
        },
        duration_minutes: minutes,
    }
}

pub fn auto_checkout_marker(timeout_hours: u32) -> String {
    format!("[Auto-checked out after {} hours]", timeout_hours)
}

/// Notes edit; never changes status
pub fn update_notes(notes: String, now: DateTime<Local>) -> SessionPatch {
    SessionPatch {
        notes: Some(notes),
        notes_updated_at: Some(now),
        ..SessionPatch::new(now)
    }
}
