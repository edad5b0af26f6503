//! Store trait definitions

use chrono::{DateTime, Local};
use fieldcheck_api::{School, ScheduleSlot, Session, SessionStatus, User};
use fieldcheck_util::{DayOfWeek, GeoPoint, SchoolId, SessionId, UserId};

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Reference records

    fn get_user(&self, id: &UserId) -> StoreResult<Option<User>>;

    /// Insert or replace a user
    fn put_user(&self, user: &User) -> StoreResult<()>;

    fn get_school(&self, id: &SchoolId) -> StoreResult<Option<School>>;

    /// Insert or replace a school
    fn put_school(&self, school: &School) -> StoreResult<()>;

    /// Insert or replace a schedule slot
    fn put_schedule(&self, slot: &ScheduleSlot) -> StoreResult<()>;

    /// Active slots for a provider at a school on one weekday, ordered by id
    fn find_schedule_slots(
        &self,
        provider_id: &UserId,
        school_id: &SchoolId,
        day: DayOfWeek,
    ) -> StoreResult<Vec<ScheduleSlot>>;

    // Sessions

    fn get_session(&self, id: &SessionId) -> StoreResult<Option<Session>>;

    /// The user's session in `active` state, if any
    fn find_active_session(&self, user_id: &UserId) -> StoreResult<Option<Session>>;

    /// Persist a new session.
    ///
    /// Fails with [`crate::StoreError::Conflict`] if the user already has an
    /// active session, even when two inserts race.
    fn create_session(&self, session: &Session) -> StoreResult<SessionId>;

    /// Apply a partial update. Returns `false` if no row matched, either
    /// because the session is missing or its status differs from
    /// [`SessionPatch::expected_status`].
    fn update_session(&self, id: &SessionId, patch: &SessionPatch) -> StoreResult<bool>;

    /// Active sessions that checked in strictly before `cutoff`
    fn query_stale_active_sessions(&self, cutoff: DateTime<Local>) -> StoreResult<Vec<Session>>;

    /// A user's sessions, newest check-in first
    fn list_sessions_for_user(&self, user_id: &UserId, limit: usize) -> StoreResult<Vec<Session>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Partial update of a session. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPatch {
    /// Only apply if the stored status still equals this
    pub expected_status: Option<SessionStatus>,
    pub status: Option<SessionStatus>,
    pub check_out_time: Option<DateTime<Local>>,
    pub check_out_location: Option<GeoPoint>,
    pub check_out_distance_meters: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    /// Appended to whatever notes are stored at write time, after a blank line
    /// unless they are empty. Takes precedence over `notes`.
    pub append_note: Option<String>,
    pub notes_updated_at: Option<DateTime<Local>>,
    /// Always written
    pub updated_at: DateTime<Local>,
}

impl SessionPatch {
    pub fn new(updated_at: DateTime<Local>) -> Self {
        Self {
            expected_status: None,
            status: None,
            check_out_time: None,
            check_out_location: None,
            check_out_distance_meters: None,
            duration_minutes: None,
            notes: None,
            append_note: None,
            notes_updated_at: None,
            updated_at,
        }
    }

    pub fn only_if(mut self, status: SessionStatus) -> Self {
        self.expected_status = Some(status);
        self
    }
}
