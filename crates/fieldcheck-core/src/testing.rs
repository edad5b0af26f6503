//! Store wrapper for tests that need races and write failures

use chrono::{DateTime, Local};
use fieldcheck_api::{School, ScheduleSlot, Session, SessionStatus, User};
use fieldcheck_store::{AuditEvent, SessionPatch, SqliteStore, Store, StoreError, StoreResult};
use fieldcheck_util::{DayOfWeek, SchoolId, SessionId, UserId};
use std::sync::Mutex;

/// Delegates to SQLite. Each hook injects one concurrent write or failure.
pub struct HookedStore {
    pub inner: SqliteStore,
    /// Close this session with a normal check-out right after the stale query
    pub close_after_query: Option<SessionId>,
    /// Rewrite this session's notes right after the stale query
    pub notes_after_query: Option<(SessionId, String)>,
    /// Close the target session with a normal check-out just before any update
    pub close_before_update: bool,
    /// Insert this session just before any create
    pub insert_before_create: Mutex<Option<Session>>,
    /// Fail updates to this session
    pub fail_updates_for: Option<SessionId>,
    pub fail_query: bool,
    pub updates_seen: Mutex<Vec<SessionId>>,
}

impl HookedStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            close_after_query: None,
            notes_after_query: None,
            close_before_update: false,
            insert_before_create: Mutex::new(None),
            fail_updates_for: None,
            fail_query: false,
            updates_seen: Mutex::new(Vec::new()),
        }
    }

    fn close_elsewhere(&self, id: &SessionId, at: DateTime<Local>) -> StoreResult<bool> {
        let patch = SessionPatch {
            status: Some(SessionStatus::Completed),
            check_out_time: Some(at),
            ..SessionPatch::new(at).only_if(SessionStatus::Active)
        };
        self.inner.update_session(id, &patch)
    }
}

impl Store for HookedStore {
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        self.inner.append_audit(event)
    }
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.inner.get_recent_audits(limit)
    }
    fn get_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        self.inner.get_user(id)
    }
    fn put_user(&self, user: &User) -> StoreResult<()> {
        self.inner.put_user(user)
    }
    fn get_school(&self, id: &SchoolId) -> StoreResult<Option<School>> {
        self.inner.get_school(id)
    }
    fn put_school(&self, school: &School) -> StoreResult<()> {
        self.inner.put_school(school)
    }
    fn put_schedule(&self, slot: &ScheduleSlot) -> StoreResult<()> {
        self.inner.put_schedule(slot)
    }
    fn find_schedule_slots(
        &self,
        provider_id: &UserId,
        school_id: &SchoolId,
        day: DayOfWeek,
    ) -> StoreResult<Vec<ScheduleSlot>> {
        self.inner.find_schedule_slots(provider_id, school_id, day)
    }
    fn get_session(&self, id: &SessionId) -> StoreResult<Option<Session>> {
        self.inner.get_session(id)
    }
    fn find_active_session(&self, user_id: &UserId) -> StoreResult<Option<Session>> {
        self.inner.find_active_session(user_id)
    }
    fn create_session(&self, session: &Session) -> StoreResult<SessionId> {
        if let Some(competing) = self.insert_before_create.lock().unwrap().take() {
            self.inner.create_session(&competing)?;
        }
        self.inner.create_session(session)
    }
    fn update_session(&self, id: &SessionId, patch: &SessionPatch) -> StoreResult<bool> {
        self.updates_seen.lock().unwrap().push(id.clone());
        if self.fail_updates_for.as_ref() == Some(id) {
            return Err(StoreError::Database("disk I/O error".into()));
        }
        if self.close_before_update {
            self.close_elsewhere(id, patch.updated_at)?;
        }
        self.inner.update_session(id, patch)
    }
    fn query_stale_active_sessions(&self, cutoff: DateTime<Local>) -> StoreResult<Vec<Session>> {
        if self.fail_query {
            return Err(StoreError::Database("database is locked".into()));
        }
        let stale = self.inner.query_stale_active_sessions(cutoff)?;
        if let Some(id) = &self.close_after_query {
            self.close_elsewhere(id, cutoff)?;
        }
        if let Some((id, notes)) = &self.notes_after_query {
            let patch = SessionPatch {
                notes: Some(notes.clone()),
                notes_updated_at: Some(cutoff),
                ..SessionPatch::new(cutoff)
            };
            self.inner.update_session(id, &patch)?;
        }
        Ok(stale)
    }
    fn list_sessions_for_user(&self, user_id: &UserId, limit: usize) -> StoreResult<Vec<Session>> {
        self.inner.list_sessions_for_user(user_id, limit)
    }
    fn is_healthy(&self) -> bool {
        self.inner.is_healthy()
    }
}
