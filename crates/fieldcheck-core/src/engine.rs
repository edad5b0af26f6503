//! Session engine: check-in, check-out, and notes

use fieldcheck_api::{DeviceInfo, Role, School, Session, SweepReport, User};
use fieldcheck_config::SessionRules;
use fieldcheck_store::{AuditEvent, AuditEventType, Store, StoreError};
use fieldcheck_util::{
    Clock, FieldcheckError, GeoPoint, Result, SchoolId, SessionId, UserId, distance_meters,
    format_duration_minutes, is_within_school_radius,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::session::{self, CheckInPlan};
use crate::{ScheduleResolver, StaleSessionSweep};

/// Result of a successful check-in
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInOutcome {
    pub session_id: SessionId,
    /// Distance from the school, rounded to the meter
    pub distance_meters: i64,
    pub message: String,
}

/// Result of a successful check-out
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutOutcome {
    pub duration_minutes: i64,
    pub message: String,
}

/// The session engine
pub struct SessionEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    rules: SessionRules,
    schedules: ScheduleResolver,
}

impl SessionEngine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, rules: SessionRules) -> Self {
        info!(
            default_radius_m = rules.default_check_in_radius_meters,
            auto_checkout_hours = rules.auto_checkout_hours,
            notes_max_length = rules.notes_max_length,
            "Session engine initialized"
        );

        Self {
            schedules: ScheduleResolver::new(store.clone()),
            store,
            clock,
            rules,
        }
    }

    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Start a session at a school.
    ///
    /// Gates run in order: user exists, no active session, school exists,
    /// within the geofence, and (providers only) inside a schedule slot.
    pub fn check_in(
        &self,
        caller: &UserId,
        school_id: &SchoolId,
        location: GeoPoint,
        device_info: Option<DeviceInfo>,
    ) -> Result<CheckInOutcome> {
        ensure_valid_location(&location)?;
        let now = self.clock.now();

        let user = self.load_user(caller)?;

        if self.store.find_active_session(caller)?.is_some() {
            let err = FieldcheckError::conflict(session::MSG_ALREADY_CHECKED_IN);
            return Err(self.deny(caller, school_id, err));
        }

        let school = self
            .store
            .get_school(school_id)?
            .ok_or_else(|| FieldcheckError::not_found(format!("School not found: {}", school_id)))?;

        let radius = school.effective_radius(self.rules.default_check_in_radius_meters);
        let check = is_within_school_radius(&location, &school.location, f64::from(radius));
        if !check.is_within {
            let err = FieldcheckError::precondition(session::too_far_message(
                check.distance_meters,
                radius,
            ));
            return Err(self.deny(caller, school_id, err));
        }

        let schedule_id = match user.role {
            Role::Administrator => None,
            Role::Provider => match self.schedules.resolve(caller, school_id, &now)? {
                Some(slot) => Some(slot.id),
                None => {
                    let message = self.outside_schedule_message(caller, school_id, &now)?;
                    let err = FieldcheckError::precondition(message);
                    return Err(self.deny(caller, school_id, err));
                }
            },
        };

        let record = session::open_session(
            CheckInPlan {
                user: &user,
                school: &school,
                schedule_id,
                location,
                distance_meters: check.distance_meters,
                device_info,
            },
            now,
        );

        let session_id = match self.store.create_session(&record) {
            Ok(id) => id,
            // Lost a race with a concurrent check-in by the same user
            Err(StoreError::Conflict(_)) => {
                let err = FieldcheckError::conflict(session::MSG_ALREADY_CHECKED_IN);
                return Err(self.deny(caller, school_id, err));
            }
            Err(e) => return Err(e.into()),
        };

        self.audit(AuditEventType::CheckedIn {
            session_id: session_id.clone(),
            user_id: caller.clone(),
            school_id: school_id.clone(),
            distance_meters: check.distance_meters,
        });

        info!(
            session_id = %session_id,
            user_id = %caller,
            school_id = %school_id,
            distance_m = check.distance_meters,
            schedule_id = ?record.schedule_id.as_ref().map(|s| s.as_str()),
            "Checked in"
        );

        Ok(CheckInOutcome {
            session_id,
            distance_meters: check.distance_meters,
            message: format!("Checked in at {}", school.name),
        })
    }

    /// Close the caller's own active session
    pub fn check_out(
        &self,
        caller: &UserId,
        session_id: &SessionId,
        location: GeoPoint,
    ) -> Result<CheckOutOutcome> {
        ensure_valid_location(&location)?;
        let now = self.clock.now();

        let session = self.load_session(session_id)?;

        if session.user_id != *caller {
            warn!(session_id = %session_id, user_id = %caller, "Check-out by non-owner rejected");
            return Err(FieldcheckError::permission(session::MSG_NOT_YOUR_SESSION));
        }
        if !session.is_active() {
            return Err(FieldcheckError::precondition(session::MSG_SESSION_NOT_ACTIVE));
        }

        // A school removed since check-in is not fatal
        let check_out_distance = match self.store.get_school(&session.school_id)? {
            Some(school) => distance_meters(&location, &school.location).round() as i64,
            None => {
                debug!(school_id = %session.school_id, "School missing at check-out");
                0
            }
        };

        let closing = session::check_out(&session, location, check_out_distance, now);
        if !self.store.update_session(session_id, &closing.patch)? {
            // Closed concurrently, e.g. by the sweep
            return Err(FieldcheckError::precondition(session::MSG_SESSION_NOT_ACTIVE));
        }

        self.audit(AuditEventType::CheckedOut {
            session_id: session_id.clone(),
            user_id: caller.clone(),
            duration_minutes: closing.duration_minutes,
        });

        info!(
            session_id = %session_id,
            user_id = %caller,
            duration = %format_duration_minutes(closing.duration_minutes),
            distance_m = check_out_distance,
            "Checked out"
        );

        Ok(CheckOutOutcome {
            duration_minutes: closing.duration_minutes,
            message: format!("Checked out after {} minutes", closing.duration_minutes),
        })
    }

    /// Replace a session's notes. Allowed for the owner and for administrators.
    pub fn update_notes(&self, caller: &UserId, session_id: &SessionId, notes: &str) -> Result<()> {
        let now = self.clock.now();
        let session = self.load_session(session_id)?;

        if session.user_id != *caller && !self.is_administrator(caller)? {
            warn!(session_id = %session_id, user_id = %caller, "Notes update by non-owner rejected");
            return Err(FieldcheckError::permission(session::MSG_NOT_YOUR_SESSION));
        }

        if notes.chars().count() > self.rules.notes_max_length {
            return Err(FieldcheckError::invalid_argument(session::notes_too_long_message(
                self.rules.notes_max_length,
            )));
        }

        if !self
            .store
            .update_session(session_id, &session::update_notes(notes.to_string(), now))?
        {
            return Err(FieldcheckError::not_found(format!("Session not found: {}", session_id)));
        }

        self.audit(AuditEventType::NotesUpdated {
            session_id: session_id.clone(),
            updated_by: caller.clone(),
        });
        debug!(session_id = %session_id, user_id = %caller, "Notes updated");

        Ok(())
    }

    /// The caller's active session, if any
    pub fn get_active_session(&self, caller: &UserId) -> Result<Option<Session>> {
        Ok(self.store.find_active_session(caller)?)
    }

    /// The caller's sessions, newest first
    pub fn session_history(&self, caller: &UserId, limit: usize) -> Result<Vec<Session>> {
        Ok(self.store.list_sessions_for_user(caller, limit)?)
    }

    /// Auto-close every active session older than the configured timeout
    pub fn run_stale_sweep(&self) -> Result<SweepReport> {
        StaleSessionSweep::new(
            self.store.clone(),
            self.clock.clone(),
            self.rules.auto_checkout_hours,
        )
        .run()
    }

    fn load_user(&self, id: &UserId) -> Result<User> {
        self.store
            .get_user(id)?
            .ok_or_else(|| FieldcheckError::not_found(format!("User not found: {}", id)))
    }

    fn load_session(&self, id: &SessionId) -> Result<Session> {
        self.store
            .get_session(id)?
            .ok_or_else(|| FieldcheckError::not_found(format!("Session not found: {}", id)))
    }

    fn is_administrator(&self, id: &UserId) -> Result<bool> {
        Ok(self
            .store
            .get_user(id)?
            .is_some_and(|user| user.role.is_administrator()))
    }

    fn outside_schedule_message(
        &self,
        provider_id: &UserId,
        school_id: &SchoolId,
        now: &chrono::DateTime<chrono::Local>,
    ) -> Result<String> {
        let windows: Vec<String> = self
            .schedules
            .effective_today(provider_id, school_id, now)?
            .iter()
            .filter_map(|slot| slot.window())
            .map(|w| w.to_string())
            .collect();

        Ok(if windows.is_empty() {
            session::MSG_OUTSIDE_SCHEDULE.to_string()
        } else {
            format!(
                "{} Scheduled today: {}.",
                session::MSG_OUTSIDE_SCHEDULE,
                windows.join(", ")
            )
        })
    }

    /// Record a rejected check-in and hand the error back
    fn deny(&self, user_id: &UserId, school_id: &SchoolId, err: FieldcheckError) -> FieldcheckError {
        warn!(
            user_id = %user_id,
            school_id = %school_id,
            reason = %err.message(),
            "Check-in rejected"
        );
        self.audit(AuditEventType::CheckInDenied {
            user_id: user_id.clone(),
            school_id: school_id.clone(),
            reason: err.message().to_string(),
        });
        err
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::at(self.clock.now(), event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}

fn ensure_valid_location(location: &GeoPoint) -> Result<()> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(FieldcheckError::invalid_argument(format!(
            "Invalid location ({}, {})",
            location.latitude, location.longitude
        )))
    }
}

/// Seed reference records into the store
pub fn seed_records(
    store: &dyn Store,
    users: &[User],
    schools: &[School],
    schedules: &[fieldcheck_api::ScheduleSlot],
) -> Result<()> {
    for user in users {
        store.put_user(user)?;
    }
    for school in schools {
        store.put_school(school)?;
    }
    for slot in schedules {
        store.put_schedule(slot)?;
    }
    Ok(())
}
