//! SQLite-based store implementation

use chrono::{DateTime, Local, TimeZone};
use fieldcheck_api::{DeviceInfo, Role, School, ScheduleSlot, Session, SessionStatus, User};
use fieldcheck_util::{
    DayOfWeek, GeoPoint, ScheduleId, SchoolId, SessionId, UserId, WallClock,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, SessionPatch, Store, StoreError, StoreResult};

const SESSION_COLUMNS: &str = "id, user_id, user_role, user_display_name, school_id, school_name, \
     schedule_id, status, check_in_time, check_in_lat, check_in_lon, check_in_distance_m, \
     check_out_time, check_out_lat, check_out_lon, check_out_distance_m, duration_minutes, \
     notes, notes_updated_at, device_info_json, created_at, updated_at";

const SCHEDULE_COLUMNS: &str =
    "id, provider_id, school_id, day, start_time, end_time, effective_from, effective_until, is_active";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL,
                role TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS schools (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                check_in_radius_meters INTEGER
            );

            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                provider_id TEXT NOT NULL,
                school_id TEXT NOT NULL,
                day INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                effective_from INTEGER NOT NULL,
                effective_until INTEGER,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            -- Times are unix milliseconds so range queries compare numerically
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                user_role TEXT NOT NULL,
                user_display_name TEXT NOT NULL,
                school_id TEXT NOT NULL,
                school_name TEXT NOT NULL,
                schedule_id TEXT,
                status TEXT NOT NULL,
                check_in_time INTEGER NOT NULL,
                check_in_lat REAL NOT NULL,
                check_in_lon REAL NOT NULL,
                check_in_distance_m INTEGER NOT NULL,
                check_out_time INTEGER,
                check_out_lat REAL,
                check_out_lon REAL,
                check_out_distance_m INTEGER,
                duration_minutes INTEGER,
                notes TEXT NOT NULL DEFAULT '',
                notes_updated_at INTEGER,
                device_info_json TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- At most one active session per user
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active
                ON sessions(user_id) WHERE status = 'active';

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_sessions_status_check_in
                ON sessions(status, check_in_time);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id, check_in_time);
            CREATE INDEX IF NOT EXISTS idx_schedules_lookup
                ON schedules(provider_id, school_id, day);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    fn query_sessions(
        &self,
        where_clause: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Session>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions {where_clause}");
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params, SessionRow::from_row)?;
        let sessions = rows
            .map(|row| row.map_err(StoreError::from).and_then(SessionRow::into_session))
            .collect::<StoreResult<Vec<_>>>();
        sessions
    }
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Local>> {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::InvalidRecord(format!("timestamp out of range: {ms}")))
}

fn from_millis_opt(ms: Option<i64>) -> StoreResult<Option<DateTime<Local>>> {
    ms.map(from_millis).transpose()
}

fn invalid(e: impl std::fmt::Display) -> StoreError {
    StoreError::InvalidRecord(e.to_string())
}

/// A session row as stored, before conversion
struct SessionRow {
    id: String,
    user_id: String,
    user_role: String,
    user_display_name: String,
    school_id: String,
    school_name: String,
    schedule_id: Option<String>,
    status: String,
    check_in_time: i64,
    check_in_lat: f64,
    check_in_lon: f64,
    check_in_distance_m: i64,
    check_out_time: Option<i64>,
    check_out_lat: Option<f64>,
    check_out_lon: Option<f64>,
    check_out_distance_m: Option<i64>,
    duration_minutes: Option<i64>,
    notes: String,
    notes_updated_at: Option<i64>,
    device_info_json: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            user_role: row.get(2)?,
            user_display_name: row.get(3)?,
            school_id: row.get(4)?,
            school_name: row.get(5)?,
            schedule_id: row.get(6)?,
            status: row.get(7)?,
            check_in_time: row.get(8)?,
            check_in_lat: row.get(9)?,
            check_in_lon: row.get(10)?,
            check_in_distance_m: row.get(11)?,
            check_out_time: row.get(12)?,
            check_out_lat: row.get(13)?,
            check_out_lon: row.get(14)?,
            check_out_distance_m: row.get(15)?,
            duration_minutes: row.get(16)?,
            notes: row.get(17)?,
            notes_updated_at: row.get(18)?,
            device_info_json: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }

    fn into_session(self) -> StoreResult<Session> {
        let device_info = match self.device_info_json {
            Some(json) => Some(serde_json::from_str::<DeviceInfo>(&json)?),
            None => None,
        };
        let check_out_location = match (self.check_out_lat, self.check_out_lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };

        Ok(Session {
            id: SessionId::new(self.id),
            user_id: UserId::new(self.user_id),
            user_role: self.user_role.parse::<Role>().map_err(invalid)?,
            user_display_name: self.user_display_name,
            school_id: SchoolId::new(self.school_id),
            school_name: self.school_name,
            schedule_id: self.schedule_id.map(ScheduleId::new),
            status: self.status.parse::<SessionStatus>().map_err(invalid)?,
            check_in_time: from_millis(self.check_in_time)?,
            check_in_location: GeoPoint::new(self.check_in_lat, self.check_in_lon),
            check_in_distance_meters: self.check_in_distance_m,
            check_out_time: from_millis_opt(self.check_out_time)?,
            check_out_location,
            check_out_distance_meters: self.check_out_distance_m,
            duration_minutes: self.duration_minutes,
            notes: self.notes,
            notes_updated_at: from_millis_opt(self.notes_updated_at)?,
            device_info,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

struct ScheduleRow {
    id: String,
    provider_id: String,
    school_id: String,
    day: u8,
    start_time: String,
    end_time: String,
    effective_from: i64,
    effective_until: Option<i64>,
    is_active: bool,
}

impl ScheduleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            provider_id: row.get(1)?,
            school_id: row.get(2)?,
            day: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            effective_from: row.get(6)?,
            effective_until: row.get(7)?,
            is_active: row.get(8)?,
        })
    }

    fn into_slot(self) -> StoreResult<ScheduleSlot> {
        Ok(ScheduleSlot {
            id: ScheduleId::new(self.id),
            provider_id: UserId::new(self.provider_id),
            school_id: SchoolId::new(self.school_id),
            day: DayOfWeek::from_index(self.day)
                .ok_or_else(|| invalid(format!("day index {}", self.day)))?,
            start: self.start_time.parse::<WallClock>().map_err(invalid)?,
            end: self.end_time.parse::<WallClock>().map_err(invalid)?,
            effective_from: from_millis(self.effective_from)?,
            effective_until: from_millis_opt(self.effective_until)?,
            is_active: self.is_active,
        })
    }
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .map_err(invalid)?;
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn get_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        let conn = self.conn()?;

        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT display_name, email, role FROM users WHERE id = ?",
                [id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(display_name, email, role)| -> StoreResult<User> {
            Ok(User {
                id: id.clone(),
                display_name,
                email,
                role: role.parse::<Role>().map_err(invalid)?,
            })
        })
        .transpose()
    }

    fn put_user(&self, user: &User) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO users (id, display_name, email, role)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET display_name = excluded.display_name,
                          email = excluded.email,
                          role = excluded.role
            "#,
            params![
                user.id.as_str(),
                user.display_name,
                user.email,
                user.role.as_str()
            ],
        )?;

        debug!(user_id = %user.id, role = %user.role, "User stored");
        Ok(())
    }

    fn get_school(&self, id: &SchoolId) -> StoreResult<Option<School>> {
        let conn = self.conn()?;

        let school = conn
            .query_row(
                "SELECT name, latitude, longitude, check_in_radius_meters FROM schools WHERE id = ?",
                [id.as_str()],
                |row| {
                    Ok(School {
                        id: id.clone(),
                        name: row.get(0)?,
                        location: GeoPoint::new(row.get(1)?, row.get(2)?),
                        check_in_radius_meters: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(school)
    }

    fn put_school(&self, school: &School) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO schools (id, name, latitude, longitude, check_in_radius_meters)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET name = excluded.name,
                          latitude = excluded.latitude,
                          longitude = excluded.longitude,
                          check_in_radius_meters = excluded.check_in_radius_meters
            "#,
            params![
                school.id.as_str(),
                school.name,
                school.location.latitude,
                school.location.longitude,
                school.check_in_radius_meters
            ],
        )?;

        debug!(school_id = %school.id, "School stored");
        Ok(())
    }

    fn put_schedule(&self, slot: &ScheduleSlot) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO schedules
                (id, provider_id, school_id, day, start_time, end_time,
                 effective_from, effective_until, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET provider_id = excluded.provider_id,
                          school_id = excluded.school_id,
                          day = excluded.day,
                          start_time = excluded.start_time,
                          end_time = excluded.end_time,
                          effective_from = excluded.effective_from,
                          effective_until = excluded.effective_until,
                          is_active = excluded.is_active
            "#,
            params![
                slot.id.as_str(),
                slot.provider_id.as_str(),
                slot.school_id.as_str(),
                slot.day.index(),
                slot.start.to_string(),
                slot.end.to_string(),
                slot.effective_from.timestamp_millis(),
                slot.effective_until.map(|t| t.timestamp_millis()),
                slot.is_active
            ],
        )?;

        debug!(schedule_id = %slot.id, day = %slot.day, "Schedule slot stored");
        Ok(())
    }

    fn find_schedule_slots(
        &self,
        provider_id: &UserId,
        school_id: &SchoolId,
        day: DayOfWeek,
    ) -> StoreResult<Vec<ScheduleSlot>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules \
             WHERE provider_id = ? AND school_id = ? AND day = ? AND is_active = 1 \
             ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(
            params![provider_id.as_str(), school_id.as_str(), day.index()],
            ScheduleRow::from_row,
        )?;
        let slots = rows
            .map(|row| row.map_err(StoreError::from).and_then(ScheduleRow::into_slot))
            .collect::<StoreResult<Vec<_>>>();
        slots
    }

    fn get_session(&self, id: &SessionId) -> StoreResult<Option<Session>> {
        Ok(self
            .query_sessions("WHERE id = ?", [id.as_str()])?
            .into_iter()
            .next())
    }

    fn find_active_session(&self, user_id: &UserId) -> StoreResult<Option<Session>> {
        Ok(self
            .query_sessions(
                "WHERE user_id = ? AND status = 'active' LIMIT 1",
                [user_id.as_str()],
            )?
            .into_iter()
            .next())
    }

    fn create_session(&self, session: &Session) -> StoreResult<SessionId> {
        let conn = self.conn()?;
        let device_info_json = session
            .device_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let sql = format!(
            "INSERT INTO sessions ({SESSION_COLUMNS}) VALUES \
             (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let inserted = conn.execute(
            &sql,
            params![
                session.id.as_str(),
                session.user_id.as_str(),
                session.user_role.as_str(),
                session.user_display_name,
                session.school_id.as_str(),
                session.school_name,
                session.schedule_id.as_ref().map(|s| s.as_str()),
                session.status.as_str(),
                session.check_in_time.timestamp_millis(),
                session.check_in_location.latitude,
                session.check_in_location.longitude,
                session.check_in_distance_meters,
                session.check_out_time.map(|t| t.timestamp_millis()),
                session.check_out_location.map(|p| p.latitude),
                session.check_out_location.map(|p| p.longitude),
                session.check_out_distance_meters,
                session.duration_minutes,
                session.notes,
                session.notes_updated_at.map(|t| t.timestamp_millis()),
                device_info_json,
                session.created_at.timestamp_millis(),
                session.updated_at.timestamp_millis(),
            ],
        );

        match inserted {
            Ok(_) => {
                debug!(session_id = %session.id, user_id = %session.user_id, "Session created");
                Ok(session.id.clone())
            }
            Err(e) => match StoreError::from(e) {
                StoreError::Conflict(_) => Err(StoreError::Conflict(format!(
                    "user {} already has an active session",
                    session.user_id
                ))),
                other => Err(other),
            },
        }
    }

    fn update_session(&self, id: &SessionId, patch: &SessionPatch) -> StoreResult<bool> {
        let conn = self.conn()?;

        let changed = conn.execute(
            r#"
            UPDATE sessions SET
                status = COALESCE(?1, status),
                check_out_time = COALESCE(?2, check_out_time),
                check_out_lat = COALESCE(?3, check_out_lat),
                check_out_lon = COALESCE(?4, check_out_lon),
                check_out_distance_m = COALESCE(?5, check_out_distance_m),
                duration_minutes = COALESCE(?6, duration_minutes),
                notes = CASE
                    WHEN ?12 IS NULL THEN COALESCE(?7, notes)
                    WHEN notes = '' THEN ?12
                    ELSE notes || char(10, 10) || ?12
                END,
                notes_updated_at = COALESCE(?8, notes_updated_at),
                updated_at = ?9
            WHERE id = ?10 AND (?11 IS NULL OR status = ?11)
            "#,
            params![
                patch.status.map(|s| s.as_str()),
                patch.check_out_time.map(|t| t.timestamp_millis()),
                patch.check_out_location.map(|p| p.latitude),
                patch.check_out_location.map(|p| p.longitude),
                patch.check_out_distance_meters,
                patch.duration_minutes,
                patch.notes,
                patch.notes_updated_at.map(|t| t.timestamp_millis()),
                patch.updated_at.timestamp_millis(),
                id.as_str(),
                patch.expected_status.map(|s| s.as_str()),
                patch.append_note,
            ],
        )?;

        debug!(session_id = %id, changed, "Session update applied");
        Ok(changed > 0)
    }

    fn query_stale_active_sessions(&self, cutoff: DateTime<Local>) -> StoreResult<Vec<Session>> {
        self.query_sessions(
            "WHERE status = 'active' AND check_in_time < ? ORDER BY check_in_time",
            [cutoff.timestamp_millis()],
        )
    }

    fn list_sessions_for_user(&self, user_id: &UserId, limit: usize) -> StoreResult<Vec<Session>> {
        self.query_sessions(
            "WHERE user_id = ? ORDER BY check_in_time DESC, id LIMIT ?",
            params![user_id.as_str(), limit as i64],
        )
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
