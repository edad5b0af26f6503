//! Audit event types

use chrono::{DateTime, Local};
use fieldcheck_util::{SchoolId, SessionId, UserId};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Seed records loaded from config
    ConfigLoaded {
        users: usize,
        schools: usize,
        schedules: usize,
    },

    CheckedIn {
        session_id: SessionId,
        user_id: UserId,
        school_id: SchoolId,
        distance_meters: i64,
    },

    /// Check-in rejected by a gate
    CheckInDenied {
        user_id: UserId,
        school_id: SchoolId,
        reason: String,
    },

    CheckedOut {
        session_id: SessionId,
        user_id: UserId,
        duration_minutes: i64,
    },

    /// Closed by the stale-session sweep
    AutoCheckedOut {
        session_id: SessionId,
        user_id: UserId,
        duration_minutes: i64,
    },

    NotesUpdated {
        session_id: SessionId,
        updated_by: UserId,
    },

    SweepCompleted {
        matched: usize,
        closed: usize,
        skipped: usize,
        failed: usize,
    },

    /// Client connected
    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self::at(fieldcheck_util::now(), event)
    }

    /// Event stamped with a caller-supplied time
    pub fn at(timestamp: DateTime<Local>, event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp,
            event,
        }
    }
}
