//! Command types for the fieldcheckd protocol

use fieldcheck_util::{ClientId, FieldcheckError, GeoPoint, SessionId, SchoolId, UserId};
use serde::{Deserialize, Serialize};

use crate::{API_VERSION, ClientRole, DeviceInfo, HealthStatus, Session, SweepReport};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Identity asserted by the authenticating front end
    #[serde(default)]
    pub caller: Option<UserId>,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            caller: None,
            command,
        }
    }

    pub fn with_caller(mut self, caller: UserId) -> Self {
        self.caller = Some(caller);
        self
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<FieldcheckError> for ErrorInfo {
    fn from(err: FieldcheckError) -> Self {
        Self::new(ErrorCode::from(&err), err.message())
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthenticated,
    NotFound,
    PermissionDenied,
    Conflict,
    PreconditionFailed,
    InvalidArgument,
    Internal,
    // Transport level
    InvalidRequest,
    RateLimited,
}

impl From<&FieldcheckError> for ErrorCode {
    fn from(err: &FieldcheckError) -> Self {
        match err {
            FieldcheckError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            FieldcheckError::NotFound(_) => ErrorCode::NotFound,
            FieldcheckError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            FieldcheckError::Conflict(_) => ErrorCode::Conflict,
            FieldcheckError::PreconditionFailed(_) => ErrorCode::PreconditionFailed,
            FieldcheckError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            FieldcheckError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Start a session at a school
    CheckIn {
        school_id: SchoolId,
        location: GeoPoint,
        #[serde(default)]
        device_info: Option<DeviceInfo>,
    },

    /// Close the caller's session
    CheckOut {
        session_id: SessionId,
        location: GeoPoint,
    },

    /// Replace a session's notes
    UpdateNotes { session_id: SessionId, notes: String },

    /// The caller's active session, if any
    GetActiveSession,

    /// The caller's sessions, newest first
    SessionHistory {
        #[serde(default)]
        limit: Option<usize>,
    },

    /// Get health status
    GetHealth,

    // Admin commands

    /// Close every stale active session now (admin peers only)
    RunStaleSweep,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Whether the command acts on behalf of an end user
    pub fn requires_caller(&self) -> bool {
        !matches!(
            self,
            Command::GetHealth | Command::RunStaleSweep | Command::Ping
        )
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    CheckedIn {
        session_id: SessionId,
        distance_meters: i64,
        message: String,
    },
    CheckedOut {
        duration_minutes: i64,
        message: String,
    },
    NotesUpdated,
    ActiveSession {
        session: Option<Session>,
    },
    SessionHistory {
        sessions: Vec<Session>,
    },
    SweepCompleted(SweepReport),
    Health(HealthStatus),
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_caller() {
        let req = Request::new(
            7,
            Command::CheckIn {
                school_id: SchoolId::new("s-1"),
                location: GeoPoint::new(40.7129, -74.0060),
                device_info: None,
            },
        )
        .with_caller(UserId::new("u-prov"));

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""type":"check_in""#));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, 7);
        assert_eq!(parsed.caller, Some(UserId::new("u-prov")));
        assert!(matches!(parsed.command, Command::CheckIn { .. }));
    }

    #[test]
    fn missing_caller_deserializes_as_none() {
        let json = r#"{"request_id":1,"api_version":1,"command":{"type":"get_active_session"}}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        assert!(parsed.caller.is_none());
        assert!(parsed.command.requires_caller());
    }

    #[test]
    fn error_codes_follow_error_kinds() {
        let info = ErrorInfo::from(FieldcheckError::conflict("Already checked in. Please check out first."));
        assert_eq!(info.code, ErrorCode::Conflict);
        assert_eq!(info.message, "Already checked in. Please check out first.");

        let json = serde_json::to_string(&ErrorCode::PreconditionFailed).unwrap();
        assert_eq!(json, "\"precondition_failed\"");
    }

    #[test]
    fn response_serialization() {
        let resp = Response::success(
            3,
            ResponsePayload::CheckedOut {
                duration_minutes: 30,
                message: "Checked out after 30 minutes".into(),
            },
        );

        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 3);
        match parsed.result {
            ResponseResult::Ok(ResponsePayload::CheckedOut { duration_minutes, .. }) => {
                assert_eq!(duration_minutes, 30)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
