//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Paths used by the service
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Session lifecycle tunables
    #[serde(default)]
    pub sessions: RawSessionsConfig,

    /// Seed users
    #[serde(default)]
    pub users: Vec<RawUser>,

    /// Seed schools
    #[serde(default)]
    pub schools: Vec<RawSchool>,

    /// Seed schedule slots
    #[serde(default)]
    pub schedules: Vec<RawSchedule>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/fieldcheck/fieldcheckd.sock)
    pub socket_path: Option<PathBuf>,

    /// Data directory for the session database
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSessionsConfig {
    /// Geofence radius for schools that don't set one (default 150)
    pub default_check_in_radius_meters: Option<u32>,

    /// Age at which an active session is auto-closed (default 12)
    pub auto_checkout_hours: Option<u32>,

    /// How often the stale-session sweep runs (default 15)
    pub sweep_interval_minutes: Option<u64>,

    /// Maximum notes length in characters (default 1000)
    pub notes_max_length: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawUser {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    /// "provider" or "administrator"
    pub role: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSchool {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub check_in_radius_meters: Option<u32>,
}

/// Raw schedule slot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSchedule {
    pub id: String,
    pub provider_id: String,
    pub school_id: String,

    /// Day token: "mon" or "monday" (case-insensitive)
    pub day: String,

    /// Start time "HH:MM" (24-hour)
    pub start: String,

    /// End time "HH:MM" (24-hour), not before `start`
    pub end: String,

    /// RFC 3339 instant the slot starts applying
    pub effective_from: String,

    /// RFC 3339 instant the slot stops applying (open-ended if absent)
    pub effective_until: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
