//! Validated settings structures

use crate::schema::{RawConfig, RawSchedule, RawServiceConfig, RawSessionsConfig};
use crate::validation::{parse_day, parse_time, parse_timestamp};
use fieldcheck_api::{Role, School, ScheduleSlot, User};
use fieldcheck_util::{
    DEFAULT_CHECK_IN_RADIUS_METERS, GeoPoint, ScheduleId, SchoolId, UserId, default_data_dir,
    default_socket_path,
};
use std::path::PathBuf;
use std::time::Duration;

/// Validated configuration ready for use by the daemon
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceConfig,
    pub sessions: SessionRules,
    pub users: Vec<User>,
    pub schools: Vec<School>,
    pub schedules: Vec<ScheduleSlot>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let users = raw
            .users
            .into_iter()
            .filter_map(|u| {
                Some(User {
                    role: u.role.parse::<Role>().ok()?,
                    id: UserId::new(u.id),
                    display_name: u.display_name,
                    email: u.email,
                })
            })
            .collect();

        let schools = raw
            .schools
            .into_iter()
            .map(|s| School {
                id: SchoolId::new(s.id),
                name: s.name,
                location: GeoPoint::new(s.latitude, s.longitude),
                check_in_radius_meters: s.check_in_radius_meters,
            })
            .collect();

        let schedules = raw.schedules.into_iter().filter_map(convert_schedule).collect();

        Self {
            service: ServiceConfig::from_raw(raw.service),
            sessions: SessionRules::from_raw(&raw.sessions),
            users,
            schools,
            schedules,
        }
    }
}

fn convert_schedule(raw: RawSchedule) -> Option<ScheduleSlot> {
    let effective_until = match raw.effective_until.as_deref() {
        Some(s) => Some(parse_timestamp(s).ok()?),
        None => None,
    };

    Some(ScheduleSlot {
        day: parse_day(&raw.day).ok()?,
        start: parse_time(&raw.start).ok()?,
        end: parse_time(&raw.end).ok()?,
        effective_from: parse_timestamp(&raw.effective_from).ok()?,
        effective_until,
        is_active: raw.is_active,
        id: ScheduleId::new(raw.id),
        provider_id: UserId::new(raw.provider_id),
        school_id: SchoolId::new(raw.school_id),
    })
}

/// Service paths
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(default_socket_path),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Tunables for the session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRules {
    /// Geofence radius for schools without their own
    pub default_check_in_radius_meters: u32,
    /// Active sessions older than this are auto-closed
    pub auto_checkout_hours: u32,
    pub sweep_interval: Duration,
    /// Maximum notes length, counted in characters
    pub notes_max_length: usize,
}

impl SessionRules {
    fn from_raw(raw: &RawSessionsConfig) -> Self {
        let defaults = Self::default();
        Self {
            default_check_in_radius_meters: raw
                .default_check_in_radius_meters
                .unwrap_or(defaults.default_check_in_radius_meters),
            auto_checkout_hours: raw
                .auto_checkout_hours
                .unwrap_or(defaults.auto_checkout_hours),
            sweep_interval: raw
                .sweep_interval_minutes
                .map(|m| Duration::from_secs(m.saturating_mul(60)))
                .unwrap_or(defaults.sweep_interval),
            notes_max_length: raw.notes_max_length.unwrap_or(defaults.notes_max_length),
        }
    }
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            default_check_in_radius_meters: DEFAULT_CHECK_IN_RADIUS_METERS,
            auto_checkout_hours: 12,
            sweep_interval: Duration::from_secs(15 * 60),
            notes_max_length: 1000,
        }
    }
}
