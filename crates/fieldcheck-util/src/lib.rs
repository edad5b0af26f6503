//! Shared utilities for fieldcheck
//!
//! This crate provides:
//! - ID types (UserId, SchoolId, ScheduleId, SessionId, ClientId)
//! - Error taxonomy shared by every operation
//! - Geofence math (Haversine distance, geohash, radius test)
//! - Schedule time windows (wall clock, day of week, durations)
//! - Injectable clocks
//! - Rate limiting helpers
//! - Default paths for socket, data, config, and log directories

mod error;
mod geo;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use geo::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
