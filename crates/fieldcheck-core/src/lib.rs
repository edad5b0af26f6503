//! Session lifecycle engine for fieldcheckd
//!
//! This crate is the heart of fieldcheckd, containing:
//! - The check-in gates (geofence distance, weekly schedule window)
//! - Session state machine (active -> completed | auto_completed)
//! - Schedule slot resolution
//! - The stale-session sweep
//! - Caller authentication gate

mod auth;
mod engine;
mod schedule;
mod session;
mod sweep;

#[cfg(test)]
mod testing;

pub use auth::*;
pub use engine::*;
pub use schedule::*;
pub use session::*;
pub use sweep::*;
