//! Protocol and record types for fieldcheckd
//!
//! This crate defines the stable API between fieldcheckd and clients:
//! - Domain records (users, schools, schedule slots, sessions)
//! - Commands (requests from clients)
//! - Responses and error codes
//! - Versioning

mod commands;
mod types;

pub use commands::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
