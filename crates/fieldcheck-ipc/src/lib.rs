//! Local socket protocol for fieldcheckd
//!
//! One JSON object per line in each direction. Every request line gets
//! exactly one response line carrying the request's id; a line that does
//! not parse is answered with an `invalid_request` error and the connection
//! stays open. The daemon never pushes unsolicited messages.
//!
//! Clients are classified by peer uid. Root and the daemon's own user are
//! administrators and may trigger the stale-session sweep. Any other peer is
//! a front end that has already authenticated its end user and relays that
//! identity in the request's `caller` field; the daemon trusts the relayed
//! caller and never sees credentials.

mod client;
mod server;

pub use client::*;
pub use server::*;

use thiserror::Error;

/// IPC errors
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Server error: {0}")]
    ServerError(String),
}

pub type IpcResult<T> = Result<T, IpcError>;
