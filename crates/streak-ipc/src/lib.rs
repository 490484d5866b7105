//! IPC layer for streakd
//!
//! Provides:
//! - Unix domain socket server with per-client reader/writer tasks
//! - NDJSON (newline-delimited JSON) framing of requests, responses and events
//! - Client used by `streakctl` and the integration tests
//! - Peer UID based roles

mod client;
mod server;

pub use client::*;
pub use server::*;

use streak_api::ErrorCode;
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

    #[error("Server not started")]
    NotStarted,

    #[error("Response {got} does not answer request {expected}")]
    UnexpectedResponse { expected: u64, got: u64 },

    #[error("Request rejected ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },
}

pub type IpcResult<T> = Result<T, IpcError>;
