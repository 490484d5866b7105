//! streakd service internals
//!
//! The `streakd` binary is a thin wrapper around [`Service`], which wires
//! together configuration, the SQLite store, the streak engine and the IPC
//! server. It lives in a library so the integration tests can run a whole
//! service against a temporary socket.

mod service;

pub use service::*;
