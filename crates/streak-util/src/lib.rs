//! Shared utilities for streakd
//!
//! This crate provides:
//! - ID types (UserId, ActivityId, ClientId)
//! - The injectable `Clock` and calendar-day arithmetic
//! - Error types
//! - Rate limiting helpers
//! - Default paths for socket, data, and config files

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
