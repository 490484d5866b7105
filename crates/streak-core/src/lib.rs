//! Activity-streak engine for streakd
//!
//! This crate turns the set of days on which a user logged activity into
//! streak lengths:
//! - Day normalization (`YYYY-MM-DD` strings to [`ActivityDate`])
//! - The streak walk, under the current or longest policy
//! - [`StreakService`], which ties the walk to an [`streak_store::ActivityStore`]

mod calculator;
mod dates;
mod service;

pub use calculator::*;
pub use dates::*;
pub use service::*;
