//! Activity tracking and idle detection for Dicey rooms.
//!
//! A room that sits in voting with nobody touching it gets closed
//! automatically. Three pieces make that happen:
//!
//! - [`Clock`] supplies wall-clock time ([`SystemClock`] in production,
//!   [`ManualClock`] in tests).
//! - [`ActivityMonitor`] remembers the last time anything happened.
//! - [`IdleCheckScheduler`] wakes the room actor periodically to ask the
//!   monitor whether the room has gone quiet.
//!
//! The scheduler runs on tokio time and the monitor on the clock, so tests
//! can pause tokio, advance a [`ManualClock`] past the threshold and let
//! a single check fire.

mod clock;
mod monitor;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use monitor::ActivityMonitor;
pub use scheduler::{CheckInfo, IdleCheckConfig, IdleCheckMetrics, IdleCheckScheduler};
