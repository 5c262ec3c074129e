//! Per-room "last activity" tracking.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Remembers when a room last saw a participant do something and answers
/// whether it has been quiet for longer than the idle threshold.
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    last_activity: DateTime<Utc>,
    idle_threshold: Duration,
}

impl ActivityMonitor {
    /// Starts tracking with `now` as the first recorded activity.
    pub fn new(now: DateTime<Utc>, idle_threshold: Duration) -> Self {
        Self {
            last_activity: now,
            idle_threshold,
        }
    }

    /// Records activity at `at`. Older timestamps are ignored so the
    /// marker never moves backwards.
    pub fn record(&mut self, at: DateTime<Utc>) {
        if at > self.last_activity {
            self.last_activity = at;
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    /// How long the room has been quiet as of `now` (zero if `now` is
    /// earlier than the last activity).
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).to_std().unwrap_or(Duration::ZERO)
    }

    /// `true` once the quiet period strictly exceeds the threshold.
    pub fn is_idle(&self, now: DateTime<Utc>) -> bool {
        self.idle_for(now) > self.idle_threshold
    }
}
