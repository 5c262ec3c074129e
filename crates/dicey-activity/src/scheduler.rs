//! Periodic idle-check scheduling for a single room actor.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How often a room looks at its own activity and how quiet it must be
/// before voting is forced to a close.
#[derive(Debug, Clone)]
pub struct IdleCheckConfig {
    /// Time between checks. Zero disables idle checking entirely.
    pub interval: Duration,
    /// A room is idle once it has been quiet for strictly longer than this.
    pub idle_threshold: Duration,
    /// Upper bound of random delay added to the first check so rooms
    /// created together don't all wake on the same tick.
    pub initial_jitter: Duration,
}

impl Default for IdleCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(30 * 60),
            initial_jitter: Duration::from_millis(500),
        }
    }
}

impl IdleCheckConfig {
    /// A config that never fires. Useful for rooms driven purely by tests.
    pub fn disabled() -> Self {
        Self {
            interval: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Fixes values that would make the scheduler misbehave.
    ///
    /// - `initial_jitter` is capped at one `interval`.
    /// - An `interval` longer than `idle_threshold` is allowed but logged:
    ///   idle rooms will be noticed late.
    pub fn validated(mut self) -> Self {
        if !self.interval.is_zero() {
            if self.initial_jitter > self.interval {
                self.initial_jitter = self.interval;
            }
            if self.interval > self.idle_threshold {
                warn!(
                    interval_s = self.interval.as_secs(),
                    threshold_s = self.idle_threshold.as_secs(),
                    "idle check interval longer than idle threshold"
                );
            }
        }
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Check info and metrics
// ---------------------------------------------------------------------------

/// Returned by [`IdleCheckScheduler::wait_for_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInfo {
    /// Check number, starting at 1.
    pub check: u64,
    /// Whole intervals that elapsed without a check because the actor was
    /// busy. Missed checks are skipped, not replayed.
    pub missed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct IdleCheckMetrics {
    pub total_checks: u64,
    pub total_missed: u64,
    /// Checks that found the room idle and forced a resolution.
    pub total_forced: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fires at a fixed interval so a room actor can ask "has anyone done
/// anything lately?".
///
/// Sits next to the command channel in the actor's `select!`:
///
/// ```ignore
/// loop {
///     tokio::select! {
///         Some(cmd) = cmd_rx.recv() => { /* handle command */ }
///         _ = scheduler.wait_for_check() => {
///             if machine.check_idle(clock.now()).forced() {
///                 scheduler.record_forced();
///                 scheduler.pause();
///             }
///         }
///     }
/// }
/// ```
pub struct IdleCheckScheduler {
    config: IdleCheckConfig,
    next_check: Option<Instant>,
    check_count: u64,
    paused: bool,
    metrics: IdleCheckMetrics,
}

impl IdleCheckScheduler {
    pub fn new(config: IdleCheckConfig) -> Self {
        let config = config.validated();

        let next_check = config.is_enabled().then(|| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max_ms = config.initial_jitter.as_millis() as u64;
                Duration::from_millis(rand::rng().random_range(0..=max_ms))
            };
            Instant::now() + config.interval + jitter
        });

        if config.is_enabled() {
            debug!(
                interval_s = config.interval.as_secs(),
                threshold_s = config.idle_threshold.as_secs(),
                "idle check scheduler created"
            );
        } else {
            debug!("idle check scheduler created disabled");
        }

        Self {
            config,
            next_check,
            check_count: 0,
            paused: false,
            metrics: IdleCheckMetrics::default(),
        }
    }

    /// Waits until the next check is due.
    ///
    /// Pends forever when checking is disabled or paused, which leaves the
    /// other `select!` branches free to run.
    pub async fn wait_for_check(&mut self) -> CheckInfo {
        let next = match self.next_check {
            Some(next) if !self.paused => next,
            _ => std::future::pending::<Instant>().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let interval = self.config.interval;
        self.check_count += 1;

        let late_by = now.saturating_duration_since(next);
        let missed = (late_by.as_nanos() / interval.as_nanos().max(1)) as u64;
        if missed > 0 {
            warn!(check = self.check_count, missed, "idle checks skipped");
        }
        self.next_check = Some(now + interval);

        self.metrics.total_checks += 1;
        self.metrics.total_missed += missed;

        trace!(check = self.check_count, "idle check due");

        CheckInfo {
            check: self.check_count,
            missed,
        }
    }

    /// Counts a check that ended in a forced resolution.
    pub fn record_forced(&mut self) {
        self.metrics.total_forced += 1;
    }

    /// Stops checks until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(check = self.check_count, "idle check scheduler paused");
        }
    }

    /// Restarts checks one full interval from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if self.config.is_enabled() {
                self.next_check = Some(Instant::now() + self.config.interval);
            }
            debug!(check = self.check_count, "idle check scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    pub fn check_count(&self) -> u64 {
        self.check_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn idle_threshold(&self) -> Duration {
        self.config.idle_threshold
    }

    pub fn metrics(&self) -> &IdleCheckMetrics {
        &self.metrics
    }
}
