//! afk-policy
//!
//! Time-of-day mute policy.
//!
//! - Work hours and off hours carry separate mute thresholds.
//! - Which window applies is decided from the local weekday and hour of an
//!   injected timestamp, in a configured time zone.
//! - [`PolicyResolver::threshold_for`] is the single decision point; nothing
//!   else in the workspace reads the wall clock to pick a threshold.
//!
//! Pure deterministic logic. No IO, no wall-clock.

mod schedule;
mod thresholds;

use chrono::{DateTime, Duration, Utc};

pub use schedule::{PolicyWindow, WorkSchedule};
pub use thresholds::MuteThresholds;

/// Errors raised when a policy value is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("mute threshold for {window} hours must be positive (got {seconds}s)")]
    NonPositiveThreshold { window: PolicyWindow, seconds: i64 },

    #[error("work hours must satisfy start < end <= 24 (got {start}..{end})")]
    InvalidWorkHours { start: u32, end: u32 },
}

/// Schedule + thresholds: answers "how long may a client stay muted right now?"
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyResolver {
    pub schedule: WorkSchedule,
    pub thresholds: MuteThresholds,
}

impl PolicyResolver {
    pub fn new(schedule: WorkSchedule, thresholds: MuteThresholds) -> Self {
        Self {
            schedule,
            thresholds,
        }
    }

    /// Window in force at `now`.
    pub fn window_at(&self, now: DateTime<Utc>) -> PolicyWindow {
        self.schedule.window_at(now)
    }

    /// Mute threshold in force at `now`.
    pub fn threshold_for(&self, now: DateTime<Utc>) -> Duration {
        self.thresholds.for_window(self.window_at(now))
    }

    /// Replace the threshold of whichever window is active at `now`.
    ///
    /// Returns the window that was changed. On error nothing changes.
    pub fn set_current_threshold(
        &mut self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<PolicyWindow, PolicyError> {
        let window = self.window_at(now);
        self.thresholds.set(window, threshold)?;
        Ok(window)
    }
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::new(WorkSchedule::default(), MuteThresholds::default())
    }
}
