use chrono::Duration;

use crate::{PolicyError, PolicyWindow};

/// How long a client may stay continuously muted before it counts as away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MuteThresholds {
    pub work: Duration,
    pub off: Duration,
}

impl Default for MuteThresholds {
    fn default() -> Self {
        Self {
            work: Duration::minutes(90),
            off: Duration::minutes(45),
        }
    }
}

impl MuteThresholds {
    pub fn new(work: Duration, off: Duration) -> Result<Self, PolicyError> {
        ensure_positive(PolicyWindow::Work, work)?;
        ensure_positive(PolicyWindow::Off, off)?;
        Ok(Self { work, off })
    }

    pub fn for_window(&self, window: PolicyWindow) -> Duration {
        match window {
            PolicyWindow::Work => self.work,
            PolicyWindow::Off => self.off,
        }
    }

    pub fn set(&mut self, window: PolicyWindow, threshold: Duration) -> Result<(), PolicyError> {
        ensure_positive(window, threshold)?;
        match window {
            PolicyWindow::Work => self.work = threshold,
            PolicyWindow::Off => self.off = threshold,
        }
        Ok(())
    }
}

fn ensure_positive(window: PolicyWindow, d: Duration) -> Result<(), PolicyError> {
    if d <= Duration::zero() {
        return Err(PolicyError::NonPositiveThreshold {
            window,
            seconds: d.num_seconds(),
        });
    }
    Ok(())
}
