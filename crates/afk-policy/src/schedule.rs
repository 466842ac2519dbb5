//! Work-hours schedule.
//!
//! A timestamp is in the **work** window iff, in the schedule's time zone,
//! its weekday is a configured work day and `start_hour <= hour < end_hour`.
//! Everything else (weekends, evenings, early mornings) is **off**.
//!
//! Defaults: Monday–Friday, 08:00–17:00 Europe/Berlin.

use std::fmt;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::PolicyError;

/// Which threshold window a timestamp falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyWindow {
    Work,
    Off,
}

impl fmt::Display for PolicyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyWindow::Work => write!(f, "work"),
            PolicyWindow::Off => write!(f, "off"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkSchedule {
    pub timezone: Tz,
    pub work_days: Vec<Weekday>,
    /// Inclusive.
    pub start_hour: u32,
    /// Exclusive.
    pub end_hour: u32,
}

impl Default for WorkSchedule {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Berlin,
            work_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            start_hour: 8,
            end_hour: 17,
        }
    }
}

impl WorkSchedule {
    /// Build a schedule, rejecting an empty or inverted hour range.
    pub fn new(
        timezone: Tz,
        work_days: Vec<Weekday>,
        start_hour: u32,
        end_hour: u32,
    ) -> Result<Self, PolicyError> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(PolicyError::InvalidWorkHours {
                start: start_hour,
                end: end_hour,
            });
        }
        Ok(Self {
            timezone,
            work_days,
            start_hour,
            end_hour,
        })
    }

    pub fn window_at(&self, now: DateTime<Utc>) -> PolicyWindow {
        let local = now.with_timezone(&self.timezone);
        let hour = local.hour();
        if self.work_days.contains(&local.weekday())
            && hour >= self.start_hour
            && hour < self.end_hour
        {
            PolicyWindow::Work
        } else {
            PolicyWindow::Off
        }
    }
}
