use std::fmt;

use serde::{Deserialize, Serialize};

const SECS_PER_DAY: u64 = 24 * 3600;
const SECS_PER_HOUR: u64 = 3600;
const SECS_PER_MINUTE: u64 = 60;

/// A duration broken down for display: `hours < 24`, `minutes < 60`, `seconds < 60`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeProgress {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeProgress {
    pub fn total_seconds(&self) -> u64 {
        self.days * SECS_PER_DAY
            + self.hours * SECS_PER_HOUR
            + self.minutes * SECS_PER_MINUTE
            + self.seconds
    }
}

impl fmt::Display for TimeProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d {}h {}m {}s",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

pub fn to_breakdown(total_seconds: u64) -> TimeProgress {
    let days = total_seconds / SECS_PER_DAY;
    let remaining = total_seconds % SECS_PER_DAY;

    let hours = remaining / SECS_PER_HOUR;
    let remaining = remaining % SECS_PER_HOUR;

    TimeProgress {
        days,
        hours,
        minutes: remaining / SECS_PER_MINUTE,
        seconds: remaining % SECS_PER_MINUTE,
    }
}
