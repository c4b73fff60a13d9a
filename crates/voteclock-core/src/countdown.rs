//! Countdown formatting.
//!
//! Turns a signed "milliseconds left" value into the string every page
//! shows. Elapsed is decided once from the raw value; the decomposed fields
//! are only used for display.

use serde::{Deserialize, Serialize};

/// The one terminal label, whatever page is asking.
pub const ENDED_LABEL: &str = "Ended";

const SECS_PER_DAY: i64 = 86_400;
const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_MIN: i64 = 60;

/// One observation of a countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownSample {
    /// Milliseconds until the deadline; negative once it has passed.
    pub remaining_ms: i64,
    pub elapsed: bool,
    pub formatted: String,
}

/// Whole days/hours/minutes/seconds of a positive remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Breakdown {
    /// Split whole seconds; sub-second remainders are dropped.
    pub fn from_millis(remaining_ms: i64) -> Self {
        let total = (remaining_ms / 1000).max(0);
        Self {
            days: total / SECS_PER_DAY,
            hours: (total % SECS_PER_DAY) / SECS_PER_HOUR,
            minutes: (total % SECS_PER_HOUR) / SECS_PER_MIN,
            seconds: total % SECS_PER_MIN,
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.days * SECS_PER_DAY + self.hours * SECS_PER_HOUR + self.minutes * SECS_PER_MIN + self.seconds
    }
}

impl std::fmt::Display for Breakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d {}h {}m {}s", self.days, self.hours, self.minutes, self.seconds)
    }
}

impl CountdownSample {
    pub fn from_remaining_ms(remaining_ms: i64) -> Self {
        if remaining_ms <= 0 {
            return Self::ended(remaining_ms);
        }
        Self {
            remaining_ms,
            elapsed: false,
            formatted: Breakdown::from_millis(remaining_ms).to_string(),
        }
    }

    fn ended(remaining_ms: i64) -> Self {
        Self {
            remaining_ms,
            elapsed: true,
            formatted: ENDED_LABEL.to_string(),
        }
    }

    /// Display fields, or `None` once elapsed.
    pub fn breakdown(&self) -> Option<Breakdown> {
        (!self.elapsed).then(|| Breakdown::from_millis(self.remaining_ms))
    }
}
