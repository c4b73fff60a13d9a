//! Absolute deadlines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

/// An absolute point in time a countdown runs toward.
///
/// Never mutated: renewal builds a new `Deadline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deadline(DateTime<Utc>);

impl Deadline {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// `now + duration`, failing if the result leaves chrono's range.
    pub fn after(now: DateTime<Utc>, duration: Duration) -> Result<Self, LifecycleError> {
        now.checked_add_signed(duration)
            .map(Self)
            .ok_or_else(|| LifecycleError::InvalidDeadline {
                input: format!("{now} + {duration}"),
                reason: "out of representable range".into(),
            })
    }

    pub fn from_epoch_ms(ms: i64) -> Result<Self, LifecycleError> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .map(Self)
            .ok_or_else(|| LifecycleError::InvalidDeadline {
                input: ms.to_string(),
                reason: "out of representable range".into(),
            })
    }

    /// Parse what the election store hands out.
    ///
    /// Accepts RFC 3339 (`2026-11-03T20:00:00Z`), a naive timestamp taken as
    /// UTC (`2026-11-03T20:00:00` or with a space), or a bare date meaning
    /// midnight UTC. Empty input is rejected.
    pub fn parse(input: &str) -> Result<Self, LifecycleError> {
        let trimmed = input.trim();
        let invalid = |reason: &str| LifecycleError::InvalidDeadline {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid("empty timestamp"));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                return Ok(Self(naive.and_utc()));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Self(naive.and_utc()))
                .ok_or_else(|| invalid("invalid date"));
        }
        Err(invalid("not an RFC 3339 timestamp or YYYY-MM-DD date"))
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// Signed milliseconds from `now` until the deadline.
    ///
    /// Total for every pair of representable instants (saturates).
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        self.0.timestamp_millis().saturating_sub(now.timestamp_millis())
    }

    pub fn has_passed(&self, now: DateTime<Utc>) -> bool {
        self.remaining_ms(now) <= 0
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl FromStr for Deadline {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DateTime<Utc>> for Deadline {
    fn from(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }
}
