//! Clock-time arithmetic for slot windows.
//!
//! All times are wall-clock minutes within a single canonical calendar
//! day. Intervals are half-open: a slot ending at 10:00 does not overlap
//! one starting at 10:00.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minutes in a calendar day.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Error types for time parsing and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    /// Input was not a valid HH:MM wall-clock time
    #[error("malformed time {0:?}, expected HH:MM in 24h form")]
    MalformedTime(String),

    /// Arithmetic result left the calendar day
    #[error("time arithmetic left the calendar day ({0} minutes)")]
    OutOfDay(i32),
}

/// A wall-clock time of day, stored as minutes since midnight.
///
/// Serializes as its canonical `HH:MM` string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    /// Parse a strict 24h `HH:MM` string.
    ///
    /// Rejects malformed input rather than clamping.
    pub fn parse(input: &str) -> Result<Self, TimeError> {
        to_minutes(input).map(ClockTime)
    }

    /// Build from minutes since midnight.
    pub fn from_minutes(minutes: u16) -> Result<Self, TimeError> {
        if minutes >= MINUTES_PER_DAY {
            return Err(TimeError::OutOfDay(minutes as i32));
        }
        Ok(ClockTime(minutes))
    }

    /// Minutes since midnight.
    pub fn minutes(self) -> u16 {
        self.0
    }

    /// The exclusive end of an interval starting here.
    ///
    /// Errors if the interval crosses midnight; slots live within one
    /// calendar day.
    pub fn end_of(self, duration_minutes: u16) -> Result<u16, TimeError> {
        let end = self.0 as i32 + duration_minutes as i32;
        if end > MINUTES_PER_DAY as i32 {
            return Err(TimeError::OutOfDay(end));
        }
        Ok(end as u16)
    }

    /// Shift by a signed number of minutes, staying within the day.
    pub fn add_minutes(self, delta: i32) -> Result<Self, TimeError> {
        let shifted = self.0 as i32 + delta;
        if !(0..MINUTES_PER_DAY as i32).contains(&shifted) {
            return Err(TimeError::OutOfDay(shifted));
        }
        Ok(ClockTime(shifted as u16))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", from_minutes(self.0))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ClockTime::parse(&value)
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// Convert a strict `HH:MM` string to minutes since midnight.
pub fn to_minutes(input: &str) -> Result<u16, TimeError> {
    let malformed = || TimeError::MalformedTime(input.to_string());

    let (hours, minutes) = input.split_once(':').ok_or_else(malformed)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(malformed());
    }

    let hours: u16 = hours.parse().map_err(|_| malformed())?;
    let minutes: u16 = minutes.parse().map_err(|_| malformed())?;
    if hours >= 24 || minutes >= 60 {
        return Err(malformed());
    }

    Ok(hours * 60 + minutes)
}

/// Format minutes since midnight as `HH:MM`.
pub fn from_minutes(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Half-open interval intersection on minute offsets.
///
/// Back-to-back intervals do not overlap.
pub fn overlaps(start_a: u16, dur_a: u16, start_b: u16, dur_b: u16) -> bool {
    let end_a = start_a as u32 + dur_a as u32;
    let end_b = start_b as u32 + dur_b as u32;
    (start_a as u32) < end_b && end_a > start_b as u32
}

/// Source of "now" for past-window checks.
///
/// Injected so tests can pin the calendar.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}
