//! Simulation Time Types
//!
//! Simulated time is a monotonic count of minutes since the start of the
//! simulation. Plans address positions inside a day as clock offsets
//! (minutes since midnight, `0..=MINUTES_PER_DAY`).
//!
//! # Example
//!
//! ```
//! use town_events::SimTime;
//!
//! let t = SimTime::from_day_clock(2, 8, 15);
//! assert_eq!(t.day(), 2);
//! assert_eq!(t.minute_of_day(), 8 * 60 + 15);
//! assert_eq!(t.to_string(), "day_2.08:15");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of simulated minutes in an hour.
pub const MINUTES_PER_HOUR: u32 = 60;

/// Number of simulated minutes in a day.
pub const MINUTES_PER_DAY: u32 = 24 * MINUTES_PER_HOUR;

/// Error type for parsing times and clock offsets from strings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseTimeError {
    #[error("invalid time format: '{0}', expected 'day_N.HH:MM'")]
    InvalidFormat(String),
    #[error("invalid day: '{0}'")]
    InvalidDay(String),
    #[error("invalid clock: '{0}', expected 'HH:MM' between 00:00 and 24:00")]
    InvalidClock(String),
}

/// A point in simulated time, in minutes since the simulation began.
///
/// Serializes to strings like "day_3.14:05". Days are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    /// Creates a time from raw minutes since the simulation began.
    pub fn from_minutes(minutes: u64) -> Self {
        Self(minutes)
    }

    /// Creates a time for the start of the simulation.
    pub fn start() -> Self {
        Self(0)
    }

    /// Creates a time from a 1-based day number and a wall clock.
    pub fn from_day_clock(day: u64, hour: u32, minute: u32) -> Self {
        let day_index = day.saturating_sub(1);
        Self(day_index * MINUTES_PER_DAY as u64 + (hour * MINUTES_PER_HOUR + minute) as u64)
    }

    /// Raw minutes since the simulation began.
    pub fn minutes(self) -> u64 {
        self.0
    }

    /// The 1-based day this time falls in.
    pub fn day(self) -> u64 {
        self.0 / MINUTES_PER_DAY as u64 + 1
    }

    /// Minutes since midnight of the current day.
    pub fn minute_of_day(self) -> u32 {
        (self.0 % MINUTES_PER_DAY as u64) as u32
    }

    /// Midnight of the current day.
    pub fn start_of_day(self) -> Self {
        Self(self.0 - self.minute_of_day() as u64)
    }

    /// The absolute time of a clock offset within this time's day.
    pub fn at_offset(self, offset: u32) -> Self {
        Self(self.start_of_day().0 + offset as u64)
    }

    /// Returns this time advanced by the given number of minutes.
    pub fn plus_minutes(self, minutes: u64) -> Self {
        Self(self.0 + minutes)
    }

    /// Minutes elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn minutes_since(self, earlier: SimTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Hours elapsed since `earlier`, as a fraction.
    pub fn hours_since(self, earlier: SimTime) -> f64 {
        self.minutes_since(earlier) as f64 / MINUTES_PER_HOUR as f64
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day_{}.{}", self.day(), format_clock(self.minute_of_day()))
    }
}

impl FromStr for SimTime {
    type Err = ParseTimeError;

    /// Parses a time from a string like "day_3.14:05".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day_part, clock_part) = s
            .split_once('.')
            .ok_or_else(|| ParseTimeError::InvalidFormat(s.to_string()))?;

        let day = day_part
            .strip_prefix("day_")
            .ok_or_else(|| ParseTimeError::InvalidFormat(s.to_string()))?
            .parse::<u64>()
            .map_err(|_| ParseTimeError::InvalidDay(day_part.to_string()))?;
        if day == 0 {
            return Err(ParseTimeError::InvalidDay(day_part.to_string()));
        }

        let offset = parse_clock(clock_part)?;
        if offset >= MINUTES_PER_DAY {
            return Err(ParseTimeError::InvalidClock(clock_part.to_string()));
        }

        Ok(SimTime::from_day_clock(day, 0, 0).at_offset(offset))
    }
}

impl Serialize for SimTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Formats a clock offset (minutes since midnight) as "HH:MM".
pub fn format_clock(offset: u32) -> String {
    format!("{:02}:{:02}", offset / MINUTES_PER_HOUR, offset % MINUTES_PER_HOUR)
}

/// Parses "HH:MM" into minutes since midnight. "24:00" is accepted as the
/// end of the day.
pub fn parse_clock(s: &str) -> Result<u32, ParseTimeError> {
    let invalid = || ParseTimeError::InvalidClock(s.to_string());
    let (hours, minutes) = s.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if hours > MINUTES_PER_DAY / MINUTES_PER_HOUR || minutes >= MINUTES_PER_HOUR {
        return Err(invalid());
    }
    let offset = hours * MINUTES_PER_HOUR + minutes;
    if offset > MINUTES_PER_DAY {
        return Err(invalid());
    }
    Ok(offset)
}
