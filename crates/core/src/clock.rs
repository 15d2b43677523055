use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, Utc};
use thiserror::Error;

/// Layout of the timestamp cell written for every stored entry.
pub const ENTRY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timezone used to render entry timestamps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimestampZone {
    /// Host system local time.
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported timezone `{0}` (expected local|utc|+HH:MM|-HH:MM)")]
pub struct TimestampZoneParseError(pub String);

impl FromStr for TimestampZone {
    type Err = TimestampZoneParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "local" => Ok(Self::Local),
            "utc" | "z" => Ok(Self::Utc),
            other => parse_offset(other)
                .map(Self::Fixed)
                .ok_or_else(|| TimestampZoneParseError(value.to_owned())),
        }
    }
}

impl fmt::Display for TimestampZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Utc => f.write_str("utc"),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl TimestampZone {
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        match self {
            Self::Local => instant.with_timezone(&Local).format(ENTRY_TIMESTAMP_FORMAT).to_string(),
            Self::Utc => instant.format(ENTRY_TIMESTAMP_FORMAT).to_string(),
            Self::Fixed(offset) => {
                instant.with_timezone(offset).format(ENTRY_TIMESTAMP_FORMAT).to_string()
            }
        }
    }
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours = hours.parse::<i32>().ok()?;
    let minutes = minutes.parse::<i32>().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
