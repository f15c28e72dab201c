//! Duration expressions such as `"1h"`, `"30m"` or `"2.5s"`.
//!
//! An expression is a non-negative decimal number followed by a single unit letter
//! (`h`, `m` or `s`, case-insensitive). Nothing else is accepted: no whitespace, no
//! compound forms like `"1h30m"`, no missing unit.

use std::{fmt, str::FromStr, time::Duration};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+(?:\.\d+)?)([hms])$").expect("duration pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeUnit {
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Hours => 3600.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Seconds => 1.0,
        }
    }

    fn suffix(self) -> char {
        match self {
            TimeUnit::Hours => 'h',
            TimeUnit::Minutes => 'm',
            TimeUnit::Seconds => 's',
        }
    }
}

/// A parsed duration expression.
///
/// Serializes as its textual form so stage plans can carry `"30s"` directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DurationExpr {
    value: f64,
    unit: TimeUnit,
}

impl DurationExpr {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// The expression converted to hours: `h` as is, `m / 60`, `s / 3600`.
    pub fn hours(&self) -> f64 {
        match self.unit {
            TimeUnit::Hours => self.value,
            TimeUnit::Minutes => self.value / 60.0,
            TimeUnit::Seconds => self.value / 3600.0,
        }
    }

    pub fn as_duration(&self) -> Duration {
        // Range is checked when parsing.
        Duration::from_secs_f64(self.value * self.unit.seconds())
    }
}

impl FromStr for DurationExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::DurationFormat {
            input: s.to_string(),
        };
        let caps = DURATION_PATTERN.captures(s).ok_or_else(invalid)?;

        let value: f64 = caps[1].parse().map_err(|_| invalid())?;
        let unit = match caps[2].to_ascii_lowercase().as_str() {
            "h" => TimeUnit::Hours,
            "m" => TimeUnit::Minutes,
            "s" => TimeUnit::Seconds,
            _ => return Err(invalid()),
        };

        // Huge values parse as f64 but cannot be represented as a `Duration`.
        Duration::try_from_secs_f64(value * unit.seconds()).map_err(|_| invalid())?;

        Ok(Self { value, unit })
    }
}

impl TryFrom<String> for DurationExpr {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DurationExpr> for String {
    fn from(value: DurationExpr) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DurationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// Parse a duration expression into hours.
///
/// ```
/// assert_eq!(volley::duration::parse_hours("30m").unwrap(), 0.5);
/// assert!(volley::duration::parse_hours("1x").is_err());
/// ```
pub fn parse_hours(text: &str) -> Result<f64> {
    text.parse::<DurationExpr>().map(|d| d.hours())
}

/// Parse a duration expression into a [`Duration`].
pub fn parse(text: &str) -> Result<Duration> {
    text.parse::<DurationExpr>().map(|d| d.as_duration())
}
