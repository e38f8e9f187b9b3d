//! ISO 8601 durations with fixed-length calendar units
//!
//! A [`Duration`] keeps the year/month/day/hour/minute/second components it
//! was written with, but compares and adds by total seconds using fixed
//! approximations (a year is 365 days, a month is 30 days). This is not a
//! calendar engine: leap years and month lengths are ignored.
//!
//! Values are immutable. `+` and `-` return new durations and subtraction
//! saturates at zero, so a duration is never negative. Addition saturates at
//! [`Duration::MAX`], the longest duration that fits the year component.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

pub const SECONDS_PER_MINUTE: u64 = 60;
pub const SECONDS_PER_HOUR: u64 = 3_600;
pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_MONTH: u64 = 2_592_000;
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Total seconds of [`Duration::MAX`]
pub const MAX_SECONDS: u64 = u32::MAX as u64 * SECONDS_PER_YEAR + (SECONDS_PER_YEAR - 1);

/// Why a duration specification was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("duration specification is empty")]
    Empty,

    #[error("'{spec}': duration must start with 'P'")]
    MissingDesignator { spec: String },

    #[error("'{spec}': duration has no components")]
    NoComponents { spec: String },

    #[error("'{spec}': unexpected character '{found}'")]
    UnexpectedChar { spec: String, found: char },

    #[error("'{spec}': component '{designator}' is missing its number")]
    MissingNumber { spec: String, designator: char },

    #[error("'{spec}': component '{designator}' is out of order or repeated")]
    OutOfOrder { spec: String, designator: char },

    #[error("'{spec}': weeks cannot be combined with days")]
    WeeksWithDays { spec: String },

    #[error("'{spec}': number is too large")]
    Overflow { spec: String },

    #[error("'{spec}': duration is longer than the maximum")]
    TooLong { spec: String },
}

/// A non-negative elapsed time
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Duration {
    years: u32,
    months: u32,
    days: u32,
    hours: u32,
    minutes: u32,
    seconds: u32,
}

impl Duration {
    pub const ZERO: Duration = Duration {
        years: 0,
        months: 0,
        days: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    /// Longest representable duration. Sums past it saturate here.
    pub const MAX: Duration = Duration {
        years: u32::MAX,
        months: 12,
        days: 4,
        hours: 23,
        minutes: 59,
        seconds: 59,
    };

    /// Parse a specification such as `PT30S`, `P1DT2H` or `P2W`.
    pub fn parse(spec: &str) -> Result<Self, DurationParseError> {
        parse_spec(spec)
    }

    /// Build a duration from a number of seconds, normalised into the
    /// largest fixed units that fit. Values above [`MAX_SECONDS`] give
    /// [`Duration::MAX`].
    pub fn from_secs(total: u64) -> Self {
        let total = total.min(MAX_SECONDS);
        let years = total / SECONDS_PER_YEAR;
        let rest = total % SECONDS_PER_YEAR;
        let months = rest / SECONDS_PER_MONTH;
        let rest = rest % SECONDS_PER_MONTH;
        let days = rest / SECONDS_PER_DAY;
        let rest = rest % SECONDS_PER_DAY;

        Self {
            years: years as u32,
            months: months as u32,
            days: days as u32,
            hours: (rest / SECONDS_PER_HOUR) as u32,
            minutes: ((rest % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE) as u32,
            seconds: (rest % SECONDS_PER_MINUTE) as u32,
        }
    }

    /// Elapsed whole seconds between two instants. Sub-second parts are
    /// truncated and a `later` that precedes `earlier` yields zero.
    pub fn between(earlier: chrono::DateTime<chrono::Utc>, later: chrono::DateTime<chrono::Utc>) -> Self {
        let secs = later.signed_duration_since(earlier).num_seconds();
        Self::from_secs(secs.max(0) as u64)
    }

    pub fn years(&self) -> u32 {
        self.years
    }

    pub fn months(&self) -> u32 {
        self.months
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Weighted sum of all components
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.years) * SECONDS_PER_YEAR
            + u64::from(self.months) * SECONDS_PER_MONTH
            + u64::from(self.days) * SECONDS_PER_DAY
            + u64::from(self.hours) * SECONDS_PER_HOUR
            + u64::from(self.minutes) * SECONDS_PER_MINUTE
            + u64::from(self.seconds)
    }

    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }

    /// Always false: subtraction saturates instead of going below zero.
    pub fn is_negative(&self) -> bool {
        false
    }

    pub fn shorter_than(&self, other: &Duration) -> bool {
        self.total_seconds() < other.total_seconds()
    }

    pub fn longer_than_or_equals(&self, other: &Duration) -> bool {
        self.total_seconds() >= other.total_seconds()
    }

    pub fn saturating_add(self, other: Duration) -> Duration {
        Self::from_secs(self.total_seconds().saturating_add(other.total_seconds()))
    }

    /// `self - other`, or zero when `other` is at least as long as `self`
    pub fn saturating_sub(self, other: Duration) -> Duration {
        if other.longer_than_or_equals(&self) {
            Duration::ZERO
        } else {
            Self::from_secs(self.total_seconds() - other.total_seconds())
        }
    }

}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        self.total_seconds() == other.total_seconds()
    }
}

impl Eq for Duration {}

impl Hash for Duration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.total_seconds().hash(state);
    }
}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Duration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_seconds().cmp(&other.total_seconds())
    }
}

impl std::ops::Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        self.saturating_add(rhs)
    }
}

impl std::ops::Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }

        f.write_str("P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }

        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            f.write_str("T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0 {
                write!(f, "{}S", self.seconds)?;
            }
        }

        Ok(())
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_spec(s)
    }
}

impl TryFrom<String> for Duration {
    type Error = DurationParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse_spec(&s)
    }
}

impl From<Duration> for String {
    fn from(d: Duration) -> Self {
        d.to_string()
    }
}

// Designators in the order they may appear. Index positions enforce ordering.
const DATE_DESIGNATORS: [char; 4] = ['Y', 'M', 'W', 'D'];
const TIME_DESIGNATORS: [char; 3] = ['H', 'M', 'S'];

fn parse_spec(spec: &str) -> Result<Duration, DurationParseError> {
    if spec.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let body = spec
        .strip_prefix('P')
        .ok_or_else(|| DurationParseError::MissingDesignator {
            spec: spec.to_string(),
        })?;

    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(DurationParseError::NoComponents {
                    spec: spec.to_string(),
                });
            }
            (date, Some(time))
        }
        None => (body, None),
    };

    let date = parse_components(spec, date_part, &DATE_DESIGNATORS)?;
    let time = match time_part {
        Some(part) => parse_components(spec, part, &TIME_DESIGNATORS)?,
        None => Vec::new(),
    };

    if date.is_empty() && time.is_empty() {
        return Err(DurationParseError::NoComponents {
            spec: spec.to_string(),
        });
    }

    let mut duration = Duration::ZERO;
    let mut weeks = None;
    for (designator, value) in date {
        match designator {
            'Y' => duration.years = value,
            'M' => duration.months = value,
            'W' => weeks = Some(value),
            _ => duration.days = value,
        }
    }
    if let Some(weeks) = weeks {
        if duration.days > 0 {
            return Err(DurationParseError::WeeksWithDays {
                spec: spec.to_string(),
            });
        }
        duration.days = weeks
            .checked_mul(7)
            .ok_or_else(|| DurationParseError::Overflow {
                spec: spec.to_string(),
            })?;
    }
    for (designator, value) in time {
        match designator {
            'H' => duration.hours = value,
            'M' => duration.minutes = value,
            _ => duration.seconds = value,
        }
    }

    if duration.total_seconds() > MAX_SECONDS {
        return Err(DurationParseError::TooLong {
            spec: spec.to_string(),
        });
    }

    Ok(duration)
}

/// Split `part` into `(designator, number)` pairs, enforcing the order given
/// by `allowed`.
fn parse_components(
    spec: &str,
    part: &str,
    allowed: &[char],
) -> Result<Vec<(char, u32)>, DurationParseError> {
    let mut components = Vec::new();
    let mut digits = String::new();
    let mut next_allowed = 0;

    for c in part.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let position = allowed
            .iter()
            .position(|&d| d == c)
            .ok_or_else(|| DurationParseError::UnexpectedChar {
                spec: spec.to_string(),
                found: c,
            })?;

        if digits.is_empty() {
            return Err(DurationParseError::MissingNumber {
                spec: spec.to_string(),
                designator: c,
            });
        }
        if position < next_allowed {
            return Err(DurationParseError::OutOfOrder {
                spec: spec.to_string(),
                designator: c,
            });
        }

        let value: u32 = digits.parse().map_err(|_| DurationParseError::Overflow {
            spec: spec.to_string(),
        })?;
        components.push((c, value));
        digits.clear();
        next_allowed = position + 1;
    }

    if !digits.is_empty() {
        // Trailing number without a designator
        return Err(DurationParseError::NoComponents {
            spec: spec.to_string(),
        });
    }

    Ok(components)
}
