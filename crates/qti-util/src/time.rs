//! Time sources for item sessions
//!
//! Sessions never sample the wall clock directly. They ask a [`Clock`],
//! which is either the [`SystemClock`] or a [`ManualClock`] that tests and
//! replay tools move by hand.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `QTI_MOCK_TIME` environment variable can be set
//! to override the system time seen by [`SystemClock`]. The mocked time
//! advances at the same rate as real time.
//!
//! Format: `YYYY-MM-DD HH:MM:SS`, interpreted as UTC (e.g., `2014-07-14 13:00:00`)
//!
//! Example:
//! ```bash
//! QTI_MOCK_TIME="2014-07-14 13:00:00" qti-session status --candidate c1 --item Q01
//! ```

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex, OnceLock};

use crate::QtiError;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "QTI_MOCK_TIME";

/// Format accepted by [`MOCK_TIME_ENV_VAR`] and [`parse_timestamp`]
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
static MOCK_TIME_OFFSET: OnceLock<Option<TimeDelta>> = OnceLock::new();

/// Initialize the mock time offset based on the environment variable.
/// Returns the offset between mock time and real time at process start.
#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Utc::now()
fn get_mock_time_offset() -> Option<TimeDelta> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match mock_offset(&mock_time_str, Utc::now()) {
                    Ok(offset) => {
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    Err(e) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            error = %e,
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Offset that moves `real_now` to the instant written in `mock_time`.
#[cfg_attr(not(debug_assertions), allow(dead_code))]
fn mock_offset(mock_time: &str, real_now: DateTime<Utc>) -> crate::Result<TimeDelta> {
    parse_timestamp(mock_time).map(|mock_dt| mock_dt.signed_duration_since(real_now))
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current UTC time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp as UTC.
pub fn parse_timestamp(s: &str) -> crate::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| QtiError::timestamp(s, TIMESTAMP_FORMAT))
}

/// Format an instant for display with full date and time.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock (with debug-build mock support)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one handle
/// while the session owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Set the clock to a specific instant
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = instant;
    }

    /// Move the clock forward by whole seconds
    pub fn advance_secs(&self, secs: i64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += TimeDelta::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn test_parse_timestamp() {
        let dt = parse_timestamp("2014-07-14 13:00:03").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2014, 7, 14, 13, 0, 3).unwrap());
    }

    #[test]
    fn test_parse_timestamp_invalid_formats() {
        let invalid_formats = [
            "2014-07-14",
            "13:00:00",
            "2014/07/14 13:00:00",
            "2014-07-14T13:00:00",
            "",
            "not a date",
        ];

        for format_str in &invalid_formats {
            let result = parse_timestamp(format_str);
            assert!(
                matches!(result, Err(QtiError::InvalidTimestamp { .. })),
                "Expected '{}' to fail parsing",
                format_str
            );
        }
    }

    #[test]
    fn test_format_timestamp() {
        let dt = Utc.with_ymd_and_hms(2014, 7, 14, 13, 0, 45).unwrap();
        assert_eq!(format_timestamp(&dt), "2014-07-14 13:00:45");
    }

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let start = Utc.with_ymd_and_hms(2014, 7, 14, 13, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let handle = clock.clone();

        handle.advance_secs(17);
        assert_eq!(clock.now(), start + TimeDelta::seconds(17));

        handle.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_system_clock_returns_time() {
        let t = SystemClock.now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }

    #[test]
    fn test_mock_offset_shifts_real_time() {
        let real_now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let offset = mock_offset("2014-07-14 13:00:00", real_now).unwrap();

        assert!(offset < TimeDelta::zero());
        assert_eq!(
            real_now + offset,
            Utc.with_ymd_and_hms(2014, 7, 14, 13, 0, 0).unwrap()
        );

        let later = real_now + TimeDelta::seconds(90);
        assert_eq!(
            later + offset,
            Utc.with_ymd_and_hms(2014, 7, 14, 13, 1, 30).unwrap()
        );
    }

    #[test]
    fn test_mock_offset_rejects_bad_format() {
        let real_now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        assert!(matches!(
            mock_offset("2014-07-14T13:00:00Z", real_now),
            Err(QtiError::InvalidTimestamp { .. })
        ));
    }
}
