//! Repeat-frequency grammar — ISO-8601 durations plus cron detection.
//!
//! Recognized: `PT<n>S`, `PT<n>M`, `PT<n>H`, `P<n>D`, `P<n>W`, `P<n>M`
//! (month ≈ 30 days). Any string containing whitespace is treated as a
//! cron expression; cron parsing is not implemented, so such actions are
//! detected but never fire.

use chrono::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("unparseable repeat_frequency {0:?}")]
    BadFrequency(String),
    #[error("unknown timezone {0:?}")]
    BadTimezone(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frequency {
    Interval(Duration),
    /// Detected but unsupported; never fires.
    Cron(String),
}

pub fn parse_frequency(raw: &str) -> Result<Frequency, ScheduleError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ScheduleError::BadFrequency(raw.to_string()));
    }
    if s.chars().any(char::is_whitespace) {
        return Ok(Frequency::Cron(s.to_string()));
    }

    let bad = || ScheduleError::BadFrequency(raw.to_string());

    let (body, time_designator) = match s.strip_prefix("PT") {
        Some(rest) => (rest, true),
        None => (s.strip_prefix('P').ok_or_else(bad)?, false),
    };
    if body.len() < 2 {
        return Err(bad());
    }
    let (digits, unit) = body.split_at(body.len() - 1);
    let n: i64 = digits.parse().map_err(|_| bad())?;
    if n < 0 {
        return Err(bad());
    }

    let duration = match (time_designator, unit) {
        (true, "S") => Duration::seconds(n),
        (true, "M") => Duration::minutes(n),
        (true, "H") => Duration::hours(n),
        (false, "D") => Duration::days(n),
        (false, "W") => Duration::weeks(n),
        // A calendar month approximated at 30 days.
        (false, "M") => Duration::days(n * 30),
        _ => return Err(bad()),
    };
    Ok(Frequency::Interval(duration))
}
