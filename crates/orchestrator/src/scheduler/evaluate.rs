//! Fire decision — is a scheduled action due at a given instant?
//!
//! Date-window and repeat-count checks run in UTC; calendar constraints
//! (`by_day`, `by_month`, `by_month_day`, `except_dates`) run in the
//! action's own timezone.

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

use super::frequency::{parse_frequency, Frequency, ScheduleError};
use crate::model::ScheduledAction;

pub fn should_execute(
    action: &ScheduledAction,
    now: DateTime<Utc>,
) -> Result<bool, ScheduleError> {
    let schedule = &action.schedule;

    if let Some(start) = schedule.start_date {
        if now < start {
            return Ok(false);
        }
    }
    if let Some(end) = schedule.end_date {
        if now > end {
            return Ok(false);
        }
    }
    // Zero means exhausted. The count is never decremented on fire; a
    // writer that wants a bounded action manages the count itself.
    if let Some(count) = schedule.repeat_count {
        if count <= 0 {
            return Ok(false);
        }
    }

    let tz = resolve_timezone(&schedule.timezone)?;
    let local = now.with_timezone(&tz);

    let today = local.format("%Y-%m-%d").to_string();
    if schedule.except_dates.iter().any(|d| d.starts_with(&today)) {
        return Ok(false);
    }

    if let Some(days) = &schedule.by_day {
        let weekday = local.format("%a").to_string();
        if !days.iter().any(|d| d.eq_ignore_ascii_case(&weekday)) {
            return Ok(false);
        }
    }
    if let Some(months) = &schedule.by_month {
        if !months.contains(&local.month()) {
            return Ok(false);
        }
    }
    if let Some(month_days) = &schedule.by_month_day {
        if !month_days.contains(&local.day()) {
            return Ok(false);
        }
    }

    // Never fired: due immediately (the start_date gate already passed).
    let Some(last_fired) = action.start_time else {
        return Ok(true);
    };

    match parse_frequency(&schedule.repeat_frequency)? {
        Frequency::Interval(interval) => Ok(now >= last_fired + interval),
        Frequency::Cron(expr) => {
            debug!(action = %action.id, cron = %expr, "Cron schedules are not evaluated; not firing");
            Ok(false)
        }
    }
}

fn resolve_timezone(name: &str) -> Result<Tz, ScheduleError> {
    if name.is_empty() {
        return Ok(chrono_tz::UTC);
    }
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::BadTimezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionType, ScheduledAction};
    use chrono::{TimeZone, Timelike};

    fn action(frequency: &str) -> ScheduledAction {
        let mut a = ScheduledAction::new("probe", ActionType::Check);
        a.enabled = true;
        a.schedule.repeat_frequency = frequency.to_string();
        a
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_never_fired_fires_immediately() {
        let a = action("PT1M");
        assert!(should_execute(&a, Utc::now()).unwrap());
    }

    #[test]
    fn test_interval_gates_refiring() {
        let mut a = action("PT1M");
        let first = at("2026-03-01T10:00:00Z");
        a.start_time = Some(first);

        // 30 seconds later: not due.
        assert!(!should_execute(&a, at("2026-03-01T10:00:30Z")).unwrap());
        // Exactly one minute later: due.
        assert!(should_execute(&a, at("2026-03-01T10:01:00Z")).unwrap());
    }

    #[test]
    fn test_start_and_end_dates() {
        let mut a = action("PT1M");
        a.schedule.start_date = Some(at("2026-03-02T00:00:00Z"));
        assert!(!should_execute(&a, at("2026-03-01T00:00:00Z")).unwrap());
        assert!(should_execute(&a, at("2026-03-02T00:00:01Z")).unwrap());

        a.schedule.end_date = Some(at("2026-03-03T00:00:00Z"));
        assert!(!should_execute(&a, at("2026-03-04T00:00:00Z")).unwrap());
    }

    #[test]
    fn test_repeat_count_zero_disables() {
        let mut a = action("PT1M");
        a.schedule.repeat_count = Some(0);
        assert!(!should_execute(&a, Utc::now()).unwrap());
        a.schedule.repeat_count = Some(3);
        assert!(should_execute(&a, Utc::now()).unwrap());
    }

    #[test]
    fn test_except_date_prefix_match() {
        let mut a = action("PT1M");
        a.schedule.except_dates = vec!["2026-03-01T00:00:00Z".to_string()];
        assert!(!should_execute(&a, at("2026-03-01T15:00:00Z")).unwrap());
        assert!(should_execute(&a, at("2026-03-02T15:00:00Z")).unwrap());
    }

    #[test]
    fn test_by_day_in_action_timezone() {
        let mut a = action("PT1M");
        a.schedule.timezone = "Asia/Tokyo".to_string();
        a.schedule.by_day = Some(vec!["Sat".to_string()]);
        // 2026-03-06 23:00 UTC is already Saturday the 7th in Tokyo.
        assert!(should_execute(&a, at("2026-03-06T23:00:00Z")).unwrap());
        // But still Friday in UTC terms earlier that day.
        assert!(!should_execute(&a, at("2026-03-06T10:00:00Z")).unwrap());
    }

    #[test]
    fn test_by_month_and_month_day() {
        let mut a = action("PT1M");
        a.schedule.by_month = Some(vec![3]);
        a.schedule.by_month_day = Some(vec![15]);
        assert!(should_execute(&a, at("2026-03-15T09:00:00Z")).unwrap());
        assert!(!should_execute(&a, at("2026-03-14T09:00:00Z")).unwrap());
        assert!(!should_execute(&a, at("2026-04-15T09:00:00Z")).unwrap());
    }

    #[test]
    fn test_cron_detected_but_never_fires() {
        let mut a = action("0 3 * * *");
        a.start_time = Some(at("2026-03-01T03:00:00Z"));
        assert!(!should_execute(&a, at("2026-03-02T03:00:00Z")).unwrap());
    }

    #[test]
    fn test_bad_frequency_surfaces_parse_error() {
        let mut a = action("every-day");
        a.start_time = Some(Utc::now());
        assert!(should_execute(&a, Utc::now()).is_err());
    }

    #[test]
    fn test_bad_timezone_surfaces_error() {
        let mut a = action("PT1M");
        a.schedule.timezone = "Mars/Olympus".to_string();
        assert!(matches!(
            should_execute(&a, Utc::now()),
            Err(ScheduleError::BadTimezone(_))
        ));
    }

    #[test]
    fn test_timezone_yields_correct_local_date_for_except() {
        let mut a = action("PT1M");
        a.schedule.timezone = "America/Los_Angeles".to_string();
        // 2026-03-02 02:00 UTC is still 2026-03-01 in Los Angeles.
        a.schedule.except_dates = vec!["2026-03-01".to_string()];
        assert!(!should_execute(&a, at("2026-03-02T02:00:00Z")).unwrap());
    }

    #[test]
    fn test_resolve_timezone_default_utc() {
        assert_eq!(resolve_timezone("").unwrap(), chrono_tz::UTC);
        let tz = resolve_timezone("Europe/Berlin").unwrap();
        let local = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap().with_timezone(&tz);
        assert_eq!(local.hour(), 14);
    }
}
