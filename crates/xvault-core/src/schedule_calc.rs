//! Next-run computation for cron and interval triggers.
//!
//! Schedules are stored with a tenant-local IANA timezone. We compute the
//! next fire time in that zone (so a `"0 2 * * *"` cron means 2am local,
//! not 2am UTC) and convert back to UTC for storage and comparison.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

use crate::error::ScheduleError;
use crate::model::schedule::Schedule;

/// Parse `schedule.timezone` as an IANA zone name.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidTimezone`] if the name is not recognized.
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    Tz::from_str(name).map_err(|_| ScheduleError::InvalidTimezone { tz: name.to_owned() })
}

/// Validate a 5-field cron expression without computing a next-run time.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidCron`] if the expression does not parse.
pub fn validate_cron(expr: &str) -> Result<(), ScheduleError> {
    parse_cron(expr).map(|_| ())
}

fn parse_cron(expr: &str) -> Result<CronSchedule, ScheduleError> {
    // The `cron` crate expects 6 or 7 fields (with leading seconds); the
    // spec's schedules are plain 5-field cron, so splice in `"0 "` for
    // seconds unless the caller already supplied more fields.
    let field_count = expr.split_whitespace().count();
    let normalized = if field_count == 5 {
        format!("0 {expr}")
    } else {
        expr.to_owned()
    };
    CronSchedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
        expr: expr.to_owned(),
        reason: e.to_string(),
    })
}

/// Compute the next fire time strictly after `after` (UTC), honoring the
/// schedule's trigger (cron or interval) and timezone.
///
/// For cron triggers, DST transitions are handled by `cron`'s underlying
/// chrono arithmetic in the tenant's local zone: a local time skipped by a
/// spring-forward is pushed to the next valid instant, and a local time
/// repeated by a fall-back fires once, at its first occurrence.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidTimezone`] or [`ScheduleError::InvalidCron`]
/// if the schedule's stored trigger fields are malformed, and
/// [`ScheduleError::InvalidTrigger`] if neither or both of `cron` /
/// `interval_minutes` are set.
pub fn next_run_after(schedule: &Schedule, after: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
    schedule.validate_trigger()?;

    if let Some(minutes) = schedule.interval_minutes {
        if minutes <= 0 {
            return Err(ScheduleError::InvalidTrigger);
        }
        return Ok(after + Duration::minutes(minutes));
    }

    let expr = schedule.cron.as_deref().ok_or(ScheduleError::InvalidTrigger)?;
    let tz = parse_timezone(&schedule.timezone)?;
    let cron_schedule = parse_cron(expr)?;

    let after_local = after.with_timezone(&tz);
    let next_local = cron_schedule.after(&after_local).next().ok_or_else(|| ScheduleError::InvalidCron {
        expr: expr.to_owned(),
        reason: "schedule produces no future occurrences".to_owned(),
    })?;

    Ok(next_local.with_timezone(&Utc))
}

/// Convenience wrapper: compute the next run from "now".
///
/// # Errors
///
/// See [`next_run_after`].
pub fn next_run_from_now(schedule: &Schedule) -> Result<DateTime<Utc>, ScheduleError> {
    next_run_after(schedule, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::retention::RetentionPolicy;
    use crate::model::schedule::ScheduleStatus;
    use chrono::TimeZone as _;

    fn base() -> Schedule {
        Schedule {
            id: "sch1".into(),
            tenant_id: "t1".into(),
            source_id: "s1".into(),
            cron: None,
            interval_minutes: None,
            timezone: "UTC".into(),
            status: ScheduleStatus::Enabled,
            retention_policy: RetentionPolicy::default(),
            last_run_at: None,
            next_run_at: Utc::now(),
        }
    }

    #[test]
    fn interval_trigger_advances_by_minutes() {
        let schedule = Schedule {
            interval_minutes: Some(60),
            ..base()
        };
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = next_run_after(&schedule, start).unwrap();
        assert_eq!(next, start + Duration::minutes(60));
    }

    #[test]
    fn cron_daily_at_2am_utc() {
        let schedule = Schedule {
            cron: Some("0 2 * * *".into()),
            ..base()
        };
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = next_run_after(&schedule, start).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 2, 0, 0).unwrap());
    }

    #[test]
    fn cron_honors_tenant_timezone() {
        // 2am in America/New_York (EST, UTC-5) on 2026-01-02 is 07:00 UTC.
        let schedule = Schedule {
            cron: Some("0 2 * * *".into()),
            timezone: "America/New_York".into(),
            ..base()
        };
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = next_run_after(&schedule, start).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 7, 0, 0).unwrap());
    }

    #[test]
    fn invalid_cron_expression_rejected() {
        assert!(validate_cron("not a cron").is_err());
        assert!(validate_cron("0 2 * * *").is_ok());
    }

    #[test]
    fn invalid_timezone_rejected() {
        let schedule = Schedule {
            cron: Some("0 2 * * *".into()),
            timezone: "Not/AZone".into(),
            ..base()
        };
        assert!(next_run_from_now(&schedule).is_err());
    }

    #[test]
    fn both_triggers_set_is_rejected() {
        let schedule = Schedule {
            cron: Some("0 2 * * *".into()),
            interval_minutes: Some(5),
            ..base()
        };
        assert!(next_run_from_now(&schedule).is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let schedule = Schedule {
            interval_minutes: Some(0),
            ..base()
        };
        assert!(next_run_from_now(&schedule).is_err());
    }
}
