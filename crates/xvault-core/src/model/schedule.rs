//! Schedule domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::retention::RetentionPolicy;

/// Lifecycle status of a [`Schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Enabled,
    Disabled,
}

/// Exactly one of `cron` or `interval_minutes` is set; enforced by
/// [`crate::error::ScheduleError::InvalidTrigger`] at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub tenant_id: String,
    pub source_id: String,
    pub cron: Option<String>,
    pub interval_minutes: Option<i64>,
    /// IANA timezone name (e.g. `"America/New_York"`).
    pub timezone: String,
    pub status: ScheduleStatus,
    pub retention_policy: RetentionPolicy,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
}

impl Schedule {
    /// Validate the "exactly one of cron or interval" invariant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ScheduleError::InvalidTrigger`] if both or
    /// neither are set.
    pub fn validate_trigger(&self) -> Result<(), crate::error::ScheduleError> {
        match (&self.cron, self.interval_minutes) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(crate::error::ScheduleError::InvalidTrigger),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(cron: Option<&str>, interval: Option<i64>) -> Schedule {
        Schedule {
            id: "sch1".into(),
            tenant_id: "t1".into(),
            source_id: "s1".into(),
            cron: cron.map(str::to_owned),
            interval_minutes: interval,
            timezone: "UTC".into(),
            status: ScheduleStatus::Enabled,
            retention_policy: RetentionPolicy::default(),
            last_run_at: None,
            next_run_at: Utc::now(),
        }
    }

    #[test]
    fn exactly_one_trigger_required() {
        assert!(base(Some("0 2 * * *"), None).validate_trigger().is_ok());
        assert!(base(None, Some(60)).validate_trigger().is_ok());
        assert!(base(Some("0 2 * * *"), Some(60)).validate_trigger().is_err());
        assert!(base(None, None).validate_trigger().is_err());
    }
}
