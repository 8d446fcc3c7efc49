//! Retention policy type. Normalization and evaluation live in
//! [`crate::retention`]; this module only defines the wire shape.

use serde::{Deserialize, Serialize};

/// Retention rule mode. `mode` is required in the frontend form but every
/// other field is optional and additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionMode {
    All,
    LatestN,
    WithinDuration,
}

/// A retention policy attached to a schedule. Fields combine: every rule
/// present contributes to the protected set, except `max_age_days` which
/// force-deletes regardless of protection (see `crate::retention`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetentionPolicy {
    pub mode: Option<RetentionMode>,
    pub keep_last_n: Option<u32>,
    /// Duration string like `"30d"`, `"48h"`, `"2w"`, `"3m"`.
    pub keep_within_duration: Option<String>,
    pub min_age_hours: Option<i64>,
    pub max_age_days: Option<i64>,
    pub keep_daily: Option<u32>,
    pub keep_weekly: Option<u32>,
    pub keep_monthly: Option<u32>,
}
