//! Retention policy normalization and evaluation.
//!
//! Given a policy and a source's completed-snapshot history, computes the
//! `{keep, delete}` partition. Pure and deterministic, no I/O, so it is
//! exercised directly by tests without a database.

use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::HashSet;

use crate::model::retention::{RetentionMode, RetentionPolicy};

/// Minimal view of a snapshot the evaluator needs. `xvault-storage` maps its
/// `Snapshot` rows into this before calling [`evaluate`].
#[derive(Debug, Clone)]
pub struct SnapshotRef {
    pub id: String,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a retention evaluation.
#[derive(Debug, Clone, Default)]
pub struct RetentionResult {
    pub keep: Vec<SnapshotRef>,
    pub delete: Vec<SnapshotRef>,
}

impl RetentionResult {
    /// Human-readable counts, as required by spec.md §4.3 ("summary string").
    #[must_use]
    pub fn summary(&self) -> String {
        format!("keep={} delete={}", self.keep.len(), self.delete.len())
    }
}

/// The policy applied when no recognized rule remains after normalization.
#[must_use]
pub fn default_policy() -> RetentionPolicy {
    RetentionPolicy {
        mode: Some(RetentionMode::LatestN),
        keep_last_n: Some(7),
        min_age_hours: Some(24),
        ..Default::default()
    }
}

/// Fold `mode` + `keep_within_duration` into `max_age_days`-equivalent
/// protection, parse duration units, and fall back to [`default_policy`] if
/// nothing recognized remains.
///
/// Unit parse: `d/day/days`, `h/hour/hours` (ceiling-divided into days),
/// `w/weeks` (×7), `m/months` (×30, approximate). Unknown or non-positive
/// durations are ignored.
#[must_use]
pub fn normalize(policy: &RetentionPolicy) -> RetentionPolicy {
    let mut out = policy.clone();

    if matches!(out.mode, Some(RetentionMode::WithinDuration)) {
        if let Some(ref duration_str) = out.keep_within_duration {
            if let Some(days) = parse_duration_days(duration_str) {
                // Fold into max_age_days semantics by protecting everything
                // within the window via a synthetic min window: anything
                // newer than `now - days` is "within duration" and thus
                // protected. We model that protection via keep_last_n's
                // sibling path in `evaluate`, so here we just normalize the
                // duration into `keep_within_duration_days` carried on
                // `max_age_days` is wrong (that field means force-delete).
                // The within_duration rule is evaluated directly from
                // `keep_within_duration`, so we only validate/normalize the
                // string form here and leave max_age_days untouched.
                out.keep_within_duration = Some(format!("{days}d"));
            } else {
                out.keep_within_duration = None;
            }
        }
    }

    let has_any_rule = matches!(out.mode, Some(RetentionMode::All))
        || out.keep_last_n.is_some()
        || out.keep_within_duration.is_some()
        || out.min_age_hours.is_some()
        || out.max_age_days.is_some()
        || out.keep_daily.is_some()
        || out.keep_weekly.is_some()
        || out.keep_monthly.is_some();

    if !has_any_rule {
        return default_policy();
    }

    out
}

/// Parse a duration string (`"30d"`, `"48h"`, `"2w"`, `"3m"`) into a whole
/// number of days. Hours are ceiling-divided. Returns `None` for unknown
/// units or non-positive magnitudes.
#[must_use]
pub fn parse_duration_days(s: &str) -> Option<i64> {
    let s = s.trim();
    let split_at = s.find(|c: char| !c.is_ascii_digit())?;
    let (num_str, unit) = s.split_at(split_at);
    let num: i64 = num_str.parse().ok()?;
    if num <= 0 {
        return None;
    }

    match unit.to_ascii_lowercase().as_str() {
        "d" | "day" | "days" => Some(num),
        "h" | "hour" | "hours" => Some((num + 23) / 24),
        "w" | "week" | "weeks" => Some(num * 7),
        "m" | "month" | "months" => Some(num * 30),
        _ => None,
    }
}

/// Evaluate a retention policy over a source's completed-snapshot history.
///
/// `snapshots` must be ordered by `created_at` ascending (oldest first), per
/// spec.md §4.3. The policy is normalized internally, so callers may pass
/// raw/unfolded policies straight from storage.
#[must_use]
pub fn evaluate(policy: &RetentionPolicy, snapshots: &[SnapshotRef]) -> RetentionResult {
    let policy = normalize(policy);
    let now = Utc::now();

    if matches!(policy.mode, Some(RetentionMode::All)) {
        return RetentionResult {
            keep: snapshots.to_vec(),
            delete: Vec::new(),
        };
    }

    let mut protected: HashSet<String> = HashSet::new();

    // mode=latest_n / keep_last_n: the K most recent snapshots.
    if let Some(k) = policy.keep_last_n {
        for s in snapshots.iter().rev().take(k as usize) {
            protected.insert(s.id.clone());
        }
    }

    // mode=within_duration: created_at >= now - D.
    if let Some(ref dur) = policy.keep_within_duration {
        if let Some(days) = parse_duration_days(dur) {
            let cutoff = now - Duration::days(days);
            for s in snapshots {
                if s.created_at >= cutoff {
                    protected.insert(s.id.clone());
                }
            }
        }
    }

    // min_age_hours: anything younger than H hours cannot be deleted yet.
    if let Some(h) = policy.min_age_hours {
        let cutoff = now - Duration::hours(h);
        for s in snapshots {
            if s.created_at > cutoff {
                protected.insert(s.id.clone());
            }
        }
    }

    // keep_daily / keep_weekly / keep_monthly: newest snapshot per bucket,
    // for the last D/W/M buckets (UTC calendar).
    if let Some(d) = policy.keep_daily {
        protect_newest_per_bucket(snapshots, &mut protected, d, |t| (t.year(), t.ordinal()));
    }
    if let Some(w) = policy.keep_weekly {
        protect_newest_per_bucket(snapshots, &mut protected, w, |t| {
            let iso = t.iso_week();
            (iso.year(), iso.week())
        });
    }
    if let Some(m) = policy.keep_monthly {
        protect_newest_per_bucket(snapshots, &mut protected, m, |t| (t.year(), t.month()));
    }

    let max_age_time = policy.max_age_days.map(|days| now - Duration::days(days));

    let mut result = RetentionResult::default();
    for s in snapshots {
        let force_delete = max_age_time.is_some_and(|cutoff| s.created_at < cutoff);
        if force_delete {
            result.delete.push(s.clone());
        } else if protected.contains(&s.id) {
            result.keep.push(s.clone());
        } else {
            result.delete.push(s.clone());
        }
    }
    result
}

/// Protect the newest snapshot in each of the last `bucket_count` distinct
/// buckets (as computed by `bucket_key`), scanning snapshots newest-first.
fn protect_newest_per_bucket(
    snapshots: &[SnapshotRef],
    protected: &mut HashSet<String>,
    bucket_count: u32,
    bucket_key: impl Fn(DateTime<Utc>) -> (i32, u32),
) {
    let mut seen_buckets: HashSet<(i32, u32)> = HashSet::new();
    for s in snapshots.iter().rev() {
        if seen_buckets.len() >= bucket_count as usize {
            break;
        }
        let key = bucket_key(s.created_at);
        if seen_buckets.insert(key) {
            protected.insert(s.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: &str, days_ago: i64) -> SnapshotRef {
        SnapshotRef {
            id: id.to_owned(),
            worker_id: Some("w-1".to_owned()),
            created_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration_days("30d"), Some(30));
        assert_eq!(parse_duration_days("48h"), Some(2));
        assert_eq!(parse_duration_days("25h"), Some(2));
        assert_eq!(parse_duration_days("2w"), Some(14));
        assert_eq!(parse_duration_days("3m"), Some(90));
        assert_eq!(parse_duration_days("0d"), None);
        assert_eq!(parse_duration_days("-5d"), None);
        assert_eq!(parse_duration_days("5y"), None);
    }

    #[test]
    fn mode_all_protects_everything() {
        let policy = RetentionPolicy {
            mode: Some(RetentionMode::All),
            ..Default::default()
        };
        let snaps = vec![snap("a", 1), snap("b", 100)];
        let result = evaluate(&policy, &snaps);
        assert_eq!(result.keep.len(), 2);
        assert!(result.delete.is_empty());
    }

    /// S3, keep_last_n=3 over 10 daily snapshots aged 1d..10d: 7 deletes.
    #[test]
    fn s3_latest_n_retention() {
        let snaps: Vec<SnapshotRef> = (1..=10).rev().map(|d| snap(&format!("s{d}"), d)).collect();
        let policy = RetentionPolicy {
            mode: Some(RetentionMode::LatestN),
            keep_last_n: Some(3),
            min_age_hours: Some(24),
            ..Default::default()
        };
        let result = evaluate(&policy, &snaps);
        assert_eq!(result.keep.len(), 3);
        assert_eq!(result.delete.len(), 7);
        let kept_ids: HashSet<_> = result.keep.iter().map(|s| s.id.clone()).collect();
        assert!(kept_ids.contains("s1"));
        assert!(kept_ids.contains("s2"));
        assert!(kept_ids.contains("s3"));
    }

    /// S4, keep_last_n=5, max_age_days=30 over snapshots aged 5d/40d/100d:
    /// only the 5d snapshot survives.
    #[test]
    fn s4_max_age_overrides_keep_last_n() {
        let snaps = vec![snap("old100", 100), snap("old40", 40), snap("recent5", 5)];
        let policy = RetentionPolicy {
            keep_last_n: Some(5),
            max_age_days: Some(30),
            ..Default::default()
        };
        let result = evaluate(&policy, &snaps);
        let kept_ids: HashSet<_> = result.keep.iter().map(|s| s.id.clone()).collect();
        let deleted_ids: HashSet<_> = result.delete.iter().map(|s| s.id.clone()).collect();
        assert_eq!(kept_ids, HashSet::from(["recent5".to_owned()]));
        assert_eq!(deleted_ids, HashSet::from(["old40".to_owned(), "old100".to_owned()]));
    }

    /// Property 6, force-delete precedence over keep_daily too.
    #[test]
    fn force_delete_overrides_keep_daily() {
        let snaps = vec![snap("ancient", 400)];
        let policy = RetentionPolicy {
            keep_daily: Some(30),
            max_age_days: Some(30),
            ..Default::default()
        };
        let result = evaluate(&policy, &snaps);
        assert_eq!(result.delete.len(), 1);
        assert!(result.keep.is_empty());
    }

    #[test]
    fn empty_policy_falls_back_to_default() {
        let policy = RetentionPolicy::default();
        let normalized = normalize(&policy);
        assert_eq!(normalized.keep_last_n, Some(7));
        assert_eq!(normalized.min_age_hours, Some(24));
    }

    /// Property 5, running retention twice on the same state is idempotent.
    #[test]
    fn idempotent_across_repeated_runs() {
        let snaps: Vec<SnapshotRef> = (1..=10).rev().map(|d| snap(&format!("s{d}"), d)).collect();
        let policy = RetentionPolicy {
            keep_last_n: Some(3),
            min_age_hours: Some(24),
            ..Default::default()
        };
        let r1 = evaluate(&policy, &snaps);
        let r2 = evaluate(&policy, &snaps);
        let ids = |r: &RetentionResult| -> HashSet<String> { r.keep.iter().map(|s| s.id.clone()).collect() };
        assert_eq!(ids(&r1), ids(&r2));
    }

    #[test]
    fn min_age_hours_protects_young_snapshots() {
        let snaps = vec![snap("young", 0)];
        let policy = RetentionPolicy {
            min_age_hours: Some(24),
            ..Default::default()
        };
        let result = evaluate(&policy, &snaps);
        assert_eq!(result.keep.len(), 1);
    }

    #[test]
    fn summary_reports_counts() {
        let snaps = vec![snap("a", 1), snap("b", 100)];
        let policy = RetentionPolicy {
            mode: Some(RetentionMode::All),
            ..Default::default()
        };
        let result = evaluate(&policy, &snaps);
        assert_eq!(result.summary(), "keep=2 delete=0");
    }
}
