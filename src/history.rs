//! In-memory History Store
//!
//! One chronological log of [`StoredCheck`]s per target. The
//! [`StorageActor`](crate::actors::storage::StorageActor) owns the only
//! instance and mirrors every write to the durable backend.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::check::CheckOutcome;

/// Persisted projection of a [`CheckOutcome`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCheck {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
    pub ssl_days_remaining: Option<i64>,
}

impl From<&CheckOutcome> for StoredCheck {
    fn from(outcome: &CheckOutcome) -> Self {
        Self {
            timestamp: outcome.timestamp,
            success: outcome.success,
            status_code: outcome.status_code,
            response_time_ms: outcome.response_time_ms,
            error: outcome.error.clone(),
            ssl_days_remaining: outcome.ssl.as_ref().map(|ssl| ssl.days_remaining),
        }
    }
}

/// One fixed one-hour window
///
/// `avg_response_ms` and `uptime_percent` are `None` for windows without
/// checks; an empty hour is not a 0% hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub checks: usize,
    pub avg_response_ms: Option<f64>,
    pub uptime_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeStats {
    pub total_checks: usize,
    pub successful_checks: usize,
    pub uptime_percentage: Option<f64>,
    pub avg_response_time_ms: Option<f64>,
}

/// Oldest timestamp a `retention_days` window ending at `now` keeps
///
/// A window reaching past the earliest representable time keeps everything.
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(retention_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Default, Clone)]
pub struct HistoryLog {
    logs: HashMap<String, VecDeque<StoredCheck>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted checks in any order
    pub fn from_checks(checks: impl IntoIterator<Item = (String, StoredCheck)>) -> Self {
        let mut grouped: HashMap<String, Vec<StoredCheck>> = HashMap::new();
        for (target, check) in checks {
            grouped.entry(target).or_default().push(check);
        }

        let logs = grouped
            .into_iter()
            .map(|(target, mut checks)| {
                checks.sort_by_key(|check| check.timestamp);
                (target, checks.into())
            })
            .collect();
        Self { logs }
    }

    pub fn record(&mut self, target: &str, check: StoredCheck) {
        let log = self.logs.entry(target.to_string()).or_default();
        // cycles of one target never overlap, so this is almost always a push
        let position = log.partition_point(|existing| existing.timestamp <= check.timestamp);
        log.insert(position, check);
    }

    /// Drop entries strictly older than `cutoff`; an entry exactly at the
    /// cutoff is kept. Targets left without entries disappear.
    pub fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.logs.retain(|_, log| {
            while log.front().is_some_and(|check| check.timestamp < cutoff) {
                log.pop_front();
                removed += 1;
            }
            !log.is_empty()
        });
        removed
    }

    /// Last `limit` entries, oldest first
    pub fn recent(&self, target: &str, limit: usize) -> Vec<StoredCheck> {
        self.logs
            .get(target)
            .map(|log| {
                let skip = log.len().saturating_sub(limit);
                log.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub fn latest(&self, target: &str) -> Option<&StoredCheck> {
        self.logs.get(target).and_then(|log| log.back())
    }

    /// `hours` consecutive one-hour buckets ending at `now`, oldest first
    ///
    /// Bucket `i` covers `[now - (hours - i)h, now - (hours - i - 1)h)`;
    /// the newest bucket also includes `now` itself.
    pub fn hourly(&self, target: &str, hours: u32, now: DateTime<Utc>) -> Vec<HourlyBucket> {
        let log = self.logs.get(target);
        (0..hours)
            .map(|i| {
                let start = now - Duration::hours(i64::from(hours - i));
                let end = start + Duration::hours(1);
                let last = i + 1 == hours;
                let in_bucket = |check: &&StoredCheck| {
                    check.timestamp >= start
                        && (check.timestamp < end || (last && check.timestamp == end))
                };
                let checks: Vec<&StoredCheck> = log
                    .map(|log| log.iter().filter(in_bucket).collect())
                    .unwrap_or_default();
                summarize(start, end, &checks)
            })
            .collect()
    }

    /// Uptime over all entries at or after `since`
    pub fn uptime(&self, target: &str, since: DateTime<Utc>) -> UptimeStats {
        let checks: Vec<&StoredCheck> = self
            .logs
            .get(target)
            .map(|log| log.iter().filter(|check| check.timestamp >= since).collect())
            .unwrap_or_default();
        let bucket = summarize(since, since, &checks);

        UptimeStats {
            total_checks: bucket.checks,
            successful_checks: checks.iter().filter(|check| check.success).count(),
            uptime_percentage: bucket.uptime_percent,
            avg_response_time_ms: bucket.avg_response_ms,
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.logs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.logs.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

fn summarize(start: DateTime<Utc>, end: DateTime<Utc>, checks: &[&StoredCheck]) -> HourlyBucket {
    let timings: Vec<u64> = checks.iter().filter_map(|c| c.response_time_ms).collect();
    let avg_response_ms =
        (!timings.is_empty()).then(|| timings.iter().sum::<u64>() as f64 / timings.len() as f64);
    let uptime_percent = (!checks.is_empty()).then(|| {
        let up = checks.iter().filter(|c| c.success).count();
        up as f64 * 100.0 / checks.len() as f64
    });

    HourlyBucket {
        start,
        end,
        checks: checks.len(),
        avg_response_ms,
        uptime_percent,
    }
}
