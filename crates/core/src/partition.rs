//! Daily partition calendar.
//!
//! A sample belongs to the partition of the UTC calendar day of its
//! timestamp; each partition covers `[day 00:00 UTC, next day 00:00 UTC)`.
//! Retention decisions use the bounds stored in the catalog, never the
//! partition name.

use chrono::{Days, NaiveTime};
use serde::Serialize;

use crate::types::{Day, Timestamp};

/// Default number of days of partitions kept.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Default number of future days created ahead of need.
pub const DEFAULT_PREMAKE_DAYS: u32 = 7;

/// Partition bounds as read back from the storage catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionBounds {
    /// Qualified relation name, e.g. `metrics.ntp_parent_20261018`.
    pub name: String,
    pub range_start: Timestamp,
    /// Exclusive upper bound.
    pub range_end: Timestamp,
}

/// Partition key for a sample timestamp.
pub fn partition_day(ts: Timestamp) -> Day {
    ts.date_naive()
}

/// Midnight UTC at the start of `day`.
pub fn day_start(day: Day) -> Timestamp {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Relation name (without schema) used when creating the partition for `day`.
pub fn partition_table_name(day: Day) -> String {
    format!("ntp_parent_{}", day.format("%Y%m%d"))
}

/// `today` and each of the following `premake_days` days.
pub fn days_to_ensure(today: Day, premake_days: u32) -> Vec<Day> {
    (0..=u64::from(premake_days))
        .filter_map(|n| today.checked_add_days(Days::new(n)))
        .collect()
}

/// Start of the oldest day still retained.
pub fn prune_cutoff(today: Day, retention_days: u32) -> Timestamp {
    let day = today
        .checked_sub_days(Days::new(u64::from(retention_days)))
        .unwrap_or(Day::MIN);
    day_start(day)
}

/// Partitions whose whole range lies strictly before the retention cutoff.
///
/// A partition whose upper bound equals or passes the cutoff is kept.
pub fn partitions_to_prune(
    partitions: &[PartitionBounds],
    today: Day,
    retention_days: u32,
) -> Vec<&PartitionBounds> {
    let cutoff = prune_cutoff(today, retention_days);
    partitions
        .iter()
        .filter(|p| p.range_end < cutoff)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
