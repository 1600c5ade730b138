//! Partition catalog rows.

use ntpwatch_core::partition::PartitionBounds;
use ntpwatch_core::types::Timestamp;
use sqlx::FromRow;

/// A row of the `metrics.ntp_partitions` catalog view.
#[derive(Debug, Clone, FromRow)]
pub struct PartitionRow {
    pub name: String,
    pub range_start: Option<Timestamp>,
    pub range_end: Option<Timestamp>,
}

impl PartitionRow {
    /// Bounded partitions only; DEFAULT / MINVALUE / MAXVALUE yield `None`.
    pub fn into_bounds(self) -> Option<PartitionBounds> {
        Some(PartitionBounds {
            name: self.name,
            range_start: self.range_start?,
            range_end: self.range_end?,
        })
    }
}

/// Summary of one maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub created: Vec<String>,
    pub dropped: Vec<String>,
}
