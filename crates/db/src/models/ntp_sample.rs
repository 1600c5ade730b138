//! Health sample rows and dashboard read shapes.

use ntpwatch_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A stored sample from `metrics.ntp_parent`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NtpSample {
    pub ts: Timestamp,
    pub last_offset_sec: Option<f64>,
    pub stratum: Option<i32>,
    pub total_sources: Option<i32>,
    pub leap_status: Option<String>,
    pub gps_mode: Option<String>,
    pub selected_source: Option<String>,
    pub gps_summary: Option<String>,
    /// Insertion time, distinct from the observed `ts`.
    pub created_at: Timestamp,
}

/// "Latest sample" read shape consumed by the dashboard.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LatestSample {
    pub ts: Timestamp,
    #[serde(rename = "offset")]
    pub last_offset_sec: Option<f64>,
    pub stratum: Option<i32>,
    pub total_sources: Option<i32>,
    pub leap_status: Option<String>,
    pub gps_mode: Option<String>,
}

/// One time bucket of the offset aggregate.
///
/// `p95` and `max` are computed over `abs(offset)`; `avg` keeps the sign.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OffsetBucket {
    pub ts: Timestamp,
    pub avg: Option<f64>,
    pub p95: Option<f64>,
    pub max: Option<f64>,
    pub samples: i64,
}
