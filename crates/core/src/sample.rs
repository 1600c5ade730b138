//! Structured health sample produced by the parser.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// GPS fix class as reported by gpsd `TPV` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpsMode {
    Unknown,
    NoFix,
    Fix2d,
    Fix3d,
}

impl GpsMode {
    /// Map the numeric gpsd `mode` field. Values outside `0..=3` are unknown.
    pub fn from_tpv_mode(mode: i64) -> Self {
        match mode {
            1 => GpsMode::NoFix,
            2 => GpsMode::Fix2d,
            3 => GpsMode::Fix3d,
            _ => GpsMode::Unknown,
        }
    }

    /// Text persisted in `gps_mode` and shown on the dashboard.
    pub fn as_str(self) -> &'static str {
        match self {
            GpsMode::Unknown => "Unknown",
            GpsMode::NoFix => "No fix",
            GpsMode::Fix2d => "2D fix",
            GpsMode::Fix3d => "3D fix",
        }
    }

    /// Whether this mode counts as a usable position/time fix.
    pub fn has_fix(self) -> bool {
        matches!(self, GpsMode::Fix2d | GpsMode::Fix3d)
    }
}

impl std::fmt::Display for GpsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw text captured from the remote host for one cycle.
///
/// `gps` is `None` when the GPS tool is absent or could not be sampled.
#[derive(Debug, Clone, Default)]
pub struct RawObservation {
    pub tracking: String,
    pub sources: String,
    pub gps: Option<String>,
}

/// One observation of time-sync health at `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSample {
    /// Capture time (UTC, microsecond resolution). Unique across samples.
    pub timestamp: Timestamp,
    pub offset_seconds: Option<f64>,
    pub stratum: Option<i32>,
    pub total_sources: i32,
    pub leap_status: Option<String>,
    pub selected_source: Option<String>,
    pub gps_mode: Option<GpsMode>,
    pub gps_summary: Option<String>,
}
