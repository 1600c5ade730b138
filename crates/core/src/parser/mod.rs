//! Turns raw remote command output into a [`HealthSample`].
//!
//! One submodule per tool, each with its own line grammar. Missing or
//! malformed fields are `None`; only an unusable tracking report fails the
//! whole sample.

pub mod gps;
pub mod sources;
pub mod tracking;

use chrono::{SubsecRound, Utc};

use crate::error::ParseError;
use crate::sample::{HealthSample, RawObservation};
use crate::types::Timestamp;

pub use gps::{parse_gps, GpsReport};
pub use sources::{parse_sources, SourcesReport};
pub use tracking::{parse_tracking, TrackingReport};

/// Store timestamp resolution (PostgreSQL `timestamptz` is microseconds).
const TIMESTAMP_SUBSEC_DIGITS: u16 = 6;

/// Parse an observation, stamping it with the current time.
pub fn parse_sample(raw: &RawObservation) -> Result<HealthSample, ParseError> {
    parse_sample_at(raw, Utc::now())
}

/// Parse an observation with an explicit capture time.
pub fn parse_sample_at(
    raw: &RawObservation,
    captured_at: Timestamp,
) -> Result<HealthSample, ParseError> {
    let tracking = parse_tracking(&raw.tracking)?;
    let sources = parse_sources(&raw.sources);
    let gps = raw.gps.as_deref().map(parse_gps).unwrap_or_default();

    Ok(HealthSample {
        timestamp: captured_at.trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS),
        offset_seconds: tracking.offset_seconds,
        stratum: tracking.stratum,
        total_sources: sources.total,
        leap_status: tracking.leap_status,
        selected_source: sources.selected,
        gps_mode: gps.mode,
        gps_summary: gps.summary,
    })
}
