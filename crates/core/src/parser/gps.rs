//! `gpspipe -w` output (gpsd JSON reports, one object per line).
//!
//! Only `TPV` reports are used. The last reported `mode` wins; `time`, `lat`
//! and `lon` keep the last value that was present.

use serde_json::Value;

use crate::sample::GpsMode;

/// Upper bound on lines inspected, whatever the sampler delivered.
pub const MAX_GPS_LINES: usize = 512;

/// Fix state derived from the GPS stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsReport {
    pub mode: Option<GpsMode>,
    pub summary: Option<String>,
    pub tpv_count: usize,
}

#[derive(Default)]
struct TpvState {
    mode: Option<GpsMode>,
    time: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    count: usize,
}

impl TpvState {
    fn absorb(&mut self, report: &Value) {
        self.count += 1;
        if let Some(mode) = report.get("mode").and_then(Value::as_i64) {
            self.mode = Some(GpsMode::from_tpv_mode(mode));
        }
        if let Some(time) = report.get("time").and_then(Value::as_str) {
            self.time = Some(time.to_string());
        }
        if let Some(lat) = report.get("lat").and_then(Value::as_f64) {
            self.lat = Some(lat);
        }
        if let Some(lon) = report.get("lon").and_then(Value::as_f64) {
            self.lon = Some(lon);
        }
    }

    fn summary(&self) -> Option<String> {
        let mode = self.mode?;
        let mut parts = vec![format!("mode={mode}")];
        if let Some(time) = &self.time {
            parts.push(format!("time={time}"));
        }
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            parts.push(format!("pos=({lat},{lon})"));
        }
        Some(format!("GPS(TPV): {}", parts.join(" | ")))
    }
}

/// Parse a GPS report stream. Lines that are not JSON objects are ignored.
pub fn parse_gps(text: &str) -> GpsReport {
    let mut state = TpvState::default();

    for line in text.lines().take(MAX_GPS_LINES) {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        let Ok(report) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if report.get("class").and_then(Value::as_str) == Some("TPV") {
            state.absorb(&report);
        }
    }

    GpsReport {
        mode: state.mode,
        summary: state.summary(),
        tpv_count: state.count,
    }
}
