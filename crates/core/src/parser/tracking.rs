//! `chronyc tracking` output.
//!
//! The report is a list of `Key : value` lines. Each line is classified by
//! its key; a value that fails to parse leaves the field `None`.

use crate::error::ParseError;

/// Keys chrony prints in a tracking report. Any of them proves the input is
/// a tracking report even when the fields we extract are missing.
const KNOWN_KEYS: &[&str] = &[
    "Reference ID",
    "Stratum",
    "Ref time (UTC)",
    "System time",
    "Last offset",
    "RMS offset",
    "Frequency",
    "Residual freq",
    "Skew",
    "Root delay",
    "Root dispersion",
    "Update interval",
    "Leap status",
];

/// Fields extracted from a tracking report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingReport {
    pub leap_status: Option<String>,
    pub stratum: Option<i32>,
    pub offset_seconds: Option<f64>,
}

/// A classified tracking line.
#[derive(Debug, PartialEq)]
enum TrackingLine<'a> {
    LeapStatus(&'a str),
    Stratum(&'a str),
    LastOffset(&'a str),
    SystemTime(&'a str),
    Other,
}

fn classify(line: &str) -> Option<TrackingLine<'_>> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    let value = value.trim();
    let kind = match key {
        "Leap status" => TrackingLine::LeapStatus(value),
        "Stratum" => TrackingLine::Stratum(value),
        "Last offset" => TrackingLine::LastOffset(value),
        "System time" => TrackingLine::SystemTime(value),
        k if KNOWN_KEYS.contains(&k) => TrackingLine::Other,
        _ => return None,
    };
    Some(kind)
}

/// Parse a tracking report.
///
/// `Last offset` takes precedence over `System time` when both are present.
/// Fails only when no line of the input is a recognised tracking key.
pub fn parse_tracking(text: &str) -> Result<TrackingReport, ParseError> {
    let mut report = TrackingReport::default();
    let mut recognised = false;
    let mut last_offset = None;
    let mut system_time = None;

    for line in text.lines() {
        let Some(kind) = classify(line.trim()) else {
            continue;
        };
        recognised = true;
        match kind {
            TrackingLine::LeapStatus(v) if !v.is_empty() => {
                report.leap_status = Some(v.to_string());
            }
            TrackingLine::Stratum(v) => {
                report.stratum = v.parse().ok().filter(|s: &i32| *s >= 0);
            }
            TrackingLine::LastOffset(v) => last_offset = parse_offset(v),
            TrackingLine::SystemTime(v) => system_time = parse_system_time(v),
            _ => {}
        }
    }

    if !recognised {
        return Err(ParseError::TrackingUnavailable);
    }

    report.offset_seconds = last_offset.or(system_time);
    Ok(report)
}

/// `0.000012340 seconds fast of NTP time` -- fast is positive, slow negative.
fn parse_system_time(value: &str) -> Option<f64> {
    let magnitude = parse_offset(value)?;
    let slow = value.split_whitespace().any(|t| t == "slow");
    Some(if slow { -magnitude } else { magnitude })
}

/// Parse `<number>[unit]` or `<number> <unit>`, normalised to seconds.
///
/// A bare number is taken as seconds.
pub(crate) fn parse_offset(value: &str) -> Option<f64> {
    let mut tokens = value.split_whitespace();
    let first = tokens.next()?;

    let split = first
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(first.len());
    let (number, suffix) = first.split_at(split);
    let number: f64 = number.parse().ok()?;

    let unit = if suffix.is_empty() {
        tokens.next().unwrap_or("seconds")
    } else {
        suffix
    };

    unit_scale(unit).map(|scale| number * scale)
}

fn unit_scale(unit: &str) -> Option<f64> {
    match unit {
        "s" | "sec" | "second" | "seconds" => Some(1.0),
        "ms" | "millisecond" | "milliseconds" => Some(1e-3),
        "us" | "µs" | "microsecond" | "microseconds" => Some(1e-6),
        "ns" | "nanosecond" | "nanoseconds" => Some(1e-9),
        // "fast"/"slow" directly after the number means no unit was printed.
        "fast" | "slow" => Some(1.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const FULL_REPORT: &str = "\
Reference ID    : 47505300 (GPS)
Stratum         : 1
Ref time (UTC)  : Sat Oct 17 10:02:11 2026
System time     : 0.000000512 seconds slow of NTP time
Last offset     : -0.000000311 seconds
RMS offset      : 0.000000977 seconds
Frequency       : 7.512 ppm fast
Residual freq   : -0.000 ppm
Skew            : 0.012 ppm
Root delay      : 0.000000001 seconds
Root dispersion : 0.000013847 seconds
Update interval : 16.0 seconds
Leap status     : Normal
";

    #[test]
    fn full_report_prefers_last_offset() {
        let report = parse_tracking(FULL_REPORT).unwrap();
        assert_eq!(report.leap_status.as_deref(), Some("Normal"));
        assert_eq!(report.stratum, Some(1));
        let offset = report.offset_seconds.unwrap();
        assert!((offset - -0.000000311).abs() < 1e-15);
    }

    #[test]
    fn system_time_fast_is_positive() {
        let report =
            parse_tracking("Stratum : 3\nSystem time : 0.000012340 seconds fast of NTP time")
                .unwrap();
        let offset = report.offset_seconds.unwrap();
        assert!((offset - 0.00001234).abs() < 1e-12);
    }

    #[test]
    fn system_time_slow_is_negative() {
        let report = parse_tracking("System time : 0.5 seconds slow of NTP time").unwrap();
        assert_eq!(report.offset_seconds, Some(-0.5));
    }

    #[test]
    fn sub_second_units_are_normalised() {
        let approx = |value: &str, expected: f64| {
            let got = parse_offset(value).unwrap();
            assert!((got - expected).abs() < 1e-15, "{value}: {got} != {expected}");
        };
        approx("12 ms", 0.012);
        approx("+250us", 0.00025);
        approx("-40 ns", -0.00000004);
        approx("0.25", 0.25);
        assert_eq!(parse_offset("0.25 fortnights"), None);
    }

    #[test]
    fn malformed_fields_become_none() {
        let report = parse_tracking("Stratum : three\nLast offset : n/a\nLeap status :").unwrap();
        assert_eq!(report, TrackingReport::default());
    }

    #[test]
    fn empty_input_is_unavailable() {
        assert_matches!(parse_tracking(""), Err(ParseError::TrackingUnavailable));
        assert_matches!(
            parse_tracking("506 Cannot talk to daemon"),
            Err(ParseError::TrackingUnavailable)
        );
    }

    #[test]
    fn unrelated_keys_do_not_count() {
        assert_matches!(
            parse_tracking("Hostname : myntp\nUptime : 3 days"),
            Err(ParseError::TrackingUnavailable)
        );
    }

    #[test]
    fn negative_stratum_is_missing() {
        let report = parse_tracking("Stratum : -1\nLeap status : Normal").unwrap();
        assert_eq!(report.stratum, None);
        assert_eq!(report.leap_status.as_deref(), Some("Normal"));
    }
}
