//! Health evaluator -- pure logic, no I/O.
//!
//! Each rule is checked independently so alert text can name every problem
//! at once. Results are kept in rule declaration order.

use serde::Serialize;

use crate::error::CoreError;
use crate::sample::HealthSample;

/// Default maximum acceptable stratum.
pub const DEFAULT_MAX_STRATUM: i32 = 10;

/// Default maximum absolute offset in seconds.
pub const DEFAULT_MAX_ABS_OFFSET_SEC: f64 = 0.050;

/// Default minimum number of visible sources.
pub const DEFAULT_MIN_SOURCES: i32 = 1;

/// Leap status accepted when nothing else is configured.
pub const DEFAULT_LEAP_STATUS: &str = "Normal";

/// Identifies a single health rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    LeapStatus,
    Stratum,
    Offset,
    Sources,
    SelectedSource,
    GpsFix,
}

impl CheckName {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckName::LeapStatus => "leap_status",
            CheckName::Stratum => "stratum",
            CheckName::Offset => "offset",
            CheckName::Sources => "sources",
            CheckName::SelectedSource => "selected_source",
            CheckName::GpsFix => "gps_fix",
        }
    }
}

/// Outcome of one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: CheckName,
    pub passed: bool,
    pub reason: String,
}

/// All rule outcomes for one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub checks: Vec<CheckResult>,
}

impl Verdict {
    /// `true` when no rule failed.
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Reasons of failed rules, in declaration order.
    pub fn failed_reasons(&self) -> Vec<&str> {
        self.failed().map(|c| c.reason.as_str()).collect()
    }

    pub fn check(&self, name: CheckName) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Per-deployment thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthThresholds {
    /// Compared case-insensitively against the reported leap status.
    pub acceptable_leap_statuses: Vec<String>,
    pub max_stratum: i32,
    pub max_abs_offset_sec: f64,
    pub min_sources: i32,
    pub require_selected_source: bool,
    pub gps_required: bool,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            acceptable_leap_statuses: vec![DEFAULT_LEAP_STATUS.to_string()],
            max_stratum: DEFAULT_MAX_STRATUM,
            max_abs_offset_sec: DEFAULT_MAX_ABS_OFFSET_SEC,
            min_sources: DEFAULT_MIN_SOURCES,
            require_selected_source: true,
            gps_required: false,
        }
    }
}

impl HealthThresholds {
    /// Reject threshold combinations that would make every sample fail or pass.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.acceptable_leap_statuses.is_empty() {
            return Err(CoreError::Validation(
                "at least one acceptable leap status is required".to_string(),
            ));
        }
        if !self.max_abs_offset_sec.is_finite() || self.max_abs_offset_sec < 0.0 {
            return Err(CoreError::Validation(format!(
                "max absolute offset must be a non-negative number, got {}",
                self.max_abs_offset_sec
            )));
        }
        if self.max_stratum < 0 || self.min_sources < 0 {
            return Err(CoreError::Validation(
                "stratum and source bounds must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Evaluate every configured rule against a sample.
pub fn evaluate(sample: &HealthSample, thresholds: &HealthThresholds) -> Verdict {
    let mut checks = vec![
        check_leap_status(sample, thresholds),
        check_stratum(sample, thresholds),
        check_offset(sample, thresholds),
        check_sources(sample, thresholds),
    ];
    if thresholds.require_selected_source {
        checks.push(check_selected_source(sample));
    }
    if thresholds.gps_required {
        checks.push(check_gps_fix(sample));
    }
    Verdict { checks }
}

fn result(name: CheckName, passed: bool, reason: String) -> CheckResult {
    CheckResult {
        name,
        passed,
        reason,
    }
}

fn check_leap_status(sample: &HealthSample, t: &HealthThresholds) -> CheckResult {
    match sample.leap_status.as_deref() {
        Some(leap)
            if t
                .acceptable_leap_statuses
                .iter()
                .any(|ok| ok.eq_ignore_ascii_case(leap)) =>
        {
            result(CheckName::LeapStatus, true, format!("Leap status {leap}"))
        }
        other => result(
            CheckName::LeapStatus,
            false,
            format!(
                "Leap status not acceptable (got {}, expected {})",
                other.unwrap_or("none"),
                t.acceptable_leap_statuses.join("/")
            ),
        ),
    }
}

fn check_stratum(sample: &HealthSample, t: &HealthThresholds) -> CheckResult {
    match sample.stratum {
        Some(s) if s <= t.max_stratum => {
            result(CheckName::Stratum, true, format!("Stratum {s}"))
        }
        Some(s) => result(
            CheckName::Stratum,
            false,
            format!("Stratum too high (got {s}, max {})", t.max_stratum),
        ),
        None => result(
            CheckName::Stratum,
            false,
            "Stratum unavailable (no sync information)".to_string(),
        ),
    }
}

fn check_offset(sample: &HealthSample, t: &HealthThresholds) -> CheckResult {
    match sample.offset_seconds {
        Some(o) if o.is_finite() && o.abs() <= t.max_abs_offset_sec => {
            result(CheckName::Offset, true, format!("Offset {o}s"))
        }
        Some(o) => result(
            CheckName::Offset,
            false,
            format!(
                "Time offset too large (abs {}s > {}s)",
                o.abs(),
                t.max_abs_offset_sec
            ),
        ),
        None => result(
            CheckName::Offset,
            false,
            "Time offset unavailable".to_string(),
        ),
    }
}

fn check_sources(sample: &HealthSample, t: &HealthThresholds) -> CheckResult {
    let total = sample.total_sources;
    if total >= t.min_sources {
        result(CheckName::Sources, true, format!("{total} sources"))
    } else if total == 0 {
        result(
            CheckName::Sources,
            false,
            "No NTP sources visible in chronyc sources".to_string(),
        )
    } else {
        result(
            CheckName::Sources,
            false,
            format!("Too few NTP sources (got {total}, min {})", t.min_sources),
        )
    }
}

fn check_selected_source(sample: &HealthSample) -> CheckResult {
    match &sample.selected_source {
        Some(name) => result(
            CheckName::SelectedSource,
            true,
            format!("Selected source {name}"),
        ),
        None => result(
            CheckName::SelectedSource,
            false,
            "No selected NTP source in chronyc sources".to_string(),
        ),
    }
}

fn check_gps_fix(sample: &HealthSample) -> CheckResult {
    match sample.gps_mode {
        Some(mode) if mode.has_fix() => result(CheckName::GpsFix, true, format!("GPS {mode}")),
        Some(mode) => result(
            CheckName::GpsFix,
            false,
            format!("GPS has no fix via gpspipe (mode {mode})"),
        ),
        None => result(
            CheckName::GpsFix,
            false,
            "GPS has no fix via gpspipe (no data)".to_string(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
