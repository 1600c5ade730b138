//! Alert suppression state and message rendering (pure logic).
//!
//! The dispatcher owns an [`AlertState`] and consults it before every send.
//! A notification goes out on a healthy -> unhealthy transition, when the
//! previous attempt was not delivered, or once the re-notify interval has
//! elapsed while the host stays unhealthy.

use serde::Serialize;

use crate::health::Verdict;
use crate::sample::HealthSample;
use crate::types::Timestamp;

/// Default interval between repeated alerts while unhealthy.
pub const DEFAULT_RENOTIFY_INTERVAL_SECS: i64 = 3600;

/// Why a notification is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyReason {
    /// First unhealthy cycle after a healthy (or unknown) one.
    Transition,
    /// Still unhealthy, but the last attempt was not delivered.
    Undelivered,
    /// Still unhealthy and the re-notify interval has elapsed.
    Renotify,
}

/// Result of consulting the suppression policy for an unhealthy verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    Notify(NotifyReason),
    Suppress,
}

/// Verdict history carried between cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertState {
    /// `None` until the first verdict has been observed.
    pub last_healthy: Option<bool>,
    /// When the last notification was actually delivered.
    pub last_notified_at: Option<Timestamp>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether an unhealthy verdict observed at `now` should notify.
    pub fn decide(&self, now: Timestamp, renotify_interval: chrono::Duration) -> AlertDecision {
        if self.last_healthy != Some(false) {
            return AlertDecision::Notify(NotifyReason::Transition);
        }
        match self.last_notified_at {
            None => AlertDecision::Notify(NotifyReason::Undelivered),
            Some(last) if now.signed_duration_since(last) >= renotify_interval => {
                AlertDecision::Notify(NotifyReason::Renotify)
            }
            Some(_) => AlertDecision::Suppress,
        }
    }

    /// Record an unhealthy cycle. `delivered_at` is set only when a
    /// notification actually went out during this cycle.
    pub fn record_unhealthy(&mut self, delivered_at: Option<Timestamp>) {
        if self.last_healthy != Some(false) {
            self.last_notified_at = None;
        }
        self.last_healthy = Some(false);
        if delivered_at.is_some() {
            self.last_notified_at = delivered_at;
        }
    }

    /// Record a healthy cycle; the next unhealthy one is a transition.
    pub fn record_healthy(&mut self) {
        self.last_healthy = Some(true);
        self.last_notified_at = None;
    }
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

/// Identity of the monitored host as shown in alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLabel {
    pub host: String,
    pub ip: String,
}

impl std::fmt::Display for HostLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.host, self.ip)
    }
}

fn or_na<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

/// Render the alert for an unhealthy verdict.
///
/// Body layout: failed reasons joined by ` | `, then ` || `, then the sample
/// details.
pub fn render_alert(host: &HostLabel, verdict: &Verdict, sample: &HealthSample) -> AlertMessage {
    let detail = [
        format!("Host: {host}"),
        format!("Sampled at: {}", sample.timestamp.to_rfc3339()),
        format!("Leap: {}", or_na(sample.leap_status.as_deref())),
        format!("Stratum: {}", or_na(sample.stratum)),
        format!("Last offset: {} sec", or_na(sample.offset_seconds)),
        format!(
            "Selected source: {}",
            or_na(sample.selected_source.as_deref())
        ),
        format!("Total sources: {}", sample.total_sources),
        format!("GPS: {}", or_na(sample.gps_summary.as_deref())),
    ];

    AlertMessage {
        subject: format!("NTP health alert on {}", host.host),
        body: format!(
            "{} || {}\n",
            verdict.failed_reasons().join(" | "),
            detail.join(" | ")
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
