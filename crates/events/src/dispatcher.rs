//! Alert dispatcher: suppression policy plus fan-out to delivery channels.
//!
//! The dispatcher is stateless between calls; the caller owns the
//! [`AlertState`] and passes it in for every unhealthy verdict. A cycle
//! counts as delivered when at least one channel succeeds. With no
//! channels configured the alert is only logged and treated as delivered.
//! The whole fan-out is bounded by a send timeout.

use std::time::Duration;

use ntpwatch_core::alert::{render_alert, AlertDecision, AlertState, HostLabel, NotifyReason};
use ntpwatch_core::health::Verdict;
use ntpwatch_core::sample::HealthSample;
use ntpwatch_core::types::Timestamp;

use crate::delivery::email::EmailError;
use crate::delivery::webhook::WebhookError;
use crate::delivery::{AlertTransport, OutgoingAlert};

/// Error type for alert dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    /// The fan-out did not finish in time and no channel had delivered.
    #[error("Alert not delivered within {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Default bound on one whole fan-out.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// What happened to an unhealthy verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The alert went out on `channels` channels (0 means log only).
    Sent {
        reason: NotifyReason,
        channels: usize,
    },
    /// Suppressed by the re-notify interval.
    Suppressed,
}

/// Applies the suppression policy and delivers alerts.
pub struct AlertDispatcher {
    host: HostLabel,
    transports: Vec<Box<dyn AlertTransport>>,
    renotify_interval: chrono::Duration,
    send_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(host: HostLabel, renotify_interval: chrono::Duration) -> Self {
        Self {
            host,
            transports: Vec::new(),
            renotify_interval,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Bound the time spent delivering one alert across all channels.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Register a delivery channel.
    pub fn with_transport(mut self, transport: Box<dyn AlertTransport>) -> Self {
        self.transports.push(transport);
        self
    }

    pub fn channel_count(&self) -> usize {
        self.transports.len()
    }

    /// Handle an unhealthy verdict observed at `now`.
    ///
    /// Updates `state` in every case. On error the state records the
    /// unhealthy cycle without a delivery time, so the next cycle retries.
    pub async fn dispatch(
        &self,
        state: &mut AlertState,
        verdict: &Verdict,
        sample: &HealthSample,
        now: Timestamp,
    ) -> Result<DispatchOutcome, DispatchError> {
        let reason = match state.decide(now, self.renotify_interval) {
            AlertDecision::Suppress => {
                tracing::debug!(
                    last_notified_at = ?state.last_notified_at,
                    "Unhealthy verdict suppressed by re-notify interval"
                );
                state.record_unhealthy(None);
                return Ok(DispatchOutcome::Suppressed);
            }
            AlertDecision::Notify(reason) => reason,
        };

        let alert = OutgoingAlert {
            host: self.host.host.clone(),
            sampled_at: sample.timestamp,
            reason,
            failed_checks: verdict.failed().map(|c| c.name).collect(),
            message: render_alert(&self.host, verdict, sample),
        };

        if self.transports.is_empty() {
            tracing::warn!(
                reason = ?reason,
                subject = %alert.message.subject,
                body = %alert.message.body.trim_end(),
                "No alert channel configured; logging alert only"
            );
            state.record_unhealthy(Some(now));
            return Ok(DispatchOutcome::Sent {
                reason,
                channels: 0,
            });
        }

        let mut delivered = 0;
        let mut last_err = None;
        let fan_out = async {
            for transport in &self.transports {
                match transport.send(&alert).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        tracing::error!(channel = transport.name(), error = %e, "Alert delivery failed");
                        last_err = Some(e);
                    }
                }
            }
        };
        let timed_out = tokio::time::timeout(self.send_timeout, fan_out)
            .await
            .is_err();
        if timed_out {
            tracing::warn!(
                timeout_secs = self.send_timeout.as_secs(),
                delivered,
                "Alert fan-out timed out"
            );
        }

        if delivered == 0 {
            state.record_unhealthy(None);
            return Err(match (timed_out, last_err) {
                (false, Some(e)) => e,
                _ => DispatchError::TimedOut(self.send_timeout),
            });
        }

        tracing::info!(reason = ?reason, channels = delivered, "Alert dispatched");
        state.record_unhealthy(Some(now));
        Ok(DispatchOutcome::Sent {
            reason,
            channels: delivered,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use ntpwatch_core::health::{evaluate, HealthThresholds};

    use super::*;

    /// Never completes a send.
    struct StalledTransport;

    #[async_trait]
    impl AlertTransport for StalledTransport {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn send(&self, _alert: &OutgoingAlert) -> Result<(), DispatchError> {
            std::future::pending().await
        }
    }

    struct FakeTransport {
        sent: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
    }

    #[async_trait]
    impl AlertTransport for FakeTransport {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn send(&self, _alert: &OutgoingAlert) -> Result<(), DispatchError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DispatchError::Webhook(WebhookError::HttpStatus(503)));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn host() -> HostLabel {
        HostLabel {
            host: "myntp".to_string(),
            ip: "10.0.0.5".to_string(),
        }
    }

    fn unhealthy_sample(minute: u32) -> HealthSample {
        HealthSample {
            timestamp: Utc.with_ymd_and_hms(2026, 10, 18, 9, minute, 0).unwrap(),
            offset_seconds: Some(0.0001),
            stratum: Some(16),
            total_sources: 1,
            leap_status: Some("Normal".to_string()),
            selected_source: Some("GPS".to_string()),
            gps_mode: None,
            gps_summary: None,
        }
    }

    fn thresholds() -> HealthThresholds {
        HealthThresholds {
            gps_required: false,
            ..HealthThresholds::default()
        }
    }

    fn dispatcher() -> (AlertDispatcher, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let sent = Arc::new(AtomicUsize::new(0));
        let fail = Arc::new(AtomicBool::new(false));
        let d = AlertDispatcher::new(host(), Duration::hours(1)).with_transport(Box::new(
            FakeTransport {
                sent: sent.clone(),
                fail: fail.clone(),
            },
        ));
        (d, sent, fail)
    }

    #[tokio::test]
    async fn three_unhealthy_cycles_notify_once() {
        let (d, sent, _) = dispatcher();
        let mut state = AlertState::new();

        for minute in [0, 1, 2] {
            let sample = unhealthy_sample(minute);
            let verdict = evaluate(&sample, &thresholds());
            d.dispatch(&mut state, &verdict, &sample, sample.timestamp)
                .await
                .unwrap();
        }

        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn renotifies_after_interval() {
        let (d, sent, _) = dispatcher();
        let mut state = AlertState::new();
        let sample = unhealthy_sample(0);
        let verdict = evaluate(&sample, &thresholds());

        d.dispatch(&mut state, &verdict, &sample, sample.timestamp)
            .await
            .unwrap();
        let outcome = d
            .dispatch(
                &mut state,
                &verdict,
                &sample,
                sample.timestamp + Duration::hours(1),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                reason: NotifyReason::Renotify,
                channels: 1
            }
        );
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_next_cycle() {
        let (d, sent, fail) = dispatcher();
        let mut state = AlertState::new();
        let sample = unhealthy_sample(0);
        let verdict = evaluate(&sample, &thresholds());

        fail.store(true, Ordering::SeqCst);
        let first = d
            .dispatch(&mut state, &verdict, &sample, sample.timestamp)
            .await;
        assert_matches!(first, Err(DispatchError::Webhook(_)));
        assert_eq!(state.last_notified_at, None);

        fail.store(false, Ordering::SeqCst);
        let second = d
            .dispatch(
                &mut state,
                &verdict,
                &sample,
                sample.timestamp + Duration::minutes(1),
            )
            .await
            .unwrap();
        assert_eq!(
            second,
            DispatchOutcome::Sent {
                reason: NotifyReason::Undelivered,
                channels: 1
            }
        );
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_channels_logs_and_counts_as_delivered() {
        let d = AlertDispatcher::new(host(), Duration::hours(1));
        let mut state = AlertState::new();
        let sample = unhealthy_sample(0);
        let verdict = evaluate(&sample, &thresholds());

        let outcome = d
            .dispatch(&mut state, &verdict, &sample, sample.timestamp)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                reason: NotifyReason::Transition,
                channels: 0
            }
        );
        assert_eq!(state.last_notified_at, Some(sample.timestamp));
    }

    #[tokio::test]
    async fn stalled_channel_times_out_and_retries_next_cycle() {
        let d = AlertDispatcher::new(host(), Duration::hours(1))
            .with_transport(Box::new(StalledTransport))
            .with_send_timeout(std::time::Duration::from_millis(50));
        let mut state = AlertState::new();
        let sample = unhealthy_sample(0);
        let verdict = evaluate(&sample, &thresholds());

        let result = d
            .dispatch(&mut state, &verdict, &sample, sample.timestamp)
            .await;

        assert_matches!(result, Err(DispatchError::TimedOut(t)) if t == std::time::Duration::from_millis(50));
        assert_eq!(state.last_notified_at, None);
        assert_eq!(
            state.decide(sample.timestamp, Duration::hours(1)),
            AlertDecision::Notify(NotifyReason::Undelivered)
        );
    }

    #[tokio::test]
    async fn delivery_before_timeout_counts_as_sent() {
        let sent = Arc::new(AtomicUsize::new(0));
        let d = AlertDispatcher::new(host(), Duration::hours(1))
            .with_transport(Box::new(FakeTransport {
                sent: sent.clone(),
                fail: Arc::new(AtomicBool::new(false)),
            }))
            .with_transport(Box::new(StalledTransport))
            .with_send_timeout(std::time::Duration::from_millis(50));
        let mut state = AlertState::new();
        let sample = unhealthy_sample(0);
        let verdict = evaluate(&sample, &thresholds());

        let outcome = d
            .dispatch(&mut state, &verdict, &sample, sample.timestamp)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                reason: NotifyReason::Transition,
                channels: 1
            }
        );
        assert_eq!(sent.load(Ordering::SeqCst), 1);
        assert_eq!(state.last_notified_at, Some(sample.timestamp));
    }

    #[tokio::test]
    async fn recovery_resets_suppression() {
        let (d, sent, _) = dispatcher();
        let mut state = AlertState::new();
        let sample = unhealthy_sample(0);
        let verdict = evaluate(&sample, &thresholds());

        d.dispatch(&mut state, &verdict, &sample, sample.timestamp)
            .await
            .unwrap();
        state.record_healthy();
        d.dispatch(
            &mut state,
            &verdict,
            &sample,
            sample.timestamp + Duration::minutes(2),
        )
        .await
        .unwrap();

        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }
}
