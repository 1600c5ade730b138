//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] POSTs a JSON-encoded alert to `ALERT_WEBHOOK_URL`.
//! Failed attempts are retried up to three times with exponential backoff
//! (1 s, 2 s, 4 s).

use std::time::Duration;

use async_trait::async_trait;

use super::{AlertTransport, OutgoingAlert};
use crate::dispatcher::DispatchError;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers alerts to a single external webhook endpoint.
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    /// Create a delivery service for `url` with a pre-configured HTTP client.
    pub fn new(url: impl Into<String>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            retry_delays: RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        })
    }

    /// Read `ALERT_WEBHOOK_URL`; `Ok(None)` when unset or blank.
    pub fn from_env() -> Result<Option<Self>, WebhookError> {
        match std::env::var("ALERT_WEBHOOK_URL") {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()).map(Some),
            _ => Ok(None),
        }
    }

    /// Override the backoff schedule.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// JSON body posted for an alert.
    pub fn payload(alert: &OutgoingAlert) -> serde_json::Value {
        serde_json::json!({
            "subject": alert.message.subject,
            "body": alert.message.body,
            "host": alert.host,
            "timestamp": alert.sampled_at,
            "failed_checks": alert.failed_checks,
        })
    }

    /// Deliver an alert with retry.
    ///
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver(&self, alert: &OutgoingAlert) -> Result<(), WebhookError> {
        let payload = Self::payload(alert);
        let url = self.url.as_str();

        let mut last_err: Option<WebhookError> = None;

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(&payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(url, error = %e, "Webhook delivery failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertTransport for WebhookDelivery {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, alert: &OutgoingAlert) -> Result<(), DispatchError> {
        self.deliver(alert).await.map_err(DispatchError::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ntpwatch_core::alert::{AlertMessage, NotifyReason};
    use ntpwatch_core::health::CheckName;

    fn alert() -> OutgoingAlert {
        OutgoingAlert {
            host: "myntp".to_string(),
            sampled_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
            reason: NotifyReason::Renotify,
            failed_checks: vec![CheckName::Stratum, CheckName::GpsFix],
            message: AlertMessage {
                subject: "NTP health alert on myntp".to_string(),
                body: "Stratum too high (got 16, max 10) || Host: myntp (10.0.0.5)\n".to_string(),
            },
        }
    }

    #[test]
    fn new_does_not_panic() {
        let delivery = WebhookDelivery::new("http://localhost:9/hook").unwrap();
        assert_eq!(delivery.url(), "http://localhost:9/hook");
    }

    #[test]
    fn payload_carries_alert_fields() {
        let payload = WebhookDelivery::payload(&alert());
        assert_eq!(payload["subject"], "NTP health alert on myntp");
        assert_eq!(payload["host"], "myntp");
        assert_eq!(payload["timestamp"], "2026-10-18T09:00:00Z");
        assert_eq!(
            payload["failed_checks"],
            serde_json::json!(["stratum", "gps_fix"])
        );
        assert!(payload["body"].as_str().unwrap().contains(" || "));
    }

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[test]
    fn webhook_error_display_request() {
        // Build a reqwest error from an invalid URL.
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = WebhookError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_after_retries() {
        let delivery = WebhookDelivery::new("http://127.0.0.1:9/hook")
            .unwrap()
            .with_retry_delays(vec![Duration::from_millis(1); 3]);
        let result = delivery.deliver(&alert()).await;
        assert!(matches!(result, Err(WebhookError::Request(_))));
    }
}
