//! External delivery channels for alerts.

pub mod email;
pub mod webhook;

use async_trait::async_trait;
use ntpwatch_core::alert::{AlertMessage, NotifyReason};
use ntpwatch_core::health::CheckName;
use ntpwatch_core::types::Timestamp;
use serde::Serialize;

use crate::dispatcher::DispatchError;

/// A rendered alert plus the context channels may want to include.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingAlert {
    pub host: String,
    pub sampled_at: Timestamp,
    pub reason: NotifyReason,
    pub failed_checks: Vec<CheckName>,
    #[serde(flatten)]
    pub message: AlertMessage,
}

/// A channel that can deliver an alert.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    /// Short channel name used in logs.
    fn name(&self) -> &'static str;

    async fn send(&self, alert: &OutgoingAlert) -> Result<(), DispatchError>;
}
