//! Alert delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send the
//! plain-text alert to every configured recipient. Configuration is loaded
//! from environment variables; if `SMTP_HOST` or every recipient is missing,
//! [`EmailConfig::from_env`] returns `None` and no mailer is constructed.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{AlertTransport, OutgoingAlert};
use crate::dispatcher::DispatchError;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (implicit TLS).
const DEFAULT_SMTP_PORT: u16 = 465;

/// Port that selects implicit TLS; any other port negotiates STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Default sender address when `EMAIL_SENDER` is not set.
const DEFAULT_FROM_ADDRESS: &str = "ntpwatch@localhost";

/// Environment variables holding recipient addresses.
const RECIPIENT_VARS: [&str; 2] = ["EMAIL_RECEIVER1", "EMAIL_RECEIVER2"];

/// Configuration for the SMTP email delivery service.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub recipients: Vec<String>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("from_address", &self.from_address)
            .field("recipients", &self.recipients)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable          | Required | Default               |
    /// |-------------------|----------|-----------------------|
    /// | `SMTP_HOST`       | yes      | --                    |
    /// | `SMTP_PORT`       | no       | `465`                 |
    /// | `EMAIL_SENDER`    | no       | `ntpwatch@localhost`  |
    /// | `EMAIL_RECEIVER1` | one of   | --                    |
    /// | `EMAIL_RECEIVER2` | one of   | --                    |
    /// | `SMTP_USERNAME`   | no       | --                    |
    /// | `SMTP_PASSWORD`   | no       | --                    |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        let recipients: Vec<String> = RECIPIENT_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if recipients.is_empty() {
            tracing::warn!("SMTP_HOST is set but no EMAIL_RECEIVER1/2 -- email alerts disabled");
            return None;
        }
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("EMAIL_SENDER")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            recipients,
            smtp_user: std::env::var("SMTP_USERNAME").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends alert emails via SMTP.
pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Assemble the MIME message for an alert.
    fn build_message(&self, alert: &OutgoingAlert) -> Result<Message, EmailError> {
        let mut builder = Message::builder()
            .from(self.config.from_address.parse()?)
            .subject(alert.message.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.config.recipients {
            builder = builder.to(recipient.parse()?);
        }
        builder
            .body(alert.message.body.clone())
            .map_err(|e| EmailError::Build(e.to_string()))
    }

    /// Send the alert email to every configured recipient.
    pub async fn deliver(&self, alert: &OutgoingAlert) -> Result<(), EmailError> {
        let email = self.build_message(alert)?;

        let mut transport_builder = if self.config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
        }
        .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(
            recipients = self.config.recipients.len(),
            subject = %alert.message.subject,
            "Alert email sent"
        );
        Ok(())
    }
}

#[async_trait]
impl AlertTransport for EmailDelivery {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, alert: &OutgoingAlert) -> Result<(), DispatchError> {
        self.deliver(alert).await.map_err(DispatchError::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
