//! Alert delivery for the NTP/GPS health monitor.
//!
//! - [`AlertDispatcher`] -- applies the suppression policy and fans an alert
//!   out to every configured channel.
//! - [`delivery`] -- external delivery channels (email, webhook) behind the
//!   [`AlertTransport`] trait.

pub mod delivery;
pub mod dispatcher;

pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::webhook::WebhookDelivery;
pub use delivery::{AlertTransport, OutgoingAlert};
pub use dispatcher::{AlertDispatcher, DispatchError, DispatchOutcome};
