//! Security alert delivery.
//!
//! Alerts are best-effort: they run on a detached task and a delivery
//! failure is logged and counted, never returned to the caller.

use crate::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Notification failures.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The channel could not deliver the message.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound alert channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `body` to `address` under `subject`.
    async fn notify(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes alerts to the structured log instead of mailing them.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    from: String,
}

impl LogNotifier {
    /// Create a notifier sending as `from`.
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(
            from = %self.from,
            to = %address,
            subject = %subject,
            body = %body,
            "Sending security alert"
        );
        Ok(())
    }
}

/// Send an alert on a detached task.
///
/// The handle is returned for tests; production callers drop it.
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    address: String,
    subject: String,
    body: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&address, &subject, &body).await {
            metrics::record_notification_failure();
            warn!(to = %address, error = %e, "Security alert cannot be sent");
        }
    })
}
