//! Notification delivery.
//!
//! Delivery is best-effort and at-most-once: callers log a failed `post` and
//! move on, nothing here retries.

pub mod webhook;

use async_trait::async_trait;

use burstwatch_common::error::AppError;
use burstwatch_common::types::NotificationPayload;

pub use webhook::WebhookSink;

/// Destination for alert notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn post(&self, payload: &NotificationPayload) -> Result<(), AppError>;
}

/// Sink that only writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn post(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        let body = payload
            .fields
            .iter()
            .map(|f| format!("{}: {}", f.name, f.value))
            .collect::<Vec<_>>()
            .join(" | ");

        tracing::info!(
            title = %payload.title,
            color = %payload.color,
            timestamp = %payload.timestamp,
            body = %body,
            "Notification"
        );
        Ok(())
    }
}
