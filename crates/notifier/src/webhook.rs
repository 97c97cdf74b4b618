//! Discord-compatible webhook sink.
//!
//! Each payload becomes a single embed:
//! `{"embeds":[{"title","color","fields":[{"name","value","inline"}],"timestamp"}]}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use burstwatch_common::error::AppError;
use burstwatch_common::types::{AlertColor, NotificationField, NotificationPayload};

use crate::NotificationSink;

/// Embed color for alerts (red).
const ALERT_COLOR: u32 = 0xE7_4C_3C;

/// Embed color for all-clear notifications (green).
const CLEAR_COLOR: u32 = 0x2E_CC_71;

/// Embed field values are capped at 1024 characters by Discord.
const MAX_FIELD_VALUE_LEN: usize = 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    color: u32,
    fields: Vec<EmbedField<'a>>,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct EmbedField<'a> {
    name: &'a str,
    value: String,
    inline: bool,
}

impl<'a> From<&'a NotificationField> for EmbedField<'a> {
    fn from(field: &'a NotificationField) -> Self {
        Self {
            name: &field.name,
            value: field.value.chars().take(MAX_FIELD_VALUE_LEN).collect(),
            inline: field.inline,
        }
    }
}

fn embed_color(color: AlertColor) -> u32 {
    match color {
        AlertColor::Alert => ALERT_COLOR,
        AlertColor::Clear => CLEAR_COLOR,
    }
}

/// Posts notifications to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build webhook client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn message(payload: &NotificationPayload) -> WebhookMessage<'_> {
        WebhookMessage {
            embeds: [Embed {
                title: &payload.title,
                color: embed_color(payload.color),
                fields: payload.fields.iter().map(EmbedField::from).collect(),
                timestamp: payload.timestamp.to_rfc3339(),
            }],
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn post(&self, payload: &NotificationPayload) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::message(payload))
            .send()
            .await
            .map_err(|e| AppError::Notification(format!("Webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Notification(format!(
                "Webhook returned status {}",
                status.as_u16()
            )));
        }

        tracing::debug!(title = %payload.title, "Webhook notification delivered");
        Ok(())
    }
}
