//! Outbound notification delivery.

use async_trait::async_trait;
use hygrobot_core::{Messenger, SendError};
use hygrobot_types::RecipientId;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    recipient_id: RecipientId,
    text: &'a str,
}

/// Delivers notifications by POSTing JSON to a configured webhook.
pub struct WebhookMessenger {
    client: reqwest::Client,
    url: String,
}

impl WebhookMessenger {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Messenger for WebhookMessenger {
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), SendError> {
        let payload = WebhookPayload {
            recipient_id: recipient,
            text,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError::Transient(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // The receiver has rejected this recipient for good; retrying
            // the same target will never succeed.
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE => {
                Err(SendError::Forbidden)
            }
            status => Err(SendError::Transient(format!(
                "webhook returned {status}"
            ))),
        }
    }
}

/// Fallback messenger used when no webhook is configured.
///
/// Notifications still reach the operator through the service log.
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), SendError> {
        info!(%recipient, "notification: {text}");
        Ok(())
    }
}
