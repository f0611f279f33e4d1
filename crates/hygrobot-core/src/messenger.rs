//! Outbound notification seam.

use std::collections::VecDeque;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use hygrobot_types::RecipientId;

/// Why a send did not go through.
#[derive(Debug, Error)]
pub enum SendError {
    /// The recipient can never be reached again (blocked the bot, deleted
    /// the chat). The caller removes the recipient.
    #[error("recipient is permanently unreachable")]
    Forbidden,

    /// Anything that may succeed on the next attempt.
    #[error("transient send failure: {0}")]
    Transient(String),
}

/// Delivers one text message to one recipient.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), SendError>;
}

/// Scripted failure for [`MockMessenger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Forbidden,
    Transient,
}

/// Test messenger recording every send and replaying scripted failures.
#[derive(Debug, Default)]
pub struct MockMessenger {
    sent: Mutex<Vec<(RecipientId, String)>>,
    failures: Mutex<VecDeque<MockFailure>>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next send with the given error, then fall back to success.
    pub async fn push_failure(&self, failure: MockFailure) {
        self.failures.lock().await.push_back(failure);
    }

    /// Everything sent so far, in order.
    pub async fn sent(&self) -> Vec<(RecipientId, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), SendError> {
        if let Some(failure) = self.failures.lock().await.pop_front() {
            return Err(match failure {
                MockFailure::Forbidden => SendError::Forbidden,
                MockFailure::Transient => {
                    SendError::Transient("mock transient failure".to_string())
                }
            });
        }
        self.sent.lock().await.push((recipient, text.to_string()));
        Ok(())
    }
}
