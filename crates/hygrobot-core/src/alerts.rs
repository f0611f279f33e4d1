//! Alert orchestration: classify a reading, decide, dispatch, persist.

use std::sync::Arc;

use time::macros::format_description;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use hygrobot_types::{AlertState, AlertType, HumidityState, Reading, Recipient, RecipientId};

use crate::error::Result;
use crate::messenger::{Messenger, SendError};
use crate::repository::Repository;
use crate::threshold::classify;

/// Default minimum spacing between repeated alerts for the same state.
pub const DEFAULT_COOLDOWN: Duration = Duration::seconds(300);

/// What kind of notification a reading produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    High,
    Low,
    Recovery,
}

/// Evaluates readings against per-recipient thresholds and dispatches
/// notifications.
///
/// One invocation does at most one repository read pair, one send, and one
/// state write. Transient send failures leave the stored state untouched so
/// the next reading retries naturally.
pub struct AlertEngine {
    repo: Arc<dyn Repository>,
    messenger: Arc<dyn Messenger>,
    cooldown: Duration,
}

impl AlertEngine {
    pub fn new(repo: Arc<dyn Repository>, messenger: Arc<dyn Messenger>) -> Self {
        Self::with_cooldown(repo, messenger, DEFAULT_COOLDOWN)
    }

    pub fn with_cooldown(
        repo: Arc<dyn Repository>,
        messenger: Arc<dyn Messenger>,
        cooldown: Duration,
    ) -> Self {
        Self {
            repo,
            messenger,
            cooldown,
        }
    }

    /// Evaluate one reading for one recipient.
    ///
    /// Returns the kind of notification sent, `None` when nothing was
    /// dispatched (unknown recipient, no state change, cooldown, or a
    /// send failure).
    pub async fn process_reading(
        &self,
        reading: &Reading,
        recipient_id: RecipientId,
    ) -> Result<Option<AlertKind>> {
        let Some(recipient) = self.repo.get_recipient(recipient_id).await? else {
            return Ok(None);
        };
        let Some(state) = self.repo.get_alert_state(recipient_id).await? else {
            return Ok(None);
        };

        let new_state = classify(reading.humidity, recipient.humidity_min, recipient.humidity_max);
        let now = OffsetDateTime::now_utc();
        if !state.should_send_alert(new_state, self.cooldown, now) {
            return Ok(None);
        }

        let (kind, message) = match new_state {
            HumidityState::HighHumidity => {
                (AlertKind::High, format_high_alert(reading, &recipient))
            }
            HumidityState::LowHumidity => (AlertKind::Low, format_low_alert(reading, &recipient)),
            HumidityState::Normal => (AlertKind::Recovery, format_recovery(reading, &recipient)),
        };

        match self.messenger.send(recipient_id, &message).await {
            Ok(()) => {
                let updated = match new_state {
                    HumidityState::Normal => AlertState {
                        recipient_id,
                        current_state: new_state,
                        last_alert_time: None,
                        last_alert_type: None,
                    },
                    HumidityState::HighHumidity | HumidityState::LowHumidity => AlertState {
                        recipient_id,
                        current_state: new_state,
                        last_alert_time: Some(now),
                        last_alert_type: Some(match kind {
                            AlertKind::High => AlertType::High,
                            _ => AlertType::Low,
                        }),
                    },
                };
                self.repo.set_alert_state(&updated).await?;
                info!(recipient = %recipient_id, state = %new_state, "sent alert");
                Ok(Some(kind))
            }
            Err(SendError::Forbidden) => {
                warn!(recipient = %recipient_id, "recipient unreachable, removing");
                self.repo.delete_recipient(recipient_id).await?;
                Ok(None)
            }
            Err(SendError::Transient(reason)) => {
                warn!(recipient = %recipient_id, reason, "alert send failed, will retry");
                Ok(None)
            }
        }
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    let description =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    timestamp
        .format(&description)
        .unwrap_or_else(|_| timestamp.to_string())
}

fn format_temperatures(reading: &Reading) -> String {
    format!(
        "• DHT Temp: {:.2}°C\n• LM35 Temp: {:.2}°C\n• Thermistor: {:.2}°C",
        reading.dht_temperature, reading.lm35_temperature, reading.thermistor_temperature
    )
}

fn format_high_alert(reading: &Reading, recipient: &Recipient) -> String {
    format!(
        "⚠️ HIGH HUMIDITY ALERT\n\n\
         Current humidity: {:.2}%\n\
         Your threshold: ≤ {}%\n\n\
         🌡️ Other readings:\n{}\n\n\
         📅 {}\n\n\
         Consider ventilating the area or using a dehumidifier.",
        reading.humidity,
        recipient.humidity_max,
        format_temperatures(reading),
        format_timestamp(reading.timestamp),
    )
}

fn format_low_alert(reading: &Reading, recipient: &Recipient) -> String {
    format!(
        "⚠️ LOW HUMIDITY ALERT\n\n\
         Current humidity: {:.2}%\n\
         Your threshold: ≥ {}%\n\n\
         🌡️ Other readings:\n{}\n\n\
         📅 {}\n\n\
         Consider using a humidifier to increase moisture levels.",
        reading.humidity,
        recipient.humidity_min,
        format_temperatures(reading),
        format_timestamp(reading.timestamp),
    )
}

fn format_recovery(reading: &Reading, recipient: &Recipient) -> String {
    format!(
        "✅ HUMIDITY BACK TO NORMAL\n\n\
         Current humidity: {:.2}%\n\
         Your range: {}% - {}%\n\n\
         🌡️ Current readings:\n{}\n\n\
         📅 {}\n\n\
         Environment is back to acceptable levels.",
        reading.humidity,
        recipient.humidity_min,
        recipient.humidity_max,
        format_temperatures(reading),
        format_timestamp(reading.timestamp),
    )
}
