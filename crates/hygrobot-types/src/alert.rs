//! Alert classification states and the cooldown decision logic.

use core::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::ValidationError;
use crate::recipient::RecipientId;

/// Classification of a humidity reading against a recipient's thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumidityState {
    /// Within `[min, max]`.
    Normal,
    /// Above the recipient's maximum.
    HighHumidity,
    /// Below the recipient's minimum.
    LowHumidity,
}

impl HumidityState {
    /// Stable string form used for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::HighHumidity => "high_humidity",
            Self::LowHumidity => "low_humidity",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "normal" => Ok(Self::Normal),
            "high_humidity" => Ok(Self::HighHumidity),
            "low_humidity" => Ok(Self::LowHumidity),
            other => Err(ValidationError::UnknownVariant {
                field: "humidity_state",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for HumidityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of the most recently sent out-of-range alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    High,
    Low,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            other => Err(ValidationError::UnknownVariant {
                field: "alert_type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient alert bookkeeping: what state we last reported and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub recipient_id: RecipientId,
    pub current_state: HumidityState,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_alert_time: Option<OffsetDateTime>,
    pub last_alert_type: Option<AlertType>,
}

impl AlertState {
    /// Fresh state for a newly registered recipient.
    pub fn new(recipient_id: RecipientId) -> Self {
        Self {
            recipient_id,
            current_state: HumidityState::Normal,
            last_alert_time: None,
            last_alert_type: None,
        }
    }

    /// Whether a message should go out given the freshly classified state.
    ///
    /// A transition to a different state always sends. Staying in the same
    /// out-of-range state re-sends once the cooldown has fully elapsed
    /// (elapsed equal to the cooldown counts as elapsed). Staying in
    /// `Normal` never sends.
    pub fn should_send_alert(
        &self,
        new_state: HumidityState,
        cooldown: Duration,
        now: OffsetDateTime,
    ) -> bool {
        if new_state != self.current_state {
            return true;
        }
        if new_state == HumidityState::Normal {
            return false;
        }
        match self.last_alert_time {
            None => true,
            Some(last) => now - last >= cooldown,
        }
    }
}
