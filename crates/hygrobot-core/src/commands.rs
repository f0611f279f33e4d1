//! Chat command surface.
//!
//! [`CommandRouter`] is transport-agnostic: whatever chat frontend the
//! service bridges in hands over `(recipient, text)` and relays the reply
//! string back. All commands except `start` and `help` pass the
//! per-recipient rate limiter first.

use std::sync::Arc;

use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{error, info};

use hygrobot_types::{
    AlertState, HumidityState, Recipient, RecipientId, DEFAULT_HUMIDITY_MAX, DEFAULT_HUMIDITY_MIN,
};

use crate::link::LinkReader;
use crate::ratelimit::RateLimiter;
use crate::repository::Repository;
use crate::threshold::classify;

/// A parsed chat command. A leading `/` is accepted and ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Sensors,
    Settings,
    SetHumidityMin(Option<String>),
    SetHumidityMax(Option<String>),
    Unknown,
}

impl Command {
    /// Parse raw message text.
    pub fn parse(text: &str) -> Self {
        let mut words = text.trim().split_whitespace();
        let Some(first) = words.next() else {
            return Self::Unknown;
        };
        let name = first.strip_prefix('/').unwrap_or(first).to_ascii_lowercase();
        let arg = words.next().map(str::to_string);
        match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "sensors" | "status" => Self::Sensors,
            "settings" => Self::Settings,
            "set_humidity_min" => Self::SetHumidityMin(arg),
            "set_humidity_max" => Self::SetHumidityMax(arg),
            _ => Self::Unknown,
        }
    }

    fn rate_limited(&self) -> bool {
        !matches!(self, Self::Start | Self::Help | Self::Unknown)
    }
}

/// Handles chat commands against the store and the live sensor link.
pub struct CommandRouter {
    repo: Arc<dyn Repository>,
    reader: Arc<LinkReader>,
    limiter: RateLimiter,
}

impl CommandRouter {
    pub fn new(repo: Arc<dyn Repository>, reader: Arc<LinkReader>) -> Self {
        Self {
            repo,
            reader,
            limiter: RateLimiter::default(),
        }
    }

    pub fn with_limiter(
        repo: Arc<dyn Repository>,
        reader: Arc<LinkReader>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            repo,
            reader,
            limiter,
        }
    }

    /// Handle one message and produce the reply text. Never fails: internal
    /// errors are logged and turned into an apology.
    pub async fn handle(&self, recipient: RecipientId, text: &str) -> String {
        let command = Command::parse(text);

        if command.rate_limited() {
            if let Err(remaining) = self
                .limiter
                .check(recipient, OffsetDateTime::now_utc())
                .await
            {
                let plural = if remaining > 1 { "s" } else { "" };
                return format!(
                    "⏸️ Please wait {remaining} more second{plural} before requesting again."
                );
            }
        }

        match command {
            Command::Start => self.start(recipient).await,
            Command::Help => help_text(),
            Command::Sensors => self.sensors(recipient).await,
            Command::Settings => self.settings(recipient).await,
            Command::SetHumidityMin(arg) => self.set_threshold(recipient, arg, Bound::Min).await,
            Command::SetHumidityMax(arg) => self.set_threshold(recipient, arg, Bound::Max).await,
            Command::Unknown => "Unknown command. Use /help to see available commands.".to_string(),
        }
    }

    async fn start(&self, recipient_id: RecipientId) -> String {
        let result = async {
            match self.repo.get_recipient(recipient_id).await? {
                Some(existing) => Ok::<Recipient, crate::Error>(existing),
                None => {
                    let now = OffsetDateTime::now_utc();
                    let recipient = Recipient::new(
                        recipient_id,
                        DEFAULT_HUMIDITY_MIN,
                        DEFAULT_HUMIDITY_MAX,
                        now,
                        now,
                    )?;
                    self.repo.create_recipient(&recipient).await?;
                    self.repo
                        .set_alert_state(&AlertState::new(recipient_id))
                        .await?;
                    info!(recipient = %recipient_id, "registered new recipient");
                    Ok(recipient)
                }
            }
        }
        .await;

        match result {
            Ok(recipient) => format!(
                "Welcome to the Home Humidity Bot! 🌡️💧\n\n\
                 I monitor your humidity sensors and alert you when levels are unusual.\n\n\
                 Available commands:\n\
                 /sensors - Get current sensor readings\n\
                 /settings - View your alert thresholds\n\
                 /set_humidity_min <value> - Set minimum humidity %\n\
                 /set_humidity_max <value> - Set maximum humidity %\n\
                 /help - Show this help message\n\n\
                 Your current thresholds:\n\
                 • Min: {}%\n\
                 • Max: {}%\n\n\
                 You'll receive alerts when humidity goes outside this range.",
                recipient.humidity_min, recipient.humidity_max
            ),
            Err(err) => {
                error!(recipient = %recipient_id, error = %err, "start command failed");
                "Sorry, unable to initialize your account. Please try again.".to_string()
            }
        }
    }

    async fn sensors(&self, recipient_id: RecipientId) -> String {
        let Some(reading) = self.reader.latest_reading().await else {
            return "❌ Sensor Unavailable\n\n\
                    The sensor is currently disconnected.\n\
                    Attempting to reconnect...\n\n\
                    Please try again in a few moments."
                .to_string();
        };

        let recipient = match self.repo.get_recipient(recipient_id).await {
            Ok(Some(recipient)) => recipient,
            Ok(None) => return "Please initialize the bot first with /start".to_string(),
            Err(err) => {
                error!(recipient = %recipient_id, error = %err, "sensors command failed");
                return "Sorry, unable to retrieve sensor data. Please try again.".to_string();
            }
        };

        let status = match classify(
            reading.humidity,
            recipient.humidity_min,
            recipient.humidity_max,
        ) {
            HumidityState::HighHumidity => "⚠️ Status: HIGH HUMIDITY ALERT",
            HumidityState::LowHumidity => "⚠️ Status: LOW HUMIDITY ALERT",
            HumidityState::Normal => "✅ Status: Normal",
        };

        let stamp = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
        let updated = reading
            .timestamp
            .format(&stamp)
            .unwrap_or_else(|_| reading.timestamp.to_string());

        format!(
            "📊 Current Sensor Readings\n\n\
             💧 Humidity: {:.2}%\n\
             🌡️ DHT Temperature: {:.2}°C\n\
             🌡️ LM35 Temperature: {:.2}°C\n\
             🌡️ Thermistor: {:.2}°C\n\n\
             📅 Last updated: {updated}\n\n\
             Your humidity thresholds: {}% - {}%\n\
             {status}",
            reading.humidity,
            reading.dht_temperature,
            reading.lm35_temperature,
            reading.thermistor_temperature,
            recipient.humidity_min,
            recipient.humidity_max,
        )
    }

    async fn settings(&self, recipient_id: RecipientId) -> String {
        match self.repo.get_recipient(recipient_id).await {
            Ok(Some(recipient)) => format!(
                "⚙️ Your Alert Settings\n\n\
                 💧 Humidity Thresholds:\n\
                 • Minimum: {:.1}%\n\
                 • Maximum: {:.1}%\n\n\
                 🔔 Alert Behavior:\n\
                 • You'll be notified when humidity goes outside this range\n\
                 • Cooldown: 5 minutes between similar alerts\n\
                 • Recovery notifications when humidity normalizes\n\n\
                 To change settings:\n\
                 /set_humidity_min <value>\n\
                 /set_humidity_max <value>\n\n\
                 Example: /set_humidity_min 35",
                recipient.humidity_min, recipient.humidity_max
            ),
            Ok(None) => "❌ User not found.\n\nPlease start the bot first with /start".to_string(),
            Err(err) => {
                error!(recipient = %recipient_id, error = %err, "settings command failed");
                "❌ Unable to retrieve settings. Please try again.".to_string()
            }
        }
    }

    async fn set_threshold(
        &self,
        recipient_id: RecipientId,
        arg: Option<String>,
        bound: Bound,
    ) -> String {
        let Some(raw) = arg else {
            return format!(
                "❌ Missing humidity value.\n\n\
                 Usage: /{} <value>\n\
                 Example: /{} {}\n\n\
                 Value must be between 0 and 100.",
                bound.command(),
                bound.command(),
                bound.example()
            );
        };

        let Ok(value) = raw.parse::<f64>() else {
            return format!(
                "❌ Invalid value format.\n\n\
                 Please provide a number between 0 and 100.\n\
                 Example: /{} {}",
                bound.command(),
                bound.example()
            );
        };

        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return "❌ Invalid value.\n\n\
                    Humidity must be between 0 and 100.\n\
                    Please try again."
                .to_string();
        }

        let recipient = match self.repo.get_recipient(recipient_id).await {
            Ok(Some(recipient)) => recipient,
            Ok(None) => {
                return "❌ User not found.\n\nPlease start the bot first with /start".to_string();
            }
            Err(err) => {
                error!(recipient = %recipient_id, error = %err, "threshold command failed");
                return "❌ Unable to update settings. Please try again.".to_string();
            }
        };

        let (new_min, new_max) = match bound {
            Bound::Min => (value, recipient.humidity_max),
            Bound::Max => (recipient.humidity_min, value),
        };

        let updated = match recipient.with_thresholds(new_min, new_max, OffsetDateTime::now_utc())
        {
            Ok(updated) => updated,
            Err(_) => {
                return match bound {
                    Bound::Min => format!(
                        "❌ Invalid value.\n\n\
                         Minimum ({value:.1}%) must be less than maximum ({max:.1}%).\n\
                         Current maximum: {max:.1}%\n\n\
                         Please set a lower minimum, or increase maximum first:\n\
                         /set_humidity_max <value>",
                        max = recipient.humidity_max
                    ),
                    Bound::Max => format!(
                        "❌ Invalid value.\n\n\
                         Maximum ({value:.1}%) must be greater than minimum ({min:.1}%).\n\
                         Current minimum: {min:.1}%\n\n\
                         Please set a higher maximum, or decrease minimum first:\n\
                         /set_humidity_min <value>",
                        min = recipient.humidity_min
                    ),
                };
            }
        };

        if let Err(err) = self.repo.update_recipient(&updated).await {
            error!(recipient = %recipient_id, error = %err, "threshold update failed");
            return "❌ Unable to update settings. Please try again.".to_string();
        }

        info!(
            recipient = %recipient_id,
            min = updated.humidity_min,
            max = updated.humidity_max,
            "thresholds updated"
        );
        format!(
            "✅ {} humidity threshold updated!\n\n\
             New settings:\n\
             • Minimum: {:.1}%\n\
             • Maximum: {:.1}%\n\n\
             {}",
            bound.label(),
            updated.humidity_min,
            updated.humidity_max,
            match bound {
                Bound::Min => format!(
                    "You'll now receive alerts when humidity falls below {value:.1}%."
                ),
                Bound::Max => format!(
                    "You'll now receive alerts when humidity rises above {value:.1}%."
                ),
            }
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Min,
    Max,
}

impl Bound {
    fn command(self) -> &'static str {
        match self {
            Self::Min => "set_humidity_min",
            Self::Max => "set_humidity_max",
        }
    }

    fn example(self) -> &'static str {
        match self {
            Self::Min => "35",
            Self::Max => "70",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Min => "Minimum",
            Self::Max => "Maximum",
        }
    }
}

fn help_text() -> String {
    "Home Humidity Bot - Help 📖\n\n\
     📊 Monitoring Commands:\n\
     /sensors or /status - Get current sensor readings\n\n\
     ⚙️ Configuration Commands:\n\
     /settings - View your humidity thresholds\n\
     /set_humidity_min <value> - Set minimum threshold (0-100)\n\
     /set_humidity_max <value> - Set maximum threshold (0-100)\n\n\
     ℹ️ Information:\n\
     /help - Show this message\n\
     /start - Initialize bot\n\n\
     🔔 Automatic Alerts:\n\
     You'll receive automatic notifications when:\n\
     • Humidity exceeds your maximum threshold\n\
     • Humidity falls below your minimum threshold\n\
     • Humidity returns to normal range\n\n\
     ⏱️ Alert cooldown: 5 minutes between similar alerts"
        .to_string()
}
