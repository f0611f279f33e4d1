//! Service configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// API security settings.
    pub security: SecurityConfig,
    /// Sensor link settings.
    pub link: LinkSettings,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Alerting settings.
    pub alerts: AlertsConfig,
    /// Outbound webhook settings.
    pub webhook: WebhookConfig,
    /// Reading retention settings.
    pub retention: RetentionConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// Checked before any background task starts, so a misconfigured
    /// service fails at startup instead of mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.security.validate());
        errors.extend(self.link.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.alerts.validate());
        errors.extend(self.webhook.validate());
        errors.extend(self.retention.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
    /// A current reading older than this counts as stale.
    pub stale_after_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            stale_after_seconds: 10,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
        } else {
            let parts: Vec<&str> = self.bind.rsplitn(2, ':').collect();
            if parts.len() != 2 {
                errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                });
            } else {
                match parts[0].parse::<u16>() {
                    Ok(0) => errors.push(ValidationError {
                        field: "server.bind".to_string(),
                        message: "port cannot be 0".to_string(),
                    }),
                    Err(_) => errors.push(ValidationError {
                        field: "server.bind".to_string(),
                        message: format!(
                            "invalid port '{}': must be a number 1-65535",
                            parts[0]
                        ),
                    }),
                    Ok(_) => {}
                }
            }
        }

        if self.stale_after_seconds == 0 {
            errors.push(ValidationError {
                field: "server.stale_after_seconds".to_string(),
                message: "stale threshold must be at least 1 second".to_string(),
            });
        }

        errors
    }
}

/// Minimum length for a configured API key.
pub const MIN_API_KEY_LENGTH: usize = 16;

/// API security configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// When set, every route except `/api/health` requires this key in the
    /// `X-API-Key` header.
    pub api_key: Option<String>,
}

impl SecurityConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(key) = &self.api_key
            && key.len() < MIN_API_KEY_LENGTH
        {
            errors.push(ValidationError {
                field: "security.api_key".to_string(),
                message: format!(
                    "API key is too short (minimum {MIN_API_KEY_LENGTH} characters)"
                ),
            });
        }

        errors
    }
}

/// Sensor link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Serial device node path.
    pub port: String,
    /// Baud rate the host configures the port with.
    pub baud_rate: u32,
    /// Frame read timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            timeout_secs: 2,
        }
    }
}

impl LinkSettings {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.port.is_empty() {
            errors.push(ValidationError {
                field: "link.port".to_string(),
                message: "serial port path cannot be empty".to_string(),
            });
        }
        if !matches!(self.baud_rate, 9600 | 19200 | 38400 | 57600 | 115200) {
            errors.push(ValidationError {
                field: "link.baud_rate".to_string(),
                message: format!(
                    "unsupported baud rate {}: expected one of 9600, 19200, 38400, 57600, 115200",
                    self.baud_rate
                ),
            });
        }
        if self.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "link.timeout_secs".to_string(),
                message: "read timeout must be at least 1 second".to_string(),
            });
        }

        errors
    }

    /// Convert into the core link configuration.
    pub fn to_link_config(&self) -> hygrobot_core::LinkConfig {
        hygrobot_core::LinkConfig {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            timeout: std::time::Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: hygrobot_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Alerting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Minimum spacing between repeated alerts for the same state.
    pub cooldown_seconds: u64,
    /// Monitoring loop cadence in seconds.
    pub tick_seconds: u64,
    /// Pause after an unexpected monitoring error in seconds.
    pub error_pause_seconds: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 300,
            tick_seconds: 1,
            error_pause_seconds: 5,
        }
    }
}

impl AlertsConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("alerts.cooldown_seconds", self.cooldown_seconds),
            ("alerts.tick_seconds", self.tick_seconds),
            ("alerts.error_pause_seconds", self.error_pause_seconds),
        ] {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: "must be at least 1 second".to_string(),
                });
            }
        }

        errors
    }
}

/// Outbound webhook configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Where notifications are POSTed. When unset, notifications only go to
    /// the log.
    pub url: Option<String>,
}

impl WebhookConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(url) = &self.url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "webhook.url".to_string(),
                message: format!("invalid webhook url '{url}': expected http(s) scheme"),
            });
        }

        errors
    }
}

/// Reading retention configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Readings older than this many days are purged once a day.
    /// When unset, history grows without bound.
    pub days: Option<u32>,
}

impl RetentionConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.days == Some(0) {
            errors.push(ValidationError {
                field: "retention.days".to_string(),
                message: "retention must be at least 1 day (omit to keep everything)".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hygrobot")
        .join("service.toml")
}
