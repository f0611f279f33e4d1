//! Monitoring service and HTTP REST API for the hygrobot humidity monitor.
//!
//! This crate provides a service that:
//! - Reads the humidity sensor over the serial link and stores readings
//! - Sends threshold alerts through a webhook (or the log)
//! - Exposes a REST API for tools querying sensor data
//! - Optional API key authentication
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check (no auth required)
//! - `GET /api/current?recipient_id=` - Latest reading with freshness status
//! - `GET /api/readings/recent?recipient_id=&minutes=&limit=` - Windowed history
//! - `PUT /api/recipients/{id}/thresholds/min` - Set the lower humidity bound
//! - `PUT /api/recipients/{id}/thresholds/max` - Set the upper humidity bound
//! - `POST /api/command` - Run a chat command and get the reply
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/hygrobot/service.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! stale_after_seconds = 10
//!
//! [link]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//!
//! [storage]
//! path = "~/.local/share/hygrobot/data.db"
//!
//! [alerts]
//! cooldown_seconds = 300
//!
//! [webhook]
//! url = "https://example.com/notify"
//! ```
//!
//! # Security
//!
//! Optional API key authentication (all routes except `/api/health`):
//!
//! ```toml
//! [security]
//! api_key = "your-secure-random-key-at-least-16-chars"
//! ```

pub mod api;
pub mod config;
pub mod messenger;
pub mod middleware;
pub mod repo;
pub mod state;

pub use config::{
    AlertsConfig, Config, ConfigError, LinkSettings, RetentionConfig, SecurityConfig,
    ServerConfig, StorageConfig, WebhookConfig,
};
pub use state::AppState;
