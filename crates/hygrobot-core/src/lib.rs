//! Core library for the hygrobot humidity monitor.
//!
//! This crate holds everything between the serial port and the chat
//! transport: frame parsing, the reconnecting link reader, the threshold
//! alert engine, the background monitoring loop, and the chat command
//! router. Storage and message delivery hide behind the [`Repository`] and
//! [`Messenger`] traits so the pipeline runs identically against SQLite and
//! a webhook in production or in-memory doubles in tests.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hygrobot_core::{
//!     AlertEngine, LinkConfig, LinkReader, MemoryRepository, Monitor, MonitorConfig,
//!     SerialTransport,
//! };
//! use hygrobot_core::messenger::MockMessenger;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let repo = Arc::new(MemoryRepository::new());
//!     let messenger = Arc::new(MockMessenger::new());
//!     let reader = Arc::new(LinkReader::new(
//!         Arc::new(SerialTransport),
//!         LinkConfig::default(),
//!     ));
//!
//!     let engine = AlertEngine::new(repo.clone(), messenger.clone());
//!     let monitor = Monitor::new(reader, engine, repo, messenger, MonitorConfig::default());
//!     monitor.run(CancellationToken::new()).await;
//! }
//! ```

pub mod alerts;
pub mod commands;
pub mod error;
pub mod link;
pub mod messenger;
pub mod monitor;
pub mod parse;
pub mod ratelimit;
pub mod repository;
pub mod threshold;

pub use alerts::{AlertEngine, AlertKind, DEFAULT_COOLDOWN};
pub use commands::{Command, CommandRouter};
pub use error::{Error, Result};
pub use link::{
    LinkConfig, LinkPort, LinkReader, LinkState, LinkTransport, MockTransport, SerialTransport,
};
pub use messenger::{Messenger, MockMessenger, SendError};
pub use monitor::{Monitor, MonitorConfig};
pub use parse::parse_frame;
pub use ratelimit::RateLimiter;
pub use repository::{MemoryRepository, Repository};
pub use threshold::classify;
