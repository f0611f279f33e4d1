//! Local data persistence for the hygrobot humidity monitor.
//!
//! This crate provides SQLite-based storage for registered recipients, their
//! per-recipient alert states, and the append-only reading history.
//!
//! # Example
//!
//! ```no_run
//! use hygrobot_store::Store;
//!
//! let store = Store::open_default()?;
//! let recent = store.recent_readings(60, 100)?;
//! println!("{} readings in the last hour", recent.len());
//! # Ok::<(), hygrobot_store::Error>(())
//! ```

mod error;
mod schema;
mod store;

pub use error::{Error, Result};
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/hygrobot/data.db`
/// - macOS: `~/Library/Application Support/hygrobot/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\hygrobot\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("hygrobot")
        .join("data.db")
}
