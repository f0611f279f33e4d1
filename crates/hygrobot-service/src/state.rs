//! Shared application state.

use std::sync::Arc;

use hygrobot_core::{CommandRouter, LinkReader, Repository};

/// State shared across all HTTP handlers.
pub struct AppState {
    /// Persistent storage.
    pub repo: Arc<dyn Repository>,
    /// Live sensor link.
    pub reader: Arc<LinkReader>,
    /// Chat command dispatcher backing `/api/command`.
    pub router: CommandRouter,
    /// A current reading older than this counts as stale.
    pub stale_after_seconds: u64,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        reader: Arc<LinkReader>,
        stale_after_seconds: u64,
    ) -> Arc<Self> {
        let router = CommandRouter::new(Arc::clone(&repo), Arc::clone(&reader));
        Arc::new(Self {
            repo,
            reader,
            router,
            stale_after_seconds,
        })
    }
}
