//! Application state for the Axum server.

use std::sync::Arc;

use crate::service::BackgroundRemovalService;

/// Shared application state accessible from all route handlers.
#[derive(Debug)]
pub struct AppState {
    pub service: BackgroundRemovalService,
}

impl AppState {
    /// Wrap a service in shareable application state.
    pub fn new(service: BackgroundRemovalService) -> Arc<Self> {
        Arc::new(Self { service })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.service.uptime().as_secs()
    }
}
