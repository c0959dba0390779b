//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::ConnectionSettings;
use crate::hub::Hub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the subscription hub.
    pub hub: Hub,
    /// Settings handed to every new connection.
    pub connection: Arc<ConnectionSettings>,
}

impl AppState {
    /// Bundles a hub handle with connection settings.
    #[must_use]
    pub fn new(hub: Hub, connection: ConnectionSettings) -> Self {
        Self {
            hub,
            connection: Arc::new(connection),
        }
    }
}
