//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use voice_order_config::Settings;

use crate::connection::ConnectionServices;
use crate::registry::ConnectionRegistry;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<Settings>,
    /// Live connections
    pub connections: Arc<ConnectionRegistry>,
    /// Backends, arbiter, dialogue and persistence shared by connections
    pub services: Arc<ConnectionServices>,
}

impl AppState {
    pub fn new(config: Settings, services: ConnectionServices) -> Self {
        let connections = ConnectionRegistry::new(config.server.max_connections);
        Self {
            config: Arc::new(config),
            connections,
            services: Arc::new(services),
        }
    }
}
