//! Application state shared across all route handlers.

use std::collections::HashMap;
use std::sync::Arc;

use adsight_chat::TurnDispatcher;
use adsight_core::config::AppConfig;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Runs chat turns on the worker pool.
    pub dispatcher: TurnDispatcher,
    /// Bearer token -> user id.
    pub tokens: Arc<HashMap<String, String>>,
    /// Longest accepted chat message, in characters.
    pub max_message_chars: usize,
    /// Port the server is configured for, used for CORS origins.
    pub port: u16,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        dispatcher: TurnDispatcher,
        tokens: HashMap<String, String>,
    ) -> Self {
        Self {
            dispatcher,
            tokens: Arc::new(tokens),
            max_message_chars: config.server.max_message_chars,
            port: config.server.port,
        }
    }

    /// The user a bearer token belongs to.
    pub fn caller_for(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }
}
