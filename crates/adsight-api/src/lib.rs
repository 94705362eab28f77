//! Adsight API crate - axum HTTP server, bearer auth, SSE chat streaming.
//!
//! Exposes the liveness probe and the streaming chat endpoint. Errors that
//! happen before a stream opens use a JSON envelope; errors after it opens
//! arrive as a named `error` event.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
