//! Shared kernel for adsight: domain types, configuration, errors, the
//! capability traits for stores and remote backends, and turn cancellation.

pub mod backend;
pub mod cancel;
pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use backend::{CompletionBackend, QueryBackend};
pub use cancel::{CancelHandle, CancelReason, CancelToken};
pub use config::AppConfig;
pub use error::{AdsightError, ErrorCode, Result};
pub use store::{ConversationStore, MessageStore};
pub use types::*;
