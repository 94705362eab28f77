//! Adsight Storage crate - SQLite persistence for conversations and messages.
//!
//! Provides a WAL-mode SQLite database with migrations and the SQLite
//! implementations of the conversation and message store traits.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{SqliteConversationStore, SqliteMessageStore};
