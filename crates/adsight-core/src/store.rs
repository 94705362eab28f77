//! Capability traits for the durable conversation and message stores.
//!
//! The chat core depends only on these operations. Implementations must be
//! safe for concurrent use across turns.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Conversation, Message, Role};

/// Durable record of conversation existence, ownership and timestamps.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Look up a conversation by its identifier.
    async fn find(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Create a conversation bound to `user_id`. Creating an id that already
    /// exists leaves the existing record untouched.
    async fn create(&self, conversation_id: &str, user_id: &str) -> Result<()>;

    /// Advance the conversation's `updated_at` to now. Never moves backwards.
    async fn touch(&self, conversation_id: &str) -> Result<()>;
}

/// Durable ordered log of messages per conversation.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Up to `limit` most recent messages, newest first.
    async fn recent(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// Append a message and return the stored record.
    async fn append(&self, conversation_id: &str, role: Role, content: &str) -> Result<Message>;
}
