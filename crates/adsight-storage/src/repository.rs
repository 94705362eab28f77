//! SQLite implementations of the conversation and message stores.
//!
//! Each store owns an `Arc<Database>`; the async trait methods hop onto the
//! blocking pool so that rusqlite calls never stall the runtime.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use adsight_core::error::{AdsightError, Result};
use adsight_core::store::{ConversationStore, MessageStore};
use adsight_core::types::{Conversation, Message, Role};

use crate::db::Database;

/// Run `f` against the database on the blocking thread pool.
async fn blocking<F, T>(db: &Arc<Database>, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || db.with_conn(f))
        .await
        .map_err(|e| AdsightError::Storage(format!("Storage task failed: {}", e)))?
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| AdsightError::Storage(format!("Invalid timestamp: {}", millis)))
}

/// Conversation records keyed by the caller-supplied conversation id.
#[derive(Debug, Clone)]
pub struct SqliteConversationStore {
    db: Arc<Database>,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn find(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let id = conversation_id.to_string();
        blocking(&self.db, move |conn| {
            let row = conn
                .query_row(
                    "SELECT conversation_id, user_id, created_at, updated_at
                     FROM conversations WHERE conversation_id = ?1",
                    rusqlite::params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| AdsightError::Storage(format!("Failed to load conversation: {}", e)))?;

            match row {
                Some((id, user_id, created_at, updated_at)) => Ok(Some(Conversation {
                    id,
                    user_id,
                    created_at: millis_to_datetime(created_at)?,
                    updated_at: millis_to_datetime(updated_at)?,
                })),
                None => Ok(None),
            }
        })
        .await
    }

    async fn create(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        let id = conversation_id.to_string();
        let user_id = user_id.to_string();
        blocking(&self.db, move |conn| {
            let now = Utc::now().timestamp_millis();
            conn.execute(
                "INSERT OR IGNORE INTO conversations (conversation_id, user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                rusqlite::params![id, user_id, now],
            )
            .map_err(|e| AdsightError::Storage(format!("Failed to create conversation: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn touch(&self, conversation_id: &str) -> Result<()> {
        let id = conversation_id.to_string();
        blocking(&self.db, move |conn| {
            let now = Utc::now().timestamp_millis();
            conn.execute(
                "UPDATE conversations SET updated_at = MAX(updated_at, ?2)
                 WHERE conversation_id = ?1",
                rusqlite::params![id, now],
            )
            .map_err(|e| AdsightError::Storage(format!("Failed to touch conversation: {}", e)))?;
            Ok(())
        })
        .await
    }
}

/// Append-only message log.
#[derive(Debug, Clone)]
pub struct SqliteMessageStore {
    db: Arc<Database>,
}

impl SqliteMessageStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn recent(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        let id = conversation_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        blocking(&self.db, move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT message_id, conversation_id, role, content, created_at
                     FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?2",
                )
                .map_err(|e| AdsightError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![id, limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })
                .map_err(|e| AdsightError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let (message_id, conversation_id, role, content, created_at) =
                    row.map_err(|e| AdsightError::Storage(e.to_string()))?;
                messages.push(Message {
                    id: Uuid::parse_str(&message_id)
                        .map_err(|e| AdsightError::Storage(format!("Invalid message id: {}", e)))?,
                    conversation_id,
                    role: role.parse()?,
                    content,
                    created_at: millis_to_datetime(created_at)?,
                });
            }
            Ok(messages)
        })
        .await
    }

    async fn append(&self, conversation_id: &str, role: Role, content: &str) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        blocking(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO messages (message_id, conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    message.id.to_string(),
                    message.conversation_id,
                    message.role.as_str(),
                    message.content,
                    message.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| AdsightError::Storage(format!("Failed to append message: {}", e)))?;
            Ok(message)
        })
        .await
    }
}
