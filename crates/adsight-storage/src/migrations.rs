//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use adsight_core::error::AdsightError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), AdsightError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| AdsightError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| AdsightError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: conversations");
    }

    Ok(())
}

/// Version 1: conversations and messages. Timestamps are Unix millis.
fn apply_v1(conn: &Connection) -> Result<(), AdsightError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            conversation_id TEXT PRIMARY KEY NOT NULL,
            user_id         TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations (user_id, updated_at DESC);

        CREATE TABLE IF NOT EXISTS messages (
            message_id      TEXT PRIMARY KEY NOT NULL,
            conversation_id TEXT NOT NULL,
            role            TEXT NOT NULL
                            CHECK (role IN ('user', 'assistant')),
            content         TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            FOREIGN KEY (conversation_id)
                REFERENCES conversations(conversation_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages (conversation_id, created_at DESC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'conversations');
        ",
    )
    .map_err(|e| AdsightError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
