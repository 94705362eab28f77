//! History window: the bounded, chronological slice of prior messages the
//! generators see.

use adsight_core::store::MessageStore;
use adsight_core::types::{HistoryEntry, Message};

use crate::error::ChatError;

/// Turn a newest-first batch of messages into at most `limit` entries in
/// chronological order.
pub fn window(mut newest_first: Vec<Message>, limit: usize) -> Vec<HistoryEntry> {
    newest_first.truncate(limit);
    newest_first.reverse();
    newest_first.into_iter().map(HistoryEntry::from).collect()
}

/// Load the history window for a conversation.
pub async fn load(
    messages: &dyn MessageStore,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<HistoryEntry>, ChatError> {
    let recent = messages.recent(conversation_id, limit).await?;
    Ok(window(recent, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsight_core::types::Role;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn message(i: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: "c1".to_string(),
            role: if i % 2 == 0 { Role::User } else { Role::Assistant },
            content: format!("m{i}"),
            created_at: Utc::now() + Duration::seconds(i),
        }
    }

    #[test]
    fn test_window_reverses_into_chronological_order() {
        let newest_first = vec![message(2), message(1), message(0)];
        let entries = window(newest_first, 10);
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, ["m0", "m1", "m2"]);
        assert_eq!(entries[0].role, Role::User);
    }

    #[test]
    fn test_window_truncates_oversized_batches() {
        let newest_first: Vec<Message> = (0..15).rev().map(message).collect();
        let entries = window(newest_first, 10);
        assert_eq!(entries.len(), 10);
        assert_eq!(entries.first().unwrap().content, "m5");
        assert_eq!(entries.last().unwrap().content, "m14");
    }

    #[test]
    fn test_window_empty() {
        assert!(window(Vec::new(), 10).is_empty());
    }
}
