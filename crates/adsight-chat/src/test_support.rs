//! Scripted in-memory collaborators for exercising the turn pipeline.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use adsight_core::backend::{CompletionBackend, QueryBackend};
use adsight_core::error::{AdsightError, Result};
use adsight_core::store::{ConversationStore, MessageStore};
use adsight_core::types::{
    Conversation, HistoryEntry, Message, QueryHandle, QueryState, QueryStatus, ResultRows, Role,
};

use crate::sink::{ChatEvent, EventSink, SinkClosed};

// =============================================================================
// Stores
// =============================================================================

/// Conversation and message store sharing one operation log.
#[derive(Default)]
pub struct MemoryStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    messages: Mutex<Vec<Message>>,
    ops: Mutex<Vec<String>>,
    pub fail_append: Mutex<bool>,
    /// Fail appends of this role only.
    pub fail_append_role: Mutex<Option<Role>>,
    stall_find: bool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store whose `find` never returns.
    pub fn stalling() -> Arc<Self> {
        Arc::new(Self {
            stall_find: true,
            ..Self::default()
        })
    }

    /// Store operations in call order, e.g. `create:c1`, `append:user`.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }

    pub fn stored(&self, conversation_id: &str) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Seed a message without recording an operation.
    pub fn seed(&self, conversation_id: &str, role: Role, content: &str) {
        self.messages.lock().unwrap().push(Message {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
    }

    fn log(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        self.log(format!("find:{conversation_id}"));
        if self.stall_find {
            std::future::pending::<()>().await;
        }
        Ok(self.conversations.lock().unwrap().get(conversation_id).cloned())
    }

    async fn create(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.log(format!("create:{conversation_id}"));
        let now = Utc::now();
        self.conversations
            .lock()
            .unwrap()
            .entry(conversation_id.to_string())
            .or_insert_with(|| Conversation {
                id: conversation_id.to_string(),
                user_id: user_id.to_string(),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn touch(&self, conversation_id: &str) -> Result<()> {
        self.log(format!("touch:{conversation_id}"));
        if let Some(c) = self.conversations.lock().unwrap().get_mut(conversation_id) {
            c.updated_at = c.updated_at.max(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn recent(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        self.log(format!("recent:{conversation_id}"));
        let mut matching = self.stored(conversation_id);
        matching.reverse();
        matching.truncate(limit);
        Ok(matching)
    }

    async fn append(&self, conversation_id: &str, role: Role, content: &str) -> Result<Message> {
        if *self.fail_append.lock().unwrap() || *self.fail_append_role.lock().unwrap() == Some(role)
        {
            return Err(AdsightError::Storage("disk I/O error".into()));
        }
        self.log(format!("append:{role}"));
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }
}

// =============================================================================
// Completion backend
// =============================================================================

/// How the streaming call behaves.
#[derive(Clone)]
pub enum StreamScript {
    /// Emit each chunk, then finish.
    Chunks(Vec<&'static str>),
    /// Emit the chunks, then fail.
    FailAfter(Vec<&'static str>),
    /// Never finish.
    Hang,
}

/// Completion backend answering from a script and recording its inputs.
pub struct ScriptedCompletion {
    sql_reply: std::result::Result<String, String>,
    stream: StreamScript,
    pub complete_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub last_stream_messages: Mutex<Vec<HistoryEntry>>,
    pub last_complete_messages: Mutex<Vec<HistoryEntry>>,
}

impl ScriptedCompletion {
    pub fn new(sql_reply: &str, stream: StreamScript) -> Arc<Self> {
        Arc::new(Self::build(Ok(sql_reply.to_string()), stream))
    }

    pub fn failing_sql() -> Arc<Self> {
        Arc::new(Self::build(
            Err("model unavailable".to_string()),
            StreamScript::Chunks(vec![]),
        ))
    }

    fn build(sql_reply: std::result::Result<String, String>, stream: StreamScript) -> Self {
        Self {
            sql_reply,
            stream,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            last_stream_messages: Mutex::new(Vec::new()),
            last_complete_messages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedCompletion {
    async fn complete(&self, _system_prompt: &str, messages: &[HistoryEntry]) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_complete_messages.lock().unwrap() = messages.to_vec();
        self.sql_reply.clone().map_err(AdsightError::Backend)
    }

    async fn complete_stream(
        &self,
        _system_prompt: &str,
        messages: &[HistoryEntry],
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_stream_messages.lock().unwrap() = messages.to_vec();
        match &self.stream {
            StreamScript::Chunks(chunks) => {
                for chunk in chunks {
                    on_chunk(chunk);
                    tokio::task::yield_now().await;
                }
                Ok(chunks.concat())
            }
            StreamScript::FailAfter(chunks) => {
                for chunk in chunks {
                    on_chunk(chunk);
                }
                Err(AdsightError::Backend("stream reset by peer".into()))
            }
            StreamScript::Hang => {
                std::future::pending::<()>().await;
                Ok(String::new())
            }
        }
    }
}

// =============================================================================
// Query backend
// =============================================================================

/// Warehouse that walks through a fixed sequence of states.
pub struct ScriptedWarehouse {
    states: Mutex<VecDeque<QueryStatus>>,
    rows: ResultRows,
    pub submitted: Mutex<Vec<String>>,
    pub status_calls: AtomicUsize,
    pub stopped: Mutex<Vec<QueryHandle>>,
    fail_submit: bool,
}

impl ScriptedWarehouse {
    /// Reports each state in turn; the last one repeats forever.
    pub fn new(states: Vec<QueryStatus>, rows: ResultRows) -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(states.into()),
            rows,
            submitted: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            stopped: Mutex::new(Vec::new()),
            fail_submit: false,
        })
    }

    pub fn succeeding(rows: ResultRows) -> Arc<Self> {
        Self::new(
            vec![
                QueryStatus::new(QueryState::Queued),
                QueryStatus::new(QueryState::Running),
                QueryStatus::new(QueryState::Succeeded),
            ],
            rows,
        )
    }

    pub fn running_forever() -> Arc<Self> {
        Self::new(vec![QueryStatus::new(QueryState::Running)], Vec::new())
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            fail_submit: true,
            ..Arc::into_inner(Self::running_forever()).unwrap()
        })
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryBackend for ScriptedWarehouse {
    async fn submit(&self, sql: &str) -> Result<QueryHandle> {
        if self.fail_submit {
            return Err(AdsightError::Backend("connection refused".into()));
        }
        self.submitted.lock().unwrap().push(sql.to_string());
        Ok(QueryHandle("q-1".to_string()))
    }

    async fn status(&self, _handle: &QueryHandle) -> Result<QueryStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut states = self.states.lock().unwrap();
        let status = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().cloned()
        };
        status.ok_or_else(|| AdsightError::Backend("no scripted state".into()))
    }

    async fn fetch(&self, _handle: &QueryHandle) -> Result<ResultRows> {
        Ok(self.rows.clone())
    }

    async fn stop(&self, handle: &QueryHandle) -> Result<()> {
        self.stopped.lock().unwrap().push(handle.clone());
        Ok(())
    }
}

/// Build a result set from string literals; `"NULL"` becomes a null cell.
pub fn rows(table: &[&[&str]]) -> ResultRows {
    table
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| (*cell != "NULL").then(|| cell.to_string()))
                .collect()
        })
        .collect()
}

// =============================================================================
// Sink
// =============================================================================

/// Sink that records events and can be told to reject some chunk sends.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ChatEvent>>>,
    attempts: Arc<AtomicUsize>,
    reject_every: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every `n`th send attempt (1-based).
    pub fn rejecting_every(n: usize) -> Self {
        Self {
            reject_every: Some(n),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn send(&self, event: ChatEvent) -> std::result::Result<(), SinkClosed> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(n) = self.reject_every {
            if attempt % n == 0 && !event.is_terminal() {
                return Err(SinkClosed);
            }
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub const POLL: Duration = Duration::from_millis(500);
