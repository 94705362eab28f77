//! Capability traits for the remote inference and warehouse services.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{HistoryEntry, QueryHandle, QueryStatus, ResultRows};

/// Text generation backend used for both SQL generation and answers.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// One-shot completion. Returns the full generated text.
    async fn complete(&self, system_prompt: &str, messages: &[HistoryEntry]) -> Result<String>;

    /// Token-streamed completion. `on_chunk` is invoked for every text delta
    /// in arrival order; the full text is returned once the stream ends.
    async fn complete_stream(
        &self,
        system_prompt: &str,
        messages: &[HistoryEntry],
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String>;
}

/// Analytical query engine.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Submit a statement; returns immediately with an execution handle.
    async fn submit(&self, sql: &str) -> Result<QueryHandle>;

    /// Current state of a submitted statement.
    async fn status(&self, handle: &QueryHandle) -> Result<QueryStatus>;

    /// Result rows of a succeeded statement, header row first.
    async fn fetch(&self, handle: &QueryHandle) -> Result<ResultRows>;

    /// Ask the engine to stop a running statement.
    async fn stop(&self, handle: &QueryHandle) -> Result<()>;
}
