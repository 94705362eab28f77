//! Query executor: submits SQL to the warehouse, polls until the statement
//! finishes, and renders the result set as plain text for the answer prompt.
//!
//! Polling has no attempt ceiling of its own. The turn's cancel token (its
//! deadline or a client disconnect) ends a runaway poll, after which the
//! statement is stopped on a best-effort basis.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use adsight_core::backend::QueryBackend;
use adsight_core::cancel::{CancelReason, CancelToken};
use adsight_core::types::{QueryHandle, QueryState, ResultRows};

use crate::error::ChatError;
use crate::prompt::NO_RESULTS_MARKER;

pub struct QueryExecutor {
    backend: Arc<dyn QueryBackend>,
    poll_interval: Duration,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn QueryBackend>, poll_interval: Duration) -> Self {
        Self {
            backend,
            poll_interval,
        }
    }

    /// Run `sql` to completion and return the rendered evidence text.
    pub async fn execute(&self, sql: &str, cancel: &CancelToken) -> Result<String, ChatError> {
        let handle = tokio::select! {
            biased;
            reason = cancel.cancelled() => return Err(ChatError::Cancelled(reason)),
            result = self.backend.submit(sql) => result.map_err(query_failed)?,
        };
        info!(query_execution_id = %handle, "Query submitted");

        self.wait_for_completion(&handle, cancel).await?;

        let rows = tokio::select! {
            biased;
            reason = cancel.cancelled() => return Err(ChatError::Cancelled(reason)),
            result = self.backend.fetch(&handle) => result.map_err(query_failed)?,
        };
        info!(
            query_execution_id = %handle,
            rows = rows.len().saturating_sub(1),
            "Query completed"
        );
        Ok(render_rows(&rows))
    }

    async fn wait_for_completion(
        &self,
        handle: &QueryHandle,
        cancel: &CancelToken,
    ) -> Result<(), ChatError> {
        loop {
            let status = tokio::select! {
                biased;
                reason = cancel.cancelled() => return Err(self.abandon(handle, reason).await),
                result = self.backend.status(handle) => result.map_err(query_failed)?,
            };
            debug!(query_execution_id = %handle, state = ?status.state, "Query status");

            match status.state {
                QueryState::Succeeded => return Ok(()),
                QueryState::Failed | QueryState::Cancelled => {
                    let reason = status
                        .reason
                        .unwrap_or_else(|| format!("query ended in state {:?}", status.state));
                    error!(query_execution_id = %handle, reason = %reason, "Query failed");
                    return Err(ChatError::QueryFailed { reason });
                }
                QueryState::Queued | QueryState::Running => {}
            }

            tokio::select! {
                biased;
                reason = cancel.cancelled() => return Err(self.abandon(handle, reason).await),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Best-effort stop of an abandoned statement.
    async fn abandon(&self, handle: &QueryHandle, reason: CancelReason) -> ChatError {
        warn!(query_execution_id = %handle, reason = ?reason, "Stopping abandoned query");
        if let Err(e) = self.backend.stop(handle).await {
            warn!(query_execution_id = %handle, error = %e, "Failed to stop query");
        }
        ChatError::Cancelled(reason)
    }
}

fn query_failed(err: adsight_core::error::AdsightError) -> ChatError {
    error!(error = %err, "Warehouse request failed");
    ChatError::QueryFailed {
        reason: err.to_string(),
    }
}

/// Render a result set as one `{col: value, ...}` line per data row.
///
/// Row 0 is the header. Null and missing cells render as `null`. A result
/// with no data rows renders as [`NO_RESULTS_MARKER`].
pub fn render_rows(rows: &ResultRows) -> String {
    let Some((header, data)) = rows.split_first() else {
        return NO_RESULTS_MARKER.to_string();
    };
    if data.is_empty() {
        return NO_RESULTS_MARKER.to_string();
    }

    let names: Vec<&str> = header
        .iter()
        .map(|cell| cell.as_deref().unwrap_or("null"))
        .collect();

    data.iter()
        .map(|row| {
            let fields: Vec<String> = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = row.get(i).and_then(|c| c.as_deref()).unwrap_or("null");
                    format!("{}: {}", name, value)
                })
                .collect();
            format!("{{{}}}", fields.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
