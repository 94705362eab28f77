//! SQL generator: turns a question plus history into warehouse SQL, or
//! recognizes that the question is outside the analytics domain.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use adsight_core::backend::CompletionBackend;
use adsight_core::cancel::CancelToken;
use adsight_core::config::TableSchema;
use adsight_core::types::HistoryEntry;

use crate::error::ChatError;
use crate::prompt;

/// What the generator produced for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlOutcome {
    /// SQL text, trimmed and otherwise passed through unchanged.
    Sql(String),
    /// The question cannot be answered from the warehouse.
    OutOfDomain,
}

/// Classify raw generator output.
pub fn classify(text: &str) -> SqlOutcome {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case(prompt::OUT_OF_DOMAIN_SENTINEL) {
        SqlOutcome::OutOfDomain
    } else {
        SqlOutcome::Sql(trimmed.to_string())
    }
}

pub struct SqlGenerator {
    backend: Arc<dyn CompletionBackend>,
    tables: Vec<TableSchema>,
    lookback_days: u32,
}

impl SqlGenerator {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        tables: Vec<TableSchema>,
        lookback_days: u32,
    ) -> Self {
        Self {
            backend,
            tables,
            lookback_days,
        }
    }

    pub async fn generate(
        &self,
        question: &str,
        history: &[HistoryEntry],
        cancel: &CancelToken,
    ) -> Result<SqlOutcome, ChatError> {
        let system =
            prompt::sql_system_prompt(&self.tables, self.lookback_days, Utc::now().date_naive());
        let mut messages = history.to_vec();
        messages.push(HistoryEntry::user(question));

        debug!(history = history.len(), "Generating SQL");
        let text = tokio::select! {
            biased;
            reason = cancel.cancelled() => return Err(ChatError::Cancelled(reason)),
            result = self.backend.complete(&system, &messages) => {
                result.map_err(|e| ChatError::SqlGeneration(e.to_string()))?
            }
        };

        let outcome = classify(&text);
        match &outcome {
            SqlOutcome::Sql(sql) => info!(sql = %sql, "Generated SQL"),
            SqlOutcome::OutOfDomain => info!("Question is outside the analytics domain"),
        }
        Ok(outcome)
    }
}
