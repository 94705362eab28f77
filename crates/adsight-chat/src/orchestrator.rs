//! Turn orchestrator: drives one chat turn through its states and
//! guarantees that the caller sees exactly one terminal event.
//!
//! Writes happen only after the answer streamed successfully, so a failed
//! turn persists nothing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use adsight_core::backend::{CompletionBackend, QueryBackend};
use adsight_core::cancel::{CancelReason, CancelToken};
use adsight_core::config::AppConfig;
use adsight_core::store::{ConversationStore, MessageStore};
use adsight_core::types::{Role, TurnRequest};

use crate::error::ChatError;
use crate::executor::QueryExecutor;
use crate::generator::{SqlGenerator, SqlOutcome};
use crate::history;
use crate::prompt::OUT_OF_DOMAIN_NOTE;
use crate::sink::{ChatEvent, EventSink};
use crate::state::{TurnState, TurnTracker};
use crate::streamer::AnswerStreamer;

/// Per-turn tunables.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Messages loaded into the history window.
    pub history_limit: usize,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self { history_limit: 10 }
    }
}

pub struct TurnOrchestrator {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    generator: SqlGenerator,
    executor: QueryExecutor,
    streamer: AnswerStreamer,
    options: TurnOptions,
}

impl TurnOrchestrator {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        generator: SqlGenerator,
        executor: QueryExecutor,
        streamer: AnswerStreamer,
        options: TurnOptions,
    ) -> Self {
        Self {
            conversations,
            messages,
            generator,
            executor,
            streamer,
            options,
        }
    }

    /// Wire an orchestrator from configuration and its collaborators.
    pub fn from_config(
        config: &AppConfig,
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        completion: Arc<dyn CompletionBackend>,
        warehouse: Arc<dyn QueryBackend>,
    ) -> Self {
        Self::new(
            conversations,
            messages,
            SqlGenerator::new(
                Arc::clone(&completion),
                config.warehouse.tables.clone(),
                config.chat.default_lookback_days,
            ),
            QueryExecutor::new(
                warehouse,
                Duration::from_millis(config.warehouse.poll_interval_ms),
            ),
            AnswerStreamer::new(completion),
            TurnOptions {
                history_limit: config.chat.history_limit,
            },
        )
    }

    /// Run one turn to completion. The sink is consumed by the terminal
    /// event; the returned state is `Done` or `Error`.
    pub async fn run<S: EventSink>(
        &self,
        request: TurnRequest,
        sink: S,
        cancel: CancelToken,
    ) -> TurnState {
        let mut tracker = TurnTracker::new(&request.conversation_id);

        match self.drive(&request, &sink, &cancel, &mut tracker).await {
            Ok(()) => {
                info!(conversation_id = %request.conversation_id, "Turn completed");
                finish(sink, ChatEvent::Done);
            }
            Err(e) => {
                let failed_in = tracker.state();
                tracker.fail();
                match (&e, e.code()) {
                    (ChatError::Cancelled(CancelReason::Cancelled), _) => warn!(
                        conversation_id = %request.conversation_id,
                        state = %failed_in,
                        "Turn abandoned by caller"
                    ),
                    (_, Some(code)) => error!(
                        conversation_id = %request.conversation_id,
                        state = %failed_in,
                        code = %code,
                        error = %e,
                        "Turn failed"
                    ),
                    (_, None) => error!(
                        conversation_id = %request.conversation_id,
                        state = %failed_in,
                        error = %e,
                        "Unexpected turn failure"
                    ),
                }
                finish(sink, ChatEvent::Error(e.user_message().to_string()));
            }
        }

        tracker.state()
    }

    async fn drive(
        &self,
        request: &TurnRequest,
        sink: &dyn EventSink,
        cancel: &CancelToken,
        tracker: &mut TurnTracker,
    ) -> Result<(), ChatError> {
        let conversation_id = request.conversation_id.as_str();

        tracker.advance(TurnState::EnsureConversation)?;
        checkpoint(cancel)?;
        if self.conversations.find(conversation_id).await?.is_none() {
            self.conversations
                .create(conversation_id, &request.user_id)
                .await?;
            info!(conversation_id, user_id = %request.user_id, "Conversation created");
        }

        tracker.advance(TurnState::LoadHistory)?;
        checkpoint(cancel)?;
        let history =
            history::load(self.messages.as_ref(), conversation_id, self.options.history_limit)
                .await?;

        tracker.advance(TurnState::GenerateSql)?;
        checkpoint(cancel)?;
        let evidence = match self
            .generator
            .generate(&request.message, &history, cancel)
            .await?
        {
            SqlOutcome::Sql(sql) => {
                tracker.advance(TurnState::ExecuteQuery)?;
                self.executor.execute(&sql, cancel).await?
            }
            SqlOutcome::OutOfDomain => {
                tracker.advance(TurnState::SkipQuery)?;
                OUT_OF_DOMAIN_NOTE.to_string()
            }
        };

        tracker.advance(TurnState::StreamAnswer)?;
        checkpoint(cancel)?;
        let answer = self
            .streamer
            .stream(sink, &request.message, &evidence, &history, cancel)
            .await?;

        tracker.advance(TurnState::Persist)?;
        checkpoint(cancel)?;
        // Not atomic: a failure after the user append leaves that message stored.
        self.messages
            .append(conversation_id, Role::User, &request.message)
            .await?;
        self.messages
            .append(conversation_id, Role::Assistant, &answer)
            .await?;
        self.conversations.touch(conversation_id).await?;

        tracker.advance(TurnState::Done)?;
        Ok(())
    }
}

fn checkpoint(cancel: &CancelToken) -> Result<(), ChatError> {
    match cancel.reason() {
        Some(reason) => Err(ChatError::Cancelled(reason)),
        None => Ok(()),
    }
}

/// Emit the terminal event and close the sink.
fn finish<S: EventSink>(sink: S, event: ChatEvent) {
    if sink.send(event).is_err() {
        info!("Caller went away before the terminal event");
    }
}
