//! Turn dispatcher: runs chat turns on a bounded pool of workers, each with
//! its own deadline, and hands the caller a receiver of events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use adsight_core::cancel::CancelToken;
use adsight_core::error::ErrorCode;
use adsight_core::types::TurnRequest;

use crate::error::ChatError;
use crate::orchestrator::TurnOrchestrator;
use crate::sink::{ChannelSink, ChatEvent, EventSink};

/// How long a turn may keep running past its deadline before the dispatcher
/// abandons it and reports the timeout itself.
pub const OVERRUN_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct TurnDispatcher {
    orchestrator: Arc<TurnOrchestrator>,
    permits: Arc<Semaphore>,
    worker_pool_size: usize,
    turn_timeout: Duration,
}

impl TurnDispatcher {
    pub fn new(
        orchestrator: Arc<TurnOrchestrator>,
        worker_pool_size: usize,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(worker_pool_size)),
            worker_pool_size,
            turn_timeout,
        }
    }

    /// Deadline handed to each turn's cancel token.
    pub fn turn_timeout(&self) -> Duration {
        self.turn_timeout
    }

    /// Turns currently holding a worker.
    pub fn active_turns(&self) -> usize {
        self.worker_pool_size
            .saturating_sub(self.permits.available_permits())
    }

    /// Start a turn and return immediately with its event stream.
    ///
    /// The turn is cancelled when its deadline passes or when the returned
    /// receiver is dropped. The receiver yields exactly one terminal event
    /// and then closes, within `turn_timeout + OVERRUN_GRACE` even if a
    /// collaborator ignores cancellation.
    pub fn dispatch(&self, request: TurnRequest) -> mpsc::UnboundedReceiver<ChatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let deadline = Instant::now() + self.turn_timeout;
        let (handle, cancel) = CancelToken::with_deadline(deadline);
        let orchestrator = Arc::clone(&self.orchestrator);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let conversation_id = request.conversation_id.clone();
            let watcher_tx = tx.clone();
            let watcher = async move {
                watcher_tx.closed().await;
                debug!(conversation_id = %conversation_id, "Caller disconnected");
                handle.cancel();
                std::future::pending::<()>().await;
            };

            let turn = async move {
                let overrun = ChannelSink::new(tx.clone());
                let sink = ChannelSink::new(tx);
                let _permit = tokio::select! {
                    biased;
                    reason = cancel.cancelled() => {
                        let message = ChatError::Cancelled(reason).user_message();
                        let _ = sink.send(ChatEvent::Error(message.to_string()));
                        return;
                    }
                    permit = permits.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            let message = ErrorCode::InternalServerError.message();
                            let _ = sink.send(ChatEvent::Error(message.to_string()));
                            return;
                        }
                    },
                };

                let conversation_id = request.conversation_id.clone();
                let run = orchestrator.run(request, sink, cancel);
                match tokio::time::timeout_at(deadline + OVERRUN_GRACE, run).await {
                    Ok(state) => info!(state = %state, "Turn finished"),
                    Err(_) => {
                        // The orchestrator was dropped before its terminal emit.
                        warn!(conversation_id = %conversation_id, "Turn overran its deadline");
                        let message = ErrorCode::TurnTimedOut.message();
                        let _ = overrun.send(ChatEvent::Error(message.to_string()));
                    }
                }
            };

            // The watcher never completes; it only fires the cancel handle.
            tokio::select! {
                _ = turn => {}
                _ = watcher => {}
            }
        });

        rx
    }
}
