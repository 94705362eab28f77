//! Error types for the chat turn pipeline.

use adsight_core::cancel::CancelReason;
use adsight_core::error::{AdsightError, ErrorCode};

use crate::state::TurnState;

/// Errors that end a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("SQL generation failed: {0}")]
    SqlGeneration(String),
    #[error("query failed: {reason}")]
    QueryFailed { reason: String },
    #[error("answer stream failed: {0}")]
    StreamFailed(String),
    #[error("turn cancelled: {0:?}")]
    Cancelled(CancelReason),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid turn transition: {0} -> {1}")]
    InvalidTransition(TurnState, TurnState),
}

impl ChatError {
    /// Caller-visible code for recognized failures. `None` means the failure
    /// is unexpected and must surface as the generic message.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ChatError::SqlGeneration(_) => Some(ErrorCode::SqlGenerationFailed),
            ChatError::QueryFailed { .. } => Some(ErrorCode::QueryFailed),
            ChatError::StreamFailed(_) => Some(ErrorCode::ChatProcessingError),
            ChatError::Cancelled(CancelReason::DeadlineExceeded) => Some(ErrorCode::TurnTimedOut),
            ChatError::Cancelled(CancelReason::Cancelled) => Some(ErrorCode::ChatProcessingError),
            ChatError::Storage(_) | ChatError::InvalidTransition(..) => None,
        }
    }

    /// Message safe to send to the caller.
    pub fn user_message(&self) -> &'static str {
        self.code()
            .unwrap_or(ErrorCode::InternalServerError)
            .message()
    }
}

impl From<AdsightError> for ChatError {
    fn from(err: AdsightError) -> Self {
        ChatError::Storage(err.to_string())
    }
}
