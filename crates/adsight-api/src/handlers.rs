//! Route handler functions.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{Extension, Json};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

use adsight_chat::ChatEvent;
use adsight_core::types::TurnRequest;

use crate::auth::CallerId;
use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;

/// Longest accepted conversation id.
pub const MAX_CONVERSATION_ID_CHARS: usize = 128;

/// Extra lifetime of an SSE response past the turn deadline, so the
/// dispatcher's terminal event is always read before the body closes.
pub const STREAM_GRACE: Duration = Duration::from_secs(5);

/// Data payload of the terminal success event.
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatBody {
    pub message: String,
}

/// GET /health - liveness probe.
pub async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/chat/{conversation_id} - run one chat turn and stream the
/// answer as server-sent events.
pub async fn chat(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerId>,
    Path(conversation_id): Path<String>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    validate_conversation_id(&conversation_id)?;
    validate_message(&body.message, state.max_message_chars)?;

    info!(
        conversation_id = %conversation_id,
        user_id = %caller.0,
        chars = body.message.chars().count(),
        "Chat turn accepted"
    );

    let ceiling = state.dispatcher.turn_timeout() + STREAM_GRACE;
    let rx = state.dispatcher.dispatch(TurnRequest {
        conversation_id,
        user_id: caller.0,
        message: body.message,
    });

    let events = UnboundedReceiverStream::new(rx)
        .map(|event| Ok::<_, Infallible>(to_sse_event(event)))
        .take_until(tokio::time::sleep(ceiling));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn to_sse_event(event: ChatEvent) -> Event {
    match event {
        ChatEvent::Chunk(text) => Event::default().data(text),
        ChatEvent::Done => Event::default().event("done").data(DONE_MARKER),
        ChatEvent::Error(message) => Event::default().event("error").data(message),
    }
}

fn validate_conversation_id(conversation_id: &str) -> Result<(), ApiError> {
    if conversation_id.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "conversation id must not be blank".into(),
        ));
    }
    if conversation_id.chars().count() > MAX_CONVERSATION_ID_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "conversation id exceeds {} characters",
            MAX_CONVERSATION_ID_CHARS
        )));
    }
    Ok(())
}

fn validate_message(message: &str, max_chars: usize) -> Result<(), ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::InvalidInput("message must not be blank".into()));
    }
    if message.chars().count() > max_chars {
        return Err(ApiError::InvalidInput(format!(
            "message exceeds maximum length of {} characters",
            max_chars
        )));
    }
    Ok(())
}
