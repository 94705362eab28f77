//! Answer streamer: generates the final answer from the question and query
//! evidence, forwarding each chunk to the caller as it arrives.
//!
//! Delivery to the sink is best-effort; the accumulated text is
//! authoritative and is what gets persisted.

use std::sync::Arc;

use tracing::{debug, warn};

use adsight_core::backend::CompletionBackend;
use adsight_core::cancel::CancelToken;
use adsight_core::types::HistoryEntry;

use crate::error::ChatError;
use crate::prompt;
use crate::sink::{ChatEvent, EventSink};

pub struct AnswerStreamer {
    backend: Arc<dyn CompletionBackend>,
}

impl AnswerStreamer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Stream an answer to `sink` and return the full text.
    ///
    /// On failure or cancellation the partial text is discarded; chunks
    /// already delivered are not retracted.
    pub async fn stream(
        &self,
        sink: &dyn EventSink,
        question: &str,
        evidence: &str,
        history: &[HistoryEntry],
        cancel: &CancelToken,
    ) -> Result<String, ChatError> {
        let mut messages = history.to_vec();
        messages.push(HistoryEntry::user(prompt::answer_user_prompt(
            question, evidence,
        )));

        let mut answer = String::new();
        let mut undelivered = 0usize;
        let mut on_chunk = |chunk: &str| {
            if chunk.is_empty() {
                return;
            }
            answer.push_str(chunk);
            if let Err(e) = sink.send(ChatEvent::Chunk(chunk.to_string())) {
                undelivered += 1;
                warn!(error = %e, "Failed to deliver answer chunk");
            }
        };

        tokio::select! {
            biased;
            reason = cancel.cancelled() => return Err(ChatError::Cancelled(reason)),
            result = self.backend.complete_stream(prompt::ANSWER_SYSTEM_PROMPT, &messages, &mut on_chunk) => {
                result.map_err(|e| ChatError::StreamFailed(e.to_string()))?;
            }
        }

        debug!(
            chars = answer.chars().count(),
            undelivered, "Answer stream finished"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSink, ScriptedCompletion, StreamScript};
    use adsight_core::cancel::CancelReason;
    use std::time::Duration;
    use tokio::time::Instant;

    fn streamer(script: StreamScript) -> (AnswerStreamer, Arc<ScriptedCompletion>) {
        let backend = ScriptedCompletion::new("unused", script);
        (AnswerStreamer::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_stream_forwards_chunks_in_order() {
        let (streamer, backend) = streamer(StreamScript::Chunks(vec!["Spring ", "", "Sale led."]));
        let sink = RecordingSink::new();

        let answer = streamer
            .stream(&sink, "Top campaign?", "{campaign: Spring Sale}", &[], &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(answer, "Spring Sale led.");
        assert_eq!(
            sink.events(),
            vec![
                ChatEvent::Chunk("Spring ".into()),
                ChatEvent::Chunk("Sale led.".into())
            ]
        );
        let sent = backend.last_stream_messages.lock().unwrap().clone();
        assert_eq!(
            sent.last().unwrap().content,
            "Question: Top campaign?\n\nQuery result:\n{campaign: Spring Sale}"
        );
    }

    #[tokio::test]
    async fn test_accumulator_survives_delivery_failures() {
        let (streamer, _) = streamer(StreamScript::Chunks(vec!["a", "b", "c", "d", "e"]));
        let sink = RecordingSink::rejecting_every(2);

        let answer = streamer
            .stream(&sink, "q", "e", &[], &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(answer, "abcde");
        assert_eq!(
            sink.events(),
            vec![
                ChatEvent::Chunk("a".into()),
                ChatEvent::Chunk("c".into()),
                ChatEvent::Chunk("e".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_history_precedes_prompt() {
        let (streamer, backend) = streamer(StreamScript::Chunks(vec!["ok"]));
        let history = vec![HistoryEntry::user("hi"), HistoryEntry::assistant("hello")];
        streamer
            .stream(&RecordingSink::new(), "q", "e", &history, &CancelToken::never())
            .await
            .unwrap();

        let sent = backend.last_stream_messages.lock().unwrap().clone();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], HistoryEntry::user("hi"));
        assert_eq!(sent[1], HistoryEntry::assistant("hello"));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_delivered_chunks() {
        let (streamer, _) = streamer(StreamScript::FailAfter(vec!["partial"]));
        let sink = RecordingSink::new();

        let err = streamer
            .stream(&sink, "q", "e", &[], &CancelToken::never())
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::StreamFailed(_)));
        assert_eq!(sink.events(), vec![ChatEvent::Chunk("partial".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_stream_ends_at_deadline() {
        let (streamer, _) = streamer(StreamScript::Hang);
        let (_handle, token) =
            CancelToken::with_deadline(Instant::now() + Duration::from_secs(180));

        let err = streamer
            .stream(&RecordingSink::new(), "q", "e", &[], &token)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::Cancelled(CancelReason::DeadlineExceeded)
        ));
    }
}
