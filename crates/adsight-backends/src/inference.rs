//! Client for an Anthropic-Messages-compatible text generation endpoint.
//!
//! Supports one-shot completions (used for SQL generation) and SSE token
//! streaming (used for answers). The wire format is the public Messages API:
//! `POST {base_url}/v1/messages` with `x-api-key` and `anthropic-version`
//! headers.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use adsight_core::backend::CompletionBackend;
use adsight_core::config::InferenceConfig;
use adsight_core::error::Result;
use adsight_core::types::{HistoryEntry, Role};

use crate::error::BackendError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: Delta },
    #[serde(rename = "message_stop")]
    MessageStop {},
    #[serde(rename = "error")]
    Error { error: StreamErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Delta {
    text: Option<String>,
}

#[derive(Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    message: String,
}

/// Messages API client. Cheap to clone; the underlying connection pool is
/// shared.
#[derive(Debug, Clone)]
pub struct MessagesClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    request_timeout: Duration,
}

impl MessagesClient {
    pub fn new(config: &InferenceConfig) -> std::result::Result<Self, BackendError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    async fn send(
        &self,
        system_prompt: &str,
        messages: &[HistoryEntry],
        stream: bool,
    ) -> std::result::Result<reqwest::Response, BackendError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_prompt,
            messages: to_wire(messages),
            stream,
        };

        let mut request = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        // Streams are bounded by the turn's cancel token instead.
        if !stream {
            request = request.timeout(self.request_timeout);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(BackendError::from_response(resp).await);
        }
        Ok(resp)
    }

    async fn complete_inner(
        &self,
        system_prompt: &str,
        messages: &[HistoryEntry],
    ) -> std::result::Result<String, BackendError> {
        let resp = self.send(system_prompt, messages, false).await?;
        let data: MessagesResponse = resp.json().await?;
        data.content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| BackendError::Parse("response contained no content blocks".into()))
    }

    async fn stream_inner(
        &self,
        system_prompt: &str,
        messages: &[HistoryEntry],
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> std::result::Result<String, BackendError> {
        let resp = self.send(system_prompt, messages, true).await?;

        let mut full_content = String::new();
        let mut stream = resp.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let Some(data) = line.trim().strip_prefix("data:") else {
                    continue;
                };

                match serde_json::from_str::<StreamEvent>(data.trim()) {
                    Ok(StreamEvent::ContentBlockDelta { delta }) => {
                        if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
                            full_content.push_str(&text);
                            on_chunk(&text);
                        }
                    }
                    Ok(StreamEvent::MessageStop {}) => return Ok(full_content),
                    Ok(StreamEvent::Error { error }) => {
                        return Err(BackendError::Stream(error.message));
                    }
                    Ok(StreamEvent::Other) => {}
                    Err(e) => debug!(error = %e, "Skipping unparseable stream line"),
                }
            }
        }

        Err(BackendError::Stream(
            "stream ended before message_stop".into(),
        ))
    }
}

/// Convert history into the alternating user/assistant sequence the
/// Messages API accepts: leading assistant turns are dropped and
/// consecutive same-role turns are merged.
fn to_wire(messages: &[HistoryEntry]) -> Vec<WireMessage> {
    let mut wire: Vec<WireMessage> = Vec::with_capacity(messages.len());
    for entry in messages {
        if wire.is_empty() && entry.role == Role::Assistant {
            continue;
        }
        match wire.last_mut() {
            Some(last) if last.role == entry.role.as_str() => {
                last.content.push_str("\n\n");
                last.content.push_str(&entry.content);
            }
            _ => wire.push(WireMessage {
                role: entry.role.as_str(),
                content: entry.content.clone(),
            }),
        }
    }
    wire
}

#[async_trait]
impl CompletionBackend for MessagesClient {
    async fn complete(&self, system_prompt: &str, messages: &[HistoryEntry]) -> Result<String> {
        Ok(self.complete_inner(system_prompt, messages).await?)
    }

    async fn complete_stream(
        &self,
        system_prompt: &str,
        messages: &[HistoryEntry],
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
        Ok(self.stream_inner(system_prompt, messages, on_chunk).await?)
    }
}
