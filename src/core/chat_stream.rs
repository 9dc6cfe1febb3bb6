use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ChatResponse;
use crate::core::sse::{SseEvent, SseFramer};

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(ChatChunk),
    /// The stream failed after it started; always followed by [`StreamMessage::End`].
    Error(String),
    End,
}

/// One `chat.completion.chunk` event as received from the upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatChunk {
    /// The event payload, untouched.
    pub raw: Value,
    pub content: Option<String>,
    pub finish_reason: Option<String>,
}

impl ChatChunk {
    pub fn from_value(raw: Value) -> Self {
        let (content, finish_reason) = first_choice(&raw).unwrap_or_default();
        Self {
            raw,
            content,
            finish_reason,
        }
    }

    /// A minimal chunk carrying only delta text.
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self::from_value(serde_json::json!({
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": content}}]
        }))
    }
}

fn first_choice(raw: &Value) -> Option<(Option<String>, Option<String>)> {
    let response = ChatResponse::deserialize(raw).ok()?;
    let choice = response.choices.into_iter().next()?;
    Some((choice.delta.and_then(|d| d.content), choice.finish_reason))
}

/// Lazy, single-use sequence of streamed completion messages.
///
/// The sequence always finishes with exactly one [`StreamMessage::End`].
/// Dropping it before then releases the upstream connection.
pub struct ChatStream {
    inner: Pin<Box<dyn Stream<Item = StreamMessage> + Send>>,
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream").finish_non_exhaustive()
    }
}

impl Stream for ChatStream {
    type Item = StreamMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct FrameState<S> {
    body: Option<Pin<Box<S>>>,
    framer: SseFramer,
    pending: VecDeque<StreamMessage>,
    idle_timeout: Duration,
    closed: bool,
}

impl<S> FrameState<S> {
    fn close(&mut self) {
        if !self.closed {
            self.pending.push_back(StreamMessage::End);
            self.closed = true;
        }
        self.body = None;
    }

    fn fail(&mut self, message: String) {
        if !self.closed {
            self.pending.push_back(StreamMessage::Error(message));
        }
        self.close();
    }

    fn take_events(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.closed {
                return;
            }
            self.take_payload(event.data.trim());
        }
    }

    fn take_payload(&mut self, payload: &str) {
        if payload.is_empty() {
            return;
        }
        if payload == "[DONE]" {
            self.close();
            return;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) if value.get("error").is_some() => {
                warn!("upstream reported an error mid-stream");
                self.fail(format_api_error(payload));
            }
            Ok(value) => self.pending.push_back(StreamMessage::Chunk(ChatChunk::from_value(value))),
            // Some servers omit the blank line between events.
            Err(_) if payload.contains('\n') => {
                for line in payload.lines() {
                    if self.closed {
                        return;
                    }
                    self.take_payload(line.trim());
                }
            }
            Err(_) => self.fail(format_api_error(payload)),
        }
    }
}

impl ChatStream {
    pub fn from_response(response: reqwest::Response, idle_timeout: Duration) -> Self {
        Self::from_byte_stream(response.bytes_stream(), idle_timeout)
    }

    /// Frame an SSE body. Each read waits at most `idle_timeout`.
    pub fn from_byte_stream<S, B, E>(body: S, idle_timeout: Duration) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Display + Send + 'static,
    {
        let state = FrameState {
            body: Some(Box::pin(body)),
            framer: SseFramer::new(),
            pending: VecDeque::new(),
            idle_timeout,
            closed: false,
        };

        let inner = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(message) = state.pending.pop_front() {
                    return Some((message, state));
                }
                let body = state.body.as_mut()?;

                let next = tokio::time::timeout(state.idle_timeout, body.next()).await;
                match next {
                    Ok(Some(Ok(bytes))) => {
                        let events = state.framer.push(bytes.as_ref());
                        state.take_events(events);
                    }
                    Ok(Some(Err(err))) => {
                        warn!(error = %err, "upstream stream interrupted");
                        state.fail(format!("Error: The stream was interrupted: {err}"));
                    }
                    Ok(None) => {
                        debug!("upstream closed the stream");
                        let events = state.framer.finish();
                        state.take_events(events);
                        state.close();
                    }
                    Err(_) => {
                        let seconds = state.idle_timeout.as_secs().max(1);
                        warn!(seconds, "upstream stream went idle");
                        state.fail(format!(
                            "Error: The MCP server stopped sending data for {seconds} seconds."
                        ));
                    }
                }
            }
        });

        Self {
            inner: Box::pin(inner),
        }
    }

    /// A stream replaying `messages`, terminated with `End` if they are not.
    pub fn from_messages(mut messages: Vec<StreamMessage>) -> Self {
        if !matches!(messages.last(), Some(StreamMessage::End)) {
            messages.push(StreamMessage::End);
        }
        Self {
            inner: Box::pin(stream::iter(messages)),
        }
    }

    /// Drain the stream into its concatenated delta text; a mid-stream error
    /// is appended after the text received so far.
    pub async fn collect_text(mut self) -> String {
        let mut text = String::new();
        while let Some(message) = self.next().await {
            match message {
                StreamMessage::Chunk(chunk) => {
                    if let Some(content) = chunk.content {
                        text.push_str(&content);
                    }
                }
                StreamMessage::Error(error) => {
                    if !text.is_empty() {
                        text.push_str("\n\n");
                    }
                    text.push_str(&error);
                }
                StreamMessage::End => break,
            }
        }
        text
    }
}

fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| value.get("message").and_then(Value::as_str))
        .or_else(|| value.get("detail").and_then(Value::as_str))?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(collapsed)
}

/// Render an upstream error body for a chat reply.
pub(crate) fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value) {
                Some(summary) if !summary.is_empty() => {
                    format!("API Error: {summary}\n```json\n{pretty_json}\n```")
                }
                _ => format!("API Error:\n```json\n{pretty_json}\n```"),
            };
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{trimmed}\n```")
    } else {
        format!("API Error:\n```\n{trimmed}\n```")
    }
}
