//! Fake upstreams for tests: raw HTTP/1.1 over a local `TcpListener`, and an
//! in-process [`Upstream`] double.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use crate::api::{ChatRequest, ModelInfo};
use crate::core::chat_stream::{ChatChunk, ChatStream, StreamMessage};
use crate::core::errors::ConnectorError;
use crate::core::forwarder::{ForwardReply, Upstream};
use crate::core::registry::ServerConfig;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

/// What the fake upstream does with one accepted connection.
pub enum Reply {
    Json {
        status: u16,
        body: String,
    },
    /// 200 `text/event-stream`, one HTTP chunk per entry.
    Sse(Vec<String>),
    /// Read the request, then never answer.
    Silent,
    /// Send the SSE headers and `first` chunks, then wait for the client to
    /// hang up and signal `closed`.
    HoldOpen {
        first: Vec<String>,
        closed: oneshot::Sender<()>,
    },
}

impl Reply {
    pub fn ok_json(body: Value) -> Self {
        Reply::Json {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Reply::Json {
            status,
            body: body.to_string(),
        }
    }
}

pub fn sse_delta(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {"content": content}}]})
    )
}

pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

/// Serve `replies` to consecutive connections; the handle yields every request seen.
pub async fn spawn_upstream(replies: Vec<Reply>) -> (String, JoinHandle<Vec<RecordedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind fake upstream");
    let address = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let request = read_http_request(&mut stream)
                .await
                .expect("read request");
            seen.push(request);
            write_reply(&mut stream, reply).await;
        }
        seen
    });

    (format!("http://{address}"), handle)
}

/// A base URL on which nothing is listening.
pub async fn unused_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind probe listener");
    let address = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{address}")
}

async fn write_reply(stream: &mut TcpStream, reply: Reply) {
    match reply {
        Reply::Json { status, body } => {
            let response = format!(
                "HTTP/1.1 {status} Fake\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        Reply::Sse(chunks) => {
            write_sse_head(stream).await;
            for chunk in chunks {
                write_chunk(stream, &chunk).await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = stream.write_all(b"0\r\n\r\n").await;
            let _ = stream.shutdown().await;
        }
        Reply::Silent => {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Reply::HoldOpen { first, closed } => {
            write_sse_head(stream).await;
            for chunk in first {
                write_chunk(stream, &chunk).await;
            }
            let mut scratch = [0_u8; 256];
            loop {
                match tokio::time::timeout(Duration::from_secs(10), stream.read(&mut scratch)).await {
                    Ok(Ok(0)) | Ok(Err(_)) => {
                        let _ = closed.send(());
                        break;
                    }
                    Ok(Ok(_)) => continue,
                    Err(_) => break,
                }
            }
        }
    }
}

async fn write_sse_head(stream: &mut TcpStream) {
    let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
    let _ = stream.write_all(head.as_bytes()).await;
}

async fn write_chunk(stream: &mut TcpStream, data: &str) {
    let framed = format!("{:X}\r\n{}\r\n", data.len(), data);
    let _ = stream.write_all(framed.as_bytes()).await;
    let _ = stream.flush().await;
}

pub async fn read_http_request(stream: &mut TcpStream) -> Result<RecordedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.ok_or_else(|| "header end should exist".to_string())?;
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Ok(RecordedRequest {
        request_line,
        headers,
        body,
    })
}

pub fn model(id: &str) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        created: None,
        created_at: None,
        owned_by: None,
        display_name: None,
    }
}

/// In-process [`Upstream`] that answers every chat turn with `reply_text`.
pub struct MockUpstream {
    pub reply_text: String,
    pub models: Vec<ModelInfo>,
    pub failure: Option<ConnectorError>,
    pub sent: Mutex<Vec<(ServerConfig, ChatRequest)>>,
    pub list_calls: AtomicUsize,
    /// When set, model listings wait for a notification before answering.
    pub release: Option<Arc<Notify>>,
}

impl MockUpstream {
    pub fn replying(text: &str) -> Self {
        Self {
            reply_text: text.to_string(),
            models: vec![model("mock-model")],
            failure: None,
            sent: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            release: None,
        }
    }

    pub fn failing(error: ConnectorError) -> Self {
        Self {
            failure: Some(error),
            ..Self::replying("")
        }
    }

    pub fn sent(&self) -> Vec<(ServerConfig, ChatRequest)> {
        self.sent.lock().expect("mock lock").clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn send(
        &self,
        server: &ServerConfig,
        request: ChatRequest,
        _timeout: Duration,
    ) -> Result<ForwardReply, ConnectorError> {
        let streaming = request.stream == Some(true);
        self.sent
            .lock()
            .expect("mock lock")
            .push((server.clone(), request));
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        if streaming {
            let chunks = self
                .reply_text
                .split_inclusive(' ')
                .map(|part| StreamMessage::Chunk(ChatChunk::text(part)))
                .collect();
            Ok(ForwardReply::Stream(ChatStream::from_messages(chunks)))
        } else {
            Ok(ForwardReply::Completion(completion_body(&self.reply_text)))
        }
    }

    async fn list_models(
        &self,
        _server: &ServerConfig,
        _timeout: Duration,
    ) -> Result<Vec<ModelInfo>, ConnectorError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(release) = &self.release {
            release.notified().await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.models.clone()),
        }
    }

    async fn model_info(
        &self,
        _server: &ServerConfig,
        model_id: &str,
        _timeout: Duration,
    ) -> Result<ModelInfo, ConnectorError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.models
            .iter()
            .find(|m| m.id == model_id)
            .cloned()
            .ok_or_else(|| ConnectorError::upstream(404, "model not found"))
    }
}
