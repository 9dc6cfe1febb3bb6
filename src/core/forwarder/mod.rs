//! Forwarding of chat turns and model lookups to an upstream server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{ChatRequest, ModelInfo, ModelsResponse, UpstreamChatRequest};
use crate::core::chat_stream::ChatStream;
use crate::core::errors::{root_cause_message, ConnectorError};
use crate::core::registry::ServerConfig;
use crate::core::sse::is_event_stream_content_type;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::{construct_api_url, construct_resource_url};

pub const CHAT_COMPLETIONS_ENDPOINT: &str = "v1/chat/completions";
pub const MODELS_ENDPOINT: &str = "v1/models";

#[derive(Debug)]
pub enum ForwardReply {
    /// A buffered `chat.completion` object.
    Completion(Value),
    Stream(ChatStream),
}

/// The network side of the connector.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send a chat turn; `request.stream` selects the reply shape.
    async fn send(
        &self,
        server: &ServerConfig,
        request: ChatRequest,
        timeout: Duration,
    ) -> Result<ForwardReply, ConnectorError>;

    async fn list_models(
        &self,
        server: &ServerConfig,
        timeout: Duration,
    ) -> Result<Vec<ModelInfo>, ConnectorError>;

    async fn model_info(
        &self,
        server: &ServerConfig,
        model_id: &str,
        timeout: Duration,
    ) -> Result<ModelInfo, ConnectorError>;
}

/// The model a request goes out with: the request's own, else the server default.
pub fn resolve_model(request: &ChatRequest, server: &ServerConfig) -> Result<String, ConnectorError> {
    let server_default = server
        .default_model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty());
    request
        .requested_model()
        .or(server_default)
        .map(str::to_string)
        .ok_or_else(|| {
            ConnectorError::Config(format!(
                "No model specified for server '{}'. Set one with `!mcp update {} default_model <model>`.",
                server.name, server.id
            ))
        })
}

#[derive(Clone, Default)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        server: &ServerConfig,
        url: String,
        timeout: Duration,
    ) -> Result<T, ConnectorError> {
        debug!(url = %url, "fetching from upstream");
        let request = add_auth_headers(self.client.get(&url), server.api_key.as_deref());

        let fetch = async {
            let response = request
                .send()
                .await
                .map_err(|err| classify(err, &url, timeout))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|err| classify(err, &url, timeout))?;
            parse_body::<T>(status, &body)
        };

        tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| ConnectorError::timeout(&url, timeout))?
    }
}

#[async_trait]
impl Upstream for HttpForwarder {
    async fn send(
        &self,
        server: &ServerConfig,
        request: ChatRequest,
        timeout: Duration,
    ) -> Result<ForwardReply, ConnectorError> {
        let model = resolve_model(&request, server)?;
        let stream = request.stream.unwrap_or(false);
        let url = construct_api_url(&server.url, CHAT_COMPLETIONS_ENDPOINT);
        let body = UpstreamChatRequest {
            model: &model,
            messages: &request.messages,
            stream,
            extra: &request.extra,
        };
        debug!(url = %url, model = %model, stream, "forwarding chat request");

        let http_request = add_auth_headers(
            self.client
                .post(&url)
                .header(CONTENT_TYPE, "application/json"),
            server.api_key.as_deref(),
        )
        .json(&body);

        if !stream {
            let exchange = async {
                let response = http_request
                    .send()
                    .await
                    .map_err(|err| classify(err, &url, timeout))?;
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .map_err(|err| classify(err, &url, timeout))?;
                parse_body::<Value>(status, &text)
            };
            let completion = tokio::time::timeout(timeout, exchange)
                .await
                .map_err(|_| ConnectorError::timeout(&url, timeout))??;
            return Ok(ForwardReply::Completion(completion));
        }

        let response = tokio::time::timeout(timeout, http_request.send())
            .await
            .map_err(|_| ConnectorError::timeout(&url, timeout))?
            .map_err(|err| classify(err, &url, timeout))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| {
                !is_event_stream_content_type(value) && value.contains("json")
            });

        if !status.is_success() || is_json {
            let text = tokio::time::timeout(timeout, response.text())
                .await
                .map_err(|_| ConnectorError::timeout(&url, timeout))?
                .map_err(|err| classify(err, &url, timeout))?;
            let completion = parse_body::<Value>(status, &text)?;
            debug!("upstream answered a streaming request with a buffered completion");
            return Ok(ForwardReply::Completion(completion));
        }

        Ok(ForwardReply::Stream(ChatStream::from_response(response, timeout)))
    }

    async fn list_models(
        &self,
        server: &ServerConfig,
        timeout: Duration,
    ) -> Result<Vec<ModelInfo>, ConnectorError> {
        let response: ModelsResponse = self
            .get_json(server, construct_api_url(&server.url, MODELS_ENDPOINT), timeout)
            .await?;
        Ok(response.data)
    }

    async fn model_info(
        &self,
        server: &ServerConfig,
        model_id: &str,
        timeout: Duration,
    ) -> Result<ModelInfo, ConnectorError> {
        let url = construct_resource_url(&server.url, MODELS_ENDPOINT, model_id.trim())
            .map_err(ConnectorError::Config)?;
        self.get_json(server, url, timeout).await
    }
}

fn parse_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ConnectorError> {
    if !status.is_success() {
        warn!(status = status.as_u16(), "upstream returned an error status");
        return Err(ConnectorError::upstream(status.as_u16(), body));
    }
    serde_json::from_str(body).map_err(|err| {
        warn!(error = %err, "upstream returned an unreadable body");
        ConnectorError::upstream(status.as_u16(), body)
    })
}

/// Sort a transport failure into timeout, connection or upstream errors.
fn classify(err: reqwest::Error, url: &str, timeout: Duration) -> ConnectorError {
    if err.is_timeout() {
        return ConnectorError::timeout(url, timeout);
    }
    if let Some(status) = err.status() {
        return ConnectorError::upstream(status.as_u16(), &err.to_string());
    }
    let reason = root_cause_message(&err);
    warn!(url, reason = %reason, "could not reach upstream");
    ConnectorError::Connection {
        url: url.to_string(),
        reason,
    }
}
