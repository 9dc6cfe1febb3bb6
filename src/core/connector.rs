//! The connector facade: one entry point per inbound chat turn.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::{completion_text, ChatRequest};
use crate::commands::{self, CommandContext, Step};
use crate::core::chat_stream::ChatStream;
use crate::core::config::ConnectorSettings;
use crate::core::errors::ConnectorError;
use crate::core::forwarder::{ForwardReply, HttpForwarder, Upstream};
use crate::core::model_cache::ModelCache;
use crate::core::registry::Registry;
use crate::core::session::SessionState;

pub use crate::commands::COMMAND_PREFIX;

pub const NO_ACTIVE_SERVER_MESSAGE: &str = "No MCP server is configured for this session. Use `!mcp list_popular` to see predefined servers, `!mcp add_popular <template_id>` to add one, then `!mcp use <server_id>` to select it. Type `!mcp help` for all commands.";

pub const NO_CONTENT_MESSAGE: &str = "No content received from MCP server";

#[derive(Debug)]
pub enum ConnectorReply {
    Text(String),
    Stream(ChatStream),
}

impl ConnectorReply {
    /// The reply as plain text, draining a stream if necessary.
    pub async fn into_text(self) -> String {
        match self {
            ConnectorReply::Text(text) => text,
            ConnectorReply::Stream(stream) => stream.collect_text().await,
        }
    }
}

/// One entry of the aggregated model listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredModel {
    /// `MCP/<server name>/<model id>`, or `MCP/<server name>/error` on failure.
    pub id: String,
    pub server_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct ConnectorState {
    registry: Registry,
    session: SessionState,
    models: ModelCache,
}

impl ConnectorState {
    fn context(&mut self) -> CommandContext<'_> {
        CommandContext {
            registry: &mut self.registry,
            session: &mut self.session,
            models: &mut self.models,
        }
    }
}

pub struct Connector {
    settings: ConnectorSettings,
    state: Mutex<ConnectorState>,
    upstream: Arc<dyn Upstream>,
}

impl Connector {
    pub fn new(settings: ConnectorSettings, registry: Registry, upstream: Arc<dyn Upstream>) -> Self {
        let state = ConnectorState {
            registry,
            session: SessionState::new(settings.server_id.clone()),
            models: ModelCache::new(settings.models_cache_ttl()),
        };
        Self {
            settings,
            state: Mutex::new(state),
            upstream,
        }
    }

    pub fn with_http(settings: ConnectorSettings, registry: Registry) -> Self {
        Self::new(settings, registry, Arc::new(HttpForwarder::new()))
    }

    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    /// Handle one inbound request: run a command or forward a chat turn.
    pub async fn handle(&self, mut request: ChatRequest) -> ConnectorReply {
        if let Some(parsed) = request.last_text().and_then(commands::parse) {
            let reply = match parsed {
                Ok(invocation) => self.run_command(&invocation).await,
                Err(err) => err.to_reply(),
            };
            return ConnectorReply::Text(reply);
        }

        let server = {
            let state = self.state.lock().await;
            state.session.resolve(&state.registry).cloned()
        };
        let Some(server) = server else {
            debug!("no active server; not forwarding");
            return ConnectorReply::Text(NO_ACTIVE_SERVER_MESSAGE.to_string());
        };

        if request.requested_model().is_none() {
            request.model = self.settings.default_model.clone();
        }
        request.stream = Some(request.stream.unwrap_or(self.settings.stream));
        debug!(server = %server.id, stream = ?request.stream, "forwarding chat turn");

        match self
            .upstream
            .send(&server, request, self.settings.timeout())
            .await
        {
            Ok(ForwardReply::Stream(stream)) => ConnectorReply::Stream(stream),
            Ok(ForwardReply::Completion(completion)) => ConnectorReply::Text(
                completion_text(&completion)
                    .filter(|text| !text.is_empty())
                    .unwrap_or(NO_CONTENT_MESSAGE)
                    .to_string(),
            ),
            Err(err) => {
                warn!(server = %server.id, error = %err, "forward failed");
                ConnectorReply::Text(err.to_reply())
            }
        }
    }

    /// Convenience for hosts that only deal in plain text turns.
    pub async fn handle_text(&self, text: &str) -> ConnectorReply {
        self.handle(ChatRequest::from_messages(vec![crate::api::ChatMessage::user(text)]))
            .await
    }

    async fn run_command(&self, invocation: &commands::Invocation) -> String {
        let step = {
            let mut state = self.state.lock().await;
            commands::start(invocation, &mut state.context())
        };
        let fetch = match step {
            Step::Reply(reply) => return reply,
            Step::Fetch(fetch) => fetch,
        };

        let fetched = fetch
            .run(self.upstream.as_ref(), self.settings.test_timeout())
            .await;
        let mut state = self.state.lock().await;
        fetched.finish(&mut state.context())
    }

    /// Models of every configured server. A server that cannot be reached
    /// contributes one entry carrying the error instead of failing the listing.
    pub async fn discover_models(&self) -> Vec<DiscoveredModel> {
        let servers: Vec<_> = {
            let state = self.state.lock().await;
            state.registry.list().cloned().collect()
        };

        let mut discovered = Vec::new();
        for server in servers {
            let cached = {
                let state = self.state.lock().await;
                state.models.get(&server.id).map(<[_]>::to_vec)
            };
            let listing = match cached {
                Some(models) => Ok(models),
                None => self
                    .upstream
                    .list_models(&server, self.settings.test_timeout())
                    .await
                    .inspect(|models| {
                        debug!(server = %server.id, count = models.len(), "discovered models");
                    }),
            };

            match listing {
                Ok(models) => {
                    for model in &models {
                        discovered.push(DiscoveredModel {
                            id: format!("MCP/{}/{}", server.name, model.id),
                            server_id: server.id.clone(),
                            name: model.display_name.clone().unwrap_or_else(|| model.id.clone()),
                            error: None,
                        });
                    }
                    self.state.lock().await.models.insert(&server.id, models);
                }
                Err(err) => discovered.push(discovery_error(&server.id, &server.name, &err)),
            }
        }
        discovered
    }
}

fn discovery_error(server_id: &str, server_name: &str, err: &ConnectorError) -> DiscoveredModel {
    warn!(server = %server_id, error = %err, "model discovery failed");
    DiscoveredModel {
        id: format!("MCP/{server_name}/error"),
        server_id: server_id.to_string(),
        name: format!("{server_name} (error: {err})"),
        error: Some(err.to_string()),
    }
}
