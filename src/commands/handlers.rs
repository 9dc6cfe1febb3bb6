use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::registry::Verb;
use super::render;
use super::{CommandContext, Invocation};
use crate::api::ModelInfo;
use crate::core::errors::ConnectorError;
use crate::core::forwarder::Upstream;
use crate::core::registry::{NewServer, ServerConfig, ServerField};

/// Outcome of the local part of a command.
#[derive(Debug)]
pub enum Step {
    Reply(String),
    /// The command needs the upstream; run the fetch without holding any state.
    Fetch(Fetch),
}

#[derive(Debug)]
pub struct Fetch {
    server: ServerConfig,
    kind: FetchKind,
}

#[derive(Debug)]
enum FetchKind {
    Test,
    ModelList,
    ModelDetail(String),
}

pub struct Fetched {
    server: ServerConfig,
    outcome: Outcome,
}

enum Outcome {
    Test(Result<(Duration, Vec<ModelInfo>), ConnectorError>),
    ModelList(Result<Vec<ModelInfo>, ConnectorError>),
    ModelDetail(Result<ModelInfo, ConnectorError>),
}

impl Fetch {
    pub async fn run(self, upstream: &dyn Upstream, timeout: Duration) -> Fetched {
        debug!(server = %self.server.id, kind = ?self.kind, "querying upstream for command");
        let server = &self.server;
        let outcome = match self.kind {
            FetchKind::Test => {
                let started = Instant::now();
                let listing = upstream.list_models(server, timeout).await;
                Outcome::Test(listing.map(|models| (started.elapsed(), models)))
            }
            FetchKind::ModelList => Outcome::ModelList(upstream.list_models(server, timeout).await),
            FetchKind::ModelDetail(model_id) => {
                Outcome::ModelDetail(upstream.model_info(server, &model_id, timeout).await)
            }
        };
        Fetched {
            server: self.server,
            outcome,
        }
    }
}

impl Fetched {
    /// Render the reply, caching listings while the server is unchanged.
    pub fn finish(self, ctx: &mut CommandContext<'_>) -> String {
        let server = &self.server;
        let (reply, models) = match self.outcome {
            Outcome::Test(Ok((elapsed, models))) => {
                (render::test_success(server, elapsed, &models), models)
            }
            Outcome::Test(Err(err)) => return render::test_failure(server, &err.to_reply()),
            Outcome::ModelList(Ok(models)) => (render::model_list(server, &models), models),
            Outcome::ModelDetail(Ok(model)) => return render::model_detail(server, &model),
            Outcome::ModelList(Err(err)) | Outcome::ModelDetail(Err(err)) => {
                return err.to_reply()
            }
        };

        if ctx.registry.get(&server.id) == Some(server) {
            ctx.models.insert(&server.id, models);
        }
        reply
    }
}

pub(super) fn dispatch(
    invocation: &Invocation,
    ctx: &mut CommandContext<'_>,
) -> Result<Step, ConnectorError> {
    let args = &invocation.args;

    match invocation.command.verb {
        Verb::Help => Ok(Step::Reply(render::help())),
        Verb::ListPopular => Ok(Step::Reply(render::popular_list())),
        Verb::List => Ok(Step::Reply(render::server_list(
            ctx.registry.list(),
            ctx.session.get_active(),
        ))),
        Verb::Add => {
            let server = ctx.registry.create(NewServer {
                name: args.required("name")?.to_string(),
                url: args.required("url")?.to_string(),
                api_key: args.owned("api_key"),
                default_model: args.owned("default_model"),
            })?;
            Ok(Step::Reply(render::server_added(&server)))
        }
        Verb::AddPopular => {
            let server = ctx.registry.create_from_popular(
                args.required("template_id")?,
                args.owned("api_key"),
                args.owned("default_model"),
            )?;
            Ok(Step::Reply(render::server_added(&server)))
        }
        Verb::Update => {
            let id = args.required("server_id")?;
            let field: ServerField = args.required("field")?.parse()?;
            let value = args.get("value").unwrap_or_default();
            let server = ctx.registry.update(id, field, value)?;
            if field == ServerField::Url || field == ServerField::ApiKey {
                ctx.models.invalidate(id);
            }
            Ok(Step::Reply(render::server_updated(&server, field.as_str())))
        }
        Verb::Delete => {
            let id = args.required("server_id")?;
            let server = ctx.registry.lookup(id)?.clone();
            ctx.registry.delete(id)?;
            ctx.models.invalidate(id);
            let was_active = ctx.session.get_active() == Some(id);
            Ok(Step::Reply(render::server_deleted(&server, was_active)))
        }
        Verb::Use => {
            let id = args.required("server_id")?;
            let server = ctx.registry.lookup(id)?;
            ctx.session.set_active(id);
            info!(id, "selected active server");
            Ok(Step::Reply(render::now_using(server)))
        }
        Verb::Active => {
            let server = ctx.session.resolve(ctx.registry);
            let dangling = match server {
                Some(_) => None,
                None => ctx.session.get_active(),
            };
            Ok(Step::Reply(render::active(server, dangling)))
        }
        Verb::Clear => {
            let previous = ctx.session.get_active().map(str::to_string);
            ctx.session.clear_active();
            Ok(Step::Reply(render::cleared(previous.as_deref())))
        }
        Verb::Test => {
            let server = ctx.registry.lookup(args.required("server_id")?)?.clone();
            Ok(Step::Fetch(Fetch {
                server,
                kind: FetchKind::Test,
            }))
        }
        Verb::Models => {
            let server = ctx.registry.lookup(args.required("server_id")?)?.clone();

            if let Some(model_id) = args.get("model_id").filter(|id| !id.trim().is_empty()) {
                return Ok(Step::Fetch(Fetch {
                    server,
                    kind: FetchKind::ModelDetail(model_id.to_string()),
                }));
            }

            if let Some(models) = ctx.models.get(&server.id) {
                return Ok(Step::Reply(render::model_list(&server, models)));
            }
            Ok(Step::Fetch(Fetch {
                server,
                kind: FetchKind::ModelList,
            }))
        }
    }
}
