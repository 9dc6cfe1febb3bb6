//! `!mcp` chat commands: recognition, argument binding and dispatch.

mod args;
mod handlers;
mod registry;
mod render;

pub use args::{tokenize, Token};
pub use handlers::{Fetch, Fetched, Step};
pub use registry::{all_commands, find_command, ArgSpec, Command, Verb};

use crate::core::errors::ConnectorError;
use crate::core::model_cache::ModelCache;
use crate::core::registry::Registry;
use crate::core::session::SessionState;
use tracing::debug;

pub const COMMAND_PREFIX: &str = "!mcp";

/// The state a command may read or change. Upstream calls happen outside
/// it, through [`Fetch`].
pub struct CommandContext<'a> {
    pub registry: &'a mut Registry,
    pub session: &'a mut SessionState,
    pub models: &'a mut ModelCache,
}

/// Arguments bound to a command's parameter names.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BoundArgs {
    values: Vec<(&'static str, String)>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn required(&self, name: &str) -> Result<&str, ConnectorError> {
        self.get(name)
            .ok_or_else(|| ConnectorError::Validation(format!("Missing argument: {name}")))
    }

    /// Optional argument as an owned value.
    pub fn owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }
}

#[derive(Debug)]
pub struct Invocation {
    pub command: &'static Command,
    pub args: BoundArgs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnknownVerb(String),
    Invalid(ConnectorError),
}

impl ParseError {
    pub fn to_reply(&self) -> String {
        match self {
            ParseError::UnknownVerb(name) => render::unknown_command(name),
            ParseError::Invalid(err) => err.to_reply(),
        }
    }
}

/// Whether `text` is addressed to the connector rather than the upstream.
pub fn is_command(text: &str) -> bool {
    command_body(text).is_some()
}

fn command_body(text: &str) -> Option<&str> {
    let rest = text.trim_start().strip_prefix(COMMAND_PREFIX)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

/// Parse a command. `None` means the text is ordinary chat content.
pub fn parse(text: &str) -> Option<Result<Invocation, ParseError>> {
    let body = command_body(text)?;
    Some(parse_body(body))
}

fn parse_body(body: &str) -> Result<Invocation, ParseError> {
    let tokens = tokenize(body).map_err(|err| ParseError::Invalid(ConnectorError::Validation(err)))?;
    let mut tokens = tokens.into_iter();

    let verb = match tokens.next() {
        None => "help".to_string(),
        Some(Token::Positional(verb)) => verb,
        Some(Token::Named { name, value }) => format!("{name}={value}"),
    };
    let command = find_command(&verb).ok_or(ParseError::UnknownVerb(verb))?;
    let args = bind(command, tokens.collect()).map_err(ParseError::Invalid)?;
    Ok(Invocation { command, args })
}

fn bind(command: &'static Command, tokens: Vec<Token>) -> Result<BoundArgs, ConnectorError> {
    let usage_hint = || format!("Usage: `{}`", command.usage);
    let mut slots: Vec<Option<String>> = vec![None; command.args.len()];
    let mut positionals = Vec::new();

    for token in tokens {
        match token {
            Token::Positional(value) => positionals.push(value),
            Token::Named { name, value } => {
                // `key==` or `a=b` values that name no parameter stay positional.
                let Some(index) = command
                    .args
                    .iter()
                    .position(|spec| spec.name.eq_ignore_ascii_case(&name))
                else {
                    positionals.push(format!("{name}={value}"));
                    continue;
                };
                if slots[index].is_some() {
                    return Err(ConnectorError::Validation(format!(
                        "Argument '{}' was given more than once. {}",
                        command.args[index].name,
                        usage_hint()
                    )));
                }
                slots[index] = Some(value);
            }
        }
    }

    for value in positionals {
        let slot = slots.iter_mut().find(|slot| slot.is_none()).ok_or_else(|| {
            ConnectorError::Validation(format!("Too many arguments. {}", usage_hint()))
        })?;
        *slot = Some(value);
    }

    let mut values = Vec::new();
    for (spec, slot) in command.args.iter().zip(slots) {
        match slot {
            Some(value) => values.push((spec.name, value)),
            None if spec.required => {
                return Err(ConnectorError::Validation(format!(
                    "Missing argument: {}. {}",
                    spec.name,
                    usage_hint()
                )))
            }
            None => {}
        }
    }
    Ok(BoundArgs { values })
}

/// Run the local part of a command, rendering failures as reply text.
pub fn start(invocation: &Invocation, ctx: &mut CommandContext<'_>) -> Step {
    debug!(command = invocation.command.name, "executing command");
    handlers::dispatch(invocation, ctx).unwrap_or_else(|err| Step::Reply(err.to_reply()))
}
