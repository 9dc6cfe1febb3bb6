use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::chat_stream::{ChatStream, StreamMessage};
use crate::core::connector::{Connector, ConnectorReply};

const INTERRUPTED_NOTICE: &str = "[interrupted]";

/// Interactive loop over stdin. Ctrl+C abandons the reply in flight, or
/// quits when no reply is pending.
pub async fn run(connector: &Connector) -> Result<(), Box<dyn Error>> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    eprintln!("Type a message, or `!mcp help` for commands. End input to quit.");
    run_session(connector, stdin, &mut stdout, &Interrupts::listen()).await
}

/// Handle one turn and print the reply.
pub async fn exec(connector: &Connector, text: &str) -> Result<(), Box<dyn Error>> {
    let mut stdout = tokio::io::stdout();
    let interrupts = Interrupts::listen();
    handle_turn(connector, text, &mut stdout, &interrupts).await?;
    Ok(())
}

/// Routes Ctrl+C to the turn in flight, or to session shutdown when idle.
#[derive(Clone, Default)]
pub(crate) struct Interrupts {
    turn: Arc<Mutex<Option<CancellationToken>>>,
    shutdown: CancellationToken,
}

impl Interrupts {
    fn listen() -> Self {
        let interrupts = Self::default();
        let handle = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !handle.interrupt() {
                    break;
                }
            }
        });
        interrupts
    }

    /// Returns false once the interrupt asked for shutdown.
    fn interrupt(&self) -> bool {
        match self.slot().take() {
            Some(turn) => {
                turn.cancel();
                true
            }
            None => {
                self.shutdown.cancel();
                false
            }
        }
    }

    fn begin_turn(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    fn end_turn(&self) {
        self.slot().take();
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) async fn run_session<R, W>(
    connector: &Connector,
    input: R,
    output: &mut W,
    interrupts: &Interrupts,
) -> Result<(), Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = interrupts.shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        handle_turn(connector, line, output, interrupts).await?;
    }
    Ok(())
}

async fn handle_turn<W>(
    connector: &Connector,
    text: &str,
    output: &mut W,
    interrupts: &Interrupts,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let token = interrupts.begin_turn();
    let result = async {
        let reply = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            reply = connector.handle_text(text) => Some(reply),
        };
        match reply {
            Some(reply) => print_reply(reply, output, &token).await,
            None => print_interrupted(output).await,
        }
    }
    .await;
    interrupts.end_turn();
    result
}

async fn print_interrupted<W>(output: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    debug!("reply abandoned by user");
    output.write_all(INTERRUPTED_NOTICE.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

async fn print_reply<W>(
    reply: ConnectorReply,
    output: &mut W,
    interrupt: &CancellationToken,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match reply {
        ConnectorReply::Text(text) => {
            output.write_all(text.as_bytes()).await?;
        }
        ConnectorReply::Stream(stream) => print_stream(stream, output, interrupt).await?,
    }
    output.write_all(b"\n").await?;
    output.flush().await
}

async fn print_stream<W>(
    mut stream: ChatStream,
    output: &mut W,
    interrupt: &CancellationToken,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut wrote_text = false;
    loop {
        let message = tokio::select! {
            biased;
            _ = interrupt.cancelled() => {
                debug!("reply abandoned by user");
                output.write_all(b"\n").await?;
                output.write_all(INTERRUPTED_NOTICE.as_bytes()).await?;
                return Ok(());
            }
            message = stream.next() => message,
        };

        match message {
            Some(StreamMessage::Chunk(chunk)) => {
                if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                    output.write_all(content.as_bytes()).await?;
                    output.flush().await?;
                    wrote_text = true;
                }
            }
            Some(StreamMessage::Error(error)) => {
                if wrote_text {
                    output.write_all(b"\n\n").await?;
                }
                output.write_all(error.as_bytes()).await?;
            }
            Some(StreamMessage::End) | None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat_stream::ChatChunk;
    use crate::core::config::ConnectorSettings;
    use crate::core::registry::{NewServer, Registry};
    use crate::utils::test_utils::MockUpstream;
    use std::sync::Arc;

    fn connector_with_active_server(upstream: Arc<MockUpstream>, stream: bool) -> Connector {
        let mut registry = Registry::in_memory();
        let server = registry
            .create(NewServer::new("local", "http://localhost:3000"))
            .expect("create");
        let settings = ConnectorSettings {
            stream,
            server_id: Some(server.id),
            default_model: Some("llama3".to_string()),
            ..Default::default()
        };
        Connector::new(settings, registry, upstream)
    }

    async fn transcript(connector: &Connector, input: &str) -> String {
        let mut output = Vec::new();
        run_session(connector, input.as_bytes(), &mut output, &Interrupts::default())
            .await
            .expect("session");
        String::from_utf8(output).expect("utf8")
    }

    #[tokio::test]
    async fn each_line_is_one_turn() {
        let upstream = Arc::new(MockUpstream::replying("pong"));
        let connector = connector_with_active_server(upstream.clone(), false);

        let output = transcript(&connector, "ping\n\n  \nping again\n").await;
        assert_eq!(output, "pong\npong\n");

        let sent = upstream.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1.messages.len(), 1);
        assert_eq!(sent[1].1.messages[0].text(), Some("ping again"));
    }

    #[tokio::test]
    async fn streamed_replies_are_printed_in_full() {
        let upstream = Arc::new(MockUpstream::replying("one two three"));
        let connector = connector_with_active_server(upstream, true);

        let output = transcript(&connector, "count\n").await;
        assert_eq!(output, "one two three\n");
    }

    #[tokio::test]
    async fn commands_bypass_the_upstream() {
        let upstream = Arc::new(MockUpstream::replying("unused"));
        let connector = connector_with_active_server(upstream.clone(), false);

        let output = transcript(&connector, "!mcp active\n").await;
        assert!(output.starts_with("## Active MCP Server: local"));
        assert!(upstream.sent().is_empty());
    }

    #[tokio::test]
    async fn interrupted_stream_stops_printing() {
        let stream = ChatStream::from_messages(vec![
            StreamMessage::Chunk(ChatChunk::text("never shown")),
        ]);
        let token = CancellationToken::new();
        token.cancel();

        let mut output = Vec::new();
        print_reply(ConnectorReply::Stream(stream), &mut output, &token)
            .await
            .expect("print");
        let output = String::from_utf8(output).expect("utf8");
        assert_eq!(output, format!("\n{INTERRUPTED_NOTICE}\n"));
    }

    #[tokio::test]
    async fn stream_errors_follow_partial_text() {
        let stream = ChatStream::from_messages(vec![
            StreamMessage::Chunk(ChatChunk::text("partial")),
            StreamMessage::Error("Error: The stream was interrupted".to_string()),
        ]);
        let mut output = Vec::new();
        print_reply(
            ConnectorReply::Stream(stream),
            &mut output,
            &CancellationToken::new(),
        )
        .await
        .expect("print");
        assert_eq!(
            String::from_utf8(output).expect("utf8"),
            "partial\n\nError: The stream was interrupted\n"
        );
    }

    #[test]
    fn interrupt_cancels_turn_then_requests_shutdown() {
        let interrupts = Interrupts::default();
        let turn = interrupts.begin_turn();
        assert!(interrupts.interrupt());
        assert!(turn.is_cancelled());
        assert!(!interrupts.shutdown.is_cancelled());

        assert!(!interrupts.interrupt());
        assert!(interrupts.shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn shutdown_ends_the_session_before_reading_more() {
        let upstream = Arc::new(MockUpstream::replying("pong"));
        let connector = connector_with_active_server(upstream.clone(), false);
        let interrupts = Interrupts::default();
        interrupts.interrupt();

        let mut output = Vec::new();
        run_session(&connector, "ping\n".as_bytes(), &mut output, &interrupts)
            .await
            .expect("session");
        assert!(output.is_empty());
        assert!(upstream.sent().is_empty());
    }
}
