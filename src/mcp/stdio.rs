//! Stdio transport runner.
//!
//! Serves a single MCP session over stdin/stdout until the shutdown token
//! is cancelled, stdin reaches EOF, or the I/O loop fails.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::mcp::context::{stdio_context_fn, RequestContext, StdioContextFn};
use crate::mcp::io_log::{LoggedReader, LoggedWriter};
use crate::mcp::lifecycle::{RunnerHandle, RunnerState};
use crate::mcp::server::{McpServer, Session};
use crate::mcp::transport::LineTransport;
use crate::tools;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Line written to stderr once the runner is listening.
pub const STDIO_READY_MESSAGE: &str = "SkyWalking MCP Server running on stdio";

/// Runs the MCP server over stdin/stdout.
#[derive(Debug)]
pub struct StdioServer {
    server: McpServer,
    context: RequestContext,
    log_commands: bool,
    handle: RunnerHandle,
}

impl StdioServer {
    /// Validates `config`, registers the tools and derives the context.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if no backend URL is configured and
    /// [`ServerError::Registration`] if a tool cannot be registered.
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        config.validate_for_stdio()?;
        let registry = tools::build_registry(config.read_only)?;
        Ok(Self::from_parts(
            McpServer::new(registry),
            &stdio_context_fn(config),
            config.log_commands,
        ))
    }

    /// Assembles a runner from an existing server and enrichment chain.
    #[must_use]
    pub fn from_parts(server: McpServer, enrich: &StdioContextFn, log_commands: bool) -> Self {
        Self {
            server,
            context: enrich(RequestContext::default()),
            log_commands,
            handle: RunnerHandle::new("stdio"),
        }
    }

    /// The context every tool call in this process receives.
    #[must_use]
    pub const fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Handle for observing the runner's state.
    #[must_use]
    pub fn handle(&self) -> RunnerHandle {
        self.handle.clone()
    }

    /// Serves stdin/stdout until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if reading or writing fails.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        self.run_with_io(tokio::io::stdin(), tokio::io::stdout(), shutdown)
            .await
    }

    /// Serves the given streams until shutdown.
    ///
    /// Returns `Ok(())` when the token is cancelled or the reader reaches
    /// EOF.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if reading or writing fails.
    pub async fn run_with_io<R, W>(
        self,
        reader: R,
        writer: W,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer): (BoxedReader, BoxedWriter) = if self.log_commands {
            (
                Box::new(LoggedReader::new(reader)),
                Box::new(LoggedWriter::new(writer)),
            )
        } else {
            (Box::new(reader), Box::new(writer))
        };

        let handle = self.handle;
        let transport = LineTransport::new(reader, writer);
        let session = Session::new("stdio", self.context);

        let mut listener = tokio::spawn(listen(self.server, session, transport));
        handle.set_state(RunnerState::Listening);
        eprintln!("{STDIO_READY_MESSAGE}");

        let result = tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("Shutting down stdio server");
                handle.set_state(RunnerState::ShuttingDown);
                listener.abort();
                Ok(())
            }
            joined = &mut listener => match joined {
                Ok(Ok(())) => {
                    tracing::info!("stdin closed, stopping server");
                    Ok(())
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "stdio transport failed");
                    handle.set_state(RunnerState::Crashed);
                    Err(ServerError::transport("stdio transport failed", e))
                }
                Err(e) => {
                    tracing::error!(error = %e, "stdio listener task failed");
                    handle.set_state(RunnerState::Crashed);
                    Err(ServerError::transport("stdio listener task failed", io::Error::other(e)))
                }
            },
        };

        handle.set_state(RunnerState::Stopped);
        result
    }
}

async fn listen(
    server: McpServer,
    session: Session,
    mut transport: LineTransport<BoxedReader, BoxedWriter>,
) -> io::Result<()> {
    while let Some(line) = transport.read_line().await? {
        if let Some(response) = server.handle_line(&session, &line).await {
            transport.write_message(&response).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn missing_url_rejected() {
        let err = StdioServer::new(&ServerConfig::default()).unwrap_err();
        assert!(matches!(err, ServerError::Config(ConfigError::MissingUrl)));
        assert_eq!(err.to_string(), "SW_URL must be specified");
    }

    #[test]
    fn context_derived_once_from_config() {
        let config = ServerConfig {
            url: Some("http://oap:12800".to_string()),
            read_only: true,
            ..ServerConfig::default()
        };
        let server = StdioServer::new(&config).unwrap();
        assert_eq!(server.context().backend_url(), Some("http://oap:12800/graphql"));
        assert!(server.context().read_only());
        assert_eq!(server.handle().state(), RunnerState::Created);
    }
}
