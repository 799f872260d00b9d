//! skywalking-mcp: MCP server for Apache SkyWalking
//!
//! Serves SkyWalking query tools to AI assistants over stdio or HTTP/SSE.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use skywalking_mcp::config::{ServerConfig, SseConfig, DEFAULT_SSE_ADDRESS};
use skywalking_mcp::error::ServerError;
use skywalking_mcp::logging::{init_tracing, parse_log_level};
use skywalking_mcp::mcp::{signal_token, SseServer, StdioServer};

/// MCP server for Apache SkyWalking.
///
/// Exposes SkyWalking OAP queries as tools to AI assistants.
#[derive(Parser, Debug)]
#[command(name = "skywalking-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SkyWalking OAP URL, e.g. http://localhost:12800
    #[arg(long, env = "SW_URL", global = true)]
    sw_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SW_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Only register read-only tools
    #[arg(long, env = "SW_READ_ONLY", global = true)]
    read_only: bool,

    /// Log every message exchanged on stdin/stdout
    #[arg(long, env = "SW_LOG_COMMAND", global = true)]
    log_command: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "SW_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve MCP over stdin/stdout
    Stdio,

    /// Serve MCP over HTTP with server-sent events
    Sse {
        /// Address to listen on
        #[arg(long, env = "SW_SSE_ADDRESS", default_value = DEFAULT_SSE_ADDRESS)]
        sse_address: String,

        /// Path prefix for the SSE and message endpoints
        #[arg(long, env = "SW_BASE_PATH", default_value = "")]
        base_path: String,
    },
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            url: self.sw_url.clone(),
            read_only: self.read_only,
            log_file: self.log_file.clone(),
            log_commands: self.log_command,
        }
    }
}

async fn run(args: Args) -> Result<(), ServerError> {
    let config = args.server_config();
    let shutdown = signal_token();

    match args.command {
        Command::Stdio => StdioServer::new(&config)?.run(shutdown).await,
        Command::Sse {
            sse_address,
            base_path,
        } => {
            SseServer::new(&config, SseConfig::new(sse_address, base_path))?
                .run(shutdown)
                .await
        }
    }
}

/// Entry point for the skywalking-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_tracing(parse_log_level(&args.log_level), args.log_file.as_deref()) {
        eprintln!("Configuration error: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        read_only = args.read_only,
        "Starting skywalking-mcp server"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(args));

    // stdin reads block a worker thread that never returns on its own
    runtime.shutdown_background();

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn sse_defaults() {
        let args = Args::try_parse_from(["skywalking-mcp", "sse"]).unwrap();
        let Command::Sse {
            sse_address,
            base_path,
        } = args.command
        else {
            panic!("expected sse subcommand");
        };
        assert_eq!(sse_address, "localhost:8000");
        assert_eq!(base_path, "");
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "skywalking-mcp",
            "stdio",
            "--sw-url",
            "http://oap:12800",
            "--read-only",
        ])
        .unwrap();
        let config = args.server_config();
        assert_eq!(config.url(), Some("http://oap:12800"));
        assert!(config.read_only);
        assert!(!config.log_commands);
    }

    #[test]
    fn subcommand_required() {
        assert!(Args::try_parse_from(["skywalking-mcp"]).is_err());
    }
}
