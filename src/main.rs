// cmdgate - Main Entry Point
//
// Remote command-execution service: an authenticated HTTP endpoint that
// runs a shell command (or an allowlisted task) as a child process with a
// bounded timeout and returns exit status plus captured output.

use anyhow::{Context, Result};
use clap::Parser;
use cmdgate::config::{Config, ServiceMode, DEFAULT_PORT, TOKEN_ENV_VAR};
use cmdgate::{metrics, server};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// cmdgate: bounded remote command execution over HTTP
#[derive(Parser, Debug)]
#[command(name = "cmdgate")]
#[command(author = "cmdgate Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Authenticated HTTP service for bounded remote command execution", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Service mode: free-form commands or the fixed task allowlist
    #[arg(long, value_enum, default_value = "direct")]
    mode: ServiceMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(filter.into())
                .from_env_lossy(),
        )
        .init();

    metrics::init().context("Failed to initialize metrics")?;

    let config = Config {
        port: args.port,
        mode: args.mode,
        ..Config::from_env()
    };

    if config.token.is_none() {
        warn!(
            "{} is not set; every request will be rejected as unauthorized",
            TOKEN_ENV_VAR
        );
    }

    info!("cmdgate v0.1.0 starting (mode: {:?})", config.mode);

    server::serve(Arc::new(config)).await
}
