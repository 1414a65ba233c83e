//! Agentcom Binary
//!
//! Accepts agent snapshot reports over gRPC and serves the latest one on
//! `http://<host>:3001/lastSnapshot`.
//!
//! # Usage
//! ```bash
//! agentcom [--port 8080] [--host 0.0.0.0] [--snapshot-path /tmp/snapshot.json] [--verbose]
//! ```

use agentcom::{AgentCom, AgentComConfig, READBACK_PORT};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Agentcom - agent snapshot director
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// gRPC port to listen on
    #[arg(short, long, env = "AGENTCOM_PORT")]
    port: Option<u16>,

    /// Host to bind both listeners to
    #[arg(long)]
    host: Option<String>,

    /// File the latest snapshot is written to
    #[arg(long)]
    snapshot_path: Option<String>,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(args.verbose)
        .init();

    let mut config = match &args.config {
        Some(path) => AgentComConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path))?,
        None => AgentComConfig::default(),
    };
    if let Some(port) = args.port {
        config = config.with_rpc_port(port);
    }
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(path) = args.snapshot_path {
        config = config.with_snapshot_path(path);
    }
    config = config.with_http_port(READBACK_PORT);

    let completion = AgentCom::new(config).start().await?;
    tracing::info!(
        rpc = %completion.rpc_addr(),
        http = %completion.http_addr(),
        "agentcom running, press Ctrl+C to stop"
    );

    let reason = completion.wait().await?;
    tracing::info!(?reason, "agentcom stopped");
    Ok(())
}
