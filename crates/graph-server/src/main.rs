use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use graphline_core::config::ServerConfig;
use graphline_core::logging;
use graphline_core::server::{serve, GraphServer};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "graphline", version, about = "Shared weighted graph over a line protocol")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.debug {
        config.debug = true;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    config.validate().context("validating configuration")?;

    logging::init(config.debug);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let server = GraphServer::new(config.session.clone());
    serve(listener, server, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await;

    Ok(())
}
