//! Demo server for the per-request timeout layer.
//!
//! `GET /hello` sleeps three seconds behind the configured deadline, `/fast`
//! answers immediately, `/panic` fails after 100ms and `/cooperative` stops
//! working once its deadline is cancelled.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_deadline::config::{load_config, ServerConfig};
use request_deadline::observability::{logging, metrics};
use request_deadline::HttpServer;

#[derive(Parser)]
#[command(name = "request-deadline")]
#[command(about = "Serve demo routes behind a per-request timeout", long_about = None)]
struct Cli {
    /// TOML config file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!("request-deadline v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        deadline_ms = config.timeout.deadline_ms,
        timeout_status = config.timeout.status,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
