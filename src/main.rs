//! webfront server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                    WEBFRONT                       │
//!   Client Request    │  ┌────────┐   ┌────────────┐   ┌──────────────┐  │
//!   ──────────────────┼─▶│  http  │──▶│ container  │──▶│    router    │  │
//!                     │  │ server │   │ (prefixes) │   │ (templates)  │  │
//!                     │  └────────┘   └────────────┘   └──────┬───────┘  │
//!                     │                                       │ miss     │
//!                     │                                       ▼          │
//!   Client Response   │                               ┌──────────────┐   │    Upstream
//!   ◀─────────────────┼───────────────────────────────│   upstream   │◀──┼──▶ application
//!                     │                               │    bridge    │   │    server
//!                     │                               └──────────────┘   │
//!                     │   cross-cutting: config, observability,          │
//!                     │   session, admin, lifecycle                      │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use webfront::config::load_or_default;
use webfront::lifecycle::signals::wait_for_signal;
use webfront::observability::{logging, metrics};
use webfront::Application;

#[derive(Parser, Debug)]
#[command(name = "webfront", version, about = "Web front server with upstream integration")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webfront starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_enabled = config.upstream.enabled,
        upstream = %format!("{}:{}", config.upstream.host, config.upstream.port),
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let app = Application::new(config);
    let shutdown = app.shutdown();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    app.run(listener).await?;
    Ok(())
}
