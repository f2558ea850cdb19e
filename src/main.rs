//! FPP monitor (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                   FPP MONITOR                     │
//!                    │                                                   │
//!                    │  ┌──────────┐   tick   ┌──────────┐   HTTP       │
//!                    │  │ poller   │─────────▶│ device   │──────────────┼──▶ FPP
//!                    │  │ service  │          │ client   │              │
//!                    │  └────┬─────┘          └──────────┘              │
//!                    │       │ allow / record                            │
//!                    │       ▼                                           │
//!                    │  ┌──────────┐  persist ┌──────────┐              │
//!                    │  │ circuit  │─────────▶│ storage  │              │
//!                    │  │ breaker  │          │ (sqlite) │              │
//!                    │  └──────────┘          └────▲─────┘              │
//!                    │                             │ read cache          │
//!     Client ────────┼──────────────────────▶ ┌────┴─────┐              │
//!                    │                        │ http +   │              │
//!                    │                        │ admin    │              │
//!                    │                        └──────────┘              │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use fpp_monitor::config::load_or_default;
use fpp_monitor::lifecycle::signals::shutdown_on_signal;
use fpp_monitor::observability::{logging, metrics};
use fpp_monitor::{App, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "fpp-monitor")]
#[command(about = "Caching monitor for a Falcon Player controller", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve the cache without starting the background poller
    #[arg(long)]
    no_poll: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("fpp-monitor v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        device = %config.device.base_url,
        poll_interval_secs = config.poller.interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let app = App::build(config)?;

    let listener = TcpListener::bind(&app.config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let mut poller = app.poller_service();
    if app.config.poller.enabled && !args.no_poll {
        poller.start();
    } else {
        tracing::warn!("Background poller disabled; cache will not refresh");
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(app.state(), &app.config.server);
    let served = server.run(listener, shutdown.clone()).await;

    // Stop polling even if the server failed.
    shutdown.trigger();
    poller.stop().await;
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
