//! Mirror router service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ ClientIp (X-Forwarded-For | peer)
//!                                          │
//!                                          ▼
//!                                    MirrorRouter
//!                          ┌───────────────┼────────────────┐
//!                          ▼               ▼                ▼
//!                   geo/ASN resolvers   catalog        ranking engine
//!                   (MaxMind + cache)   (SQLite)     subnet → ASN → geo
//!                          └───────────────┼────────────────┘
//!                                          ▼
//!     Client Response ◀──────────── ranked mirrors (JSON | text)
//!
//!     Cross-cutting: config, tracing, metrics, lifecycle, timeouts
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mirror_router::config::load_or_default;
use mirror_router::lifecycle::signals::spawn_signal_handler;
use mirror_router::observability::logging::init_logging;
use mirror_router::{AppContext, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "mirror-router")]
#[command(about = "Serves mirror lists ranked by client locality", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults plus environment when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    init_logging(&config.observability);
    tracing::info!("mirror-router v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        catalog = %config.catalog.database_path,
        city_db = %config.geoip.city_db_path,
        asn_db = %config.geoip.asn_db_path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let bind_address = config.listener.bind_address.clone();
    let context = AppContext::build(config).await?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());
    let _watcher = context.watch_databases()?;
    let janitor = context.spawn_cache_janitor(&shutdown);

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(context).run(listener, &shutdown).await?;

    // Server stops on the same signal; make sure background tasks see it too.
    shutdown.trigger();
    tracing::info!(
        pending_tasks = shutdown.receiver_count(),
        "Waiting for background tasks"
    );
    if let Some(janitor) = janitor {
        let _ = janitor.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
