//! Rate-limiting reverse-proxy gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────────┐
//!                     │                   GATEWAY                      │
//!                     │                                                │
//!   Client Request    │  ┌──────────┐   ┌─────────┐   ┌────────────┐  │
//!   ──────────────────┼─▶│ security │──▶│ limiter │──▶│  forward   │──┼──▶ Upstream
//!                     │  │client ip │   │  engine │   │  (reqwest) │  │    Backend
//!                     │  └──────────┘   └────┬────┘   └─────┬──────┘  │
//!                     │                      │              │         │
//!   Client Response   │                 429 reject     relay / 502    │
//!   ◀─────────────────┼──────────────────────┴──────────────┘         │
//!                     │                                                │
//!                     │  ┌──────────────────────────────────────────┐ │
//!                     │  │          Cross-Cutting Concerns          │ │
//!                     │  │  config │ admin API │ observability │    │ │
//!                     │  │         │           │ lifecycle          │ │
//!                     │  └──────────────────────────────────────────┘ │
//!                     └────────────────────────────────────────────────┘
//! ```

use std::path::Path;

use tokio::net::TcpListener;

use rategate::config::loader::load_config;
use rategate::config::GatewayConfig;
use rategate::http::HttpServer;
use rategate::lifecycle::Shutdown;
use rategate::observability::logging::init_tracing;
use rategate::observability::metrics::init_metrics;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional config path as the first argument; defaults otherwise.
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => GatewayConfig::default(),
    };

    init_tracing(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        rate_limit = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown;
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                shutdown.trigger();
            }
        }
    });

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
