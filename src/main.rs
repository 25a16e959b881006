//! edge-gate
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!   Client ─────────▶│ tower-http: trace · request id · timeout ·   │
//!                    │             body limit · security headers    │
//!                    ├──────────────────────────────────────────────┤
//!                    │ CORS → logging → auth (route resolution)     │
//!                    ├──────────────────────────────────────────────┤
//!                    │ dispatch ── rate limiter (per-key actors)    │
//!                    │    ├── cache controller ──┐                  │
//!                    │    ├── upload / CDN ──────┼──▶ KV store      │
//!                    │    │                      └──▶ blob store    │
//!                    │    └── geo / canton                          │
//!                    └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use edge_gate::config::{load_config, load_from_env};
use edge_gate::lifecycle::{build_stores, spawn_kv_sweeper, wait_for_signal, watch_config, Shutdown};
use edge_gate::observability::{logging, metrics};
use edge_gate::GatewayServer;

#[derive(Parser)]
#[command(name = "edge-gate")]
#[command(about = "Edge request gateway", version)]
struct Args {
    /// TOML config file. Without it, defaults plus EDGE_* variables apply.
    #[arg(short, long, env = "EDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-gate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        api_keys = config.auth.api_keys.len(),
        "Configuration loaded"
    );
    if config.auth.api_keys.is_empty() {
        tracing::warn!("No API keys configured; protected endpoints will reject every request");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let handles = build_stores(&config.storage)?;
    let (_watcher, config_updates) = watch_config(args.config.as_deref());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let sweeper = spawn_kv_sweeper(
        handles.kv.clone(),
        config.storage.kv_sweep_interval(),
        shutdown.subscribe(),
    );
    let server = GatewayServer::new(config, handles.stores.clone())?;

    let mut server_task = tokio::spawn(server.run(listener, config_updates, server_shutdown));

    tokio::select! {
        signal = wait_for_signal() => {
            tracing::info!(signal = signal, "Signal received");
            shutdown.trigger();
            server_task.await??;
        }
        result = &mut server_task => {
            tracing::error!("HTTP server exited unexpectedly");
            shutdown.trigger();
            result??;
        }
    }

    let _ = sweeper.await;
    if let Err(e) = handles.persist() {
        tracing::error!(error = %e, "Failed to write store snapshots");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
