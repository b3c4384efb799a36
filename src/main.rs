//! Session gateway binary.
//!
//! Startup order: configuration, logging, metrics, session store and
//! sweeper, config watcher, listener, server.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use session_gateway::config::loader::{apply_env_overrides, load_config};
use session_gateway::config::watcher::ConfigWatcher;
use session_gateway::config::GatewayConfig;
use session_gateway::http::HttpServer;
use session_gateway::lifecycle::{signals, Shutdown};
use session_gateway::observability::logging::init_logging;
use session_gateway::observability::metrics::init_metrics;
use session_gateway::session::MemorySessionStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    let config = apply_env_overrides(config);

    init_logging(&config.observability.log_level);

    tracing::info!("session-gateway v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mount_path = %config.gateway.mount_path,
        upstream = config.gateway.upstream_url.as_deref().unwrap_or("<disabled>"),
        request_timeout_ms = config.gateway.request_timeout_ms,
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

    let store = Arc::new(MemorySessionStore::new(config.session.ttl_secs));

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let sweeper_shutdown = shutdown.subscribe();

    store
        .clone()
        .spawn_sweeper(config.session.cleanup_interval_secs, sweeper_shutdown);

    // Keep the watcher handle (and the idle fallback sender) alive for the
    // process lifetime.
    let (_idle_tx, idle_updates) = mpsc::unbounded_channel();
    let (config_updates, _watcher) = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (idle_updates, None),
    };

    signals::spawn_signal_handler(shutdown);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, store);
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
