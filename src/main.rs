//! Stork Gateway - Entry Point
//!
//! Starts the relay server and the pool reload service, wires `SIGHUP` to
//! pool reloads and shuts everything down on Ctrl+C or `SIGTERM`.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stork::config::{Config, LogConfig};
use stork::error;
use stork::proxy::{
    create_strategy, FileProvider, Provider, ProxyPool, RelayServer, StaticProvider,
};
use stork::services::{ReloadHandle, ReloadService};

#[tokio::main]
async fn main() -> error::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    init_tracing(&config.log);
    info!("Starting Stork Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Build the proxy pool
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(FileProvider::new(config.proxies_file())),
        Arc::new(StaticProvider::new(config.pool.static_proxies.clone())),
    ];
    let pool = Arc::new(ProxyPool::new(providers, create_strategy(config.pool.strategy)));
    info!("Using selection strategy: {}", pool.strategy_name());

    // Create shutdown channel
    let (shutdown_tx, _) = watch::channel(false);

    // Start reload service (performs the initial bootstrap)
    let (reload_handle, reload_rx) = ReloadService::channel();
    let reload_service = ReloadService::new(pool.clone(), config.health_checker());
    let reload_task = tokio::spawn(reload_service.run(reload_rx, shutdown_tx.subscribe()));

    // Start relay server
    let relay_server = RelayServer::new(config.server.clone(), pool.clone());
    let relay_shutdown = shutdown_tx.subscribe();
    let relay_task = tokio::spawn(async move {
        if let Err(e) = relay_server.run(relay_shutdown).await {
            error!("Relay server error: {}", e);
        }
    });

    let pid = std::process::id();
    info!("Starting server at {}. PID: {}", config.listen_addr(), pid);
    info!("Send HUP signal to reload the proxy pool: kill -HUP {}", pid);

    // Wait for shutdown signal, forwarding reload signals meanwhile
    wait_for_signals(&reload_handle).await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(relay_task, reload_task);

    info!("Stork Gateway stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("stork={}", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for Ctrl+C or SIGTERM; SIGHUP triggers a pool reload
async fn wait_for_signals(reload: &ReloadHandle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    #[cfg(unix)]
    let hangup = async {
        let mut hup = signal::unix::signal(signal::unix::SignalKind::hangup())
            .expect("Failed to install SIGHUP handler");
        while hup.recv().await.is_some() {
            reload.request();
        }
    };

    #[cfg(not(unix))]
    let hangup = {
        let _ = reload;
        std::future::pending::<()>()
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = hangup => {},
    }
}
