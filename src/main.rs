use std::sync::Arc;

use fa_api_gateway::{routes, services::RemoteClientFactory, AppState, GatewayConfig};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::from_env()?;
    init_tracing(&config.log_level);

    let clients = RemoteClientFactory::new(&config.upstream_base, config.upstream_timeout);
    let state = Arc::new(AppState::from_config(&config, Arc::new(clients)));

    tracing::info!(
        port = config.port,
        upstream = %config.upstream_base,
        timeout_secs = config.upstream_timeout.as_secs(),
        "starting gateway"
    );

    let (addr, server) = warp::serve(routes::api(state))
        .try_bind_with_graceful_shutdown(config.socket_addr(), shutdown_signal())?;
    tracing::info!("Listening on port {}", addr.port());
    server.await;

    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
