use std::env;

use irc_gateway::{config::Config, connection, state::GatewayState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let config = Config::from_env();
    let state = GatewayState::new();

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind irc listener");
    info!(addr = %config.bind_addr, "irc listener bound");

    let accept_task = tokio::spawn({
        let state = state.clone();
        let config = config.clone();
        async move {
            loop {
                let (socket, remote) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::error!(%err, "irc accept failed");
                        continue;
                    }
                };
                let state = state.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    if let Err(err) = connection::handle(socket, state, config).await {
                        tracing::debug!(%err, %remote, "irc connection ended");
                    }
                });
            }
        }
    });

    shutdown_signal().await;
    accept_task.abort();
    info!("irc gateway shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
