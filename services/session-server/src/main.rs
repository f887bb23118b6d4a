use std::env;
use std::sync::Arc;

use session_server::{config::Config, http, jobs, state::AppState, tcp};
use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let config = Config::from_env();
    let state = AppState::new(config.clone());
    state.register_default_channels().await;

    let sweep_stop = Arc::new(Notify::new());
    {
        let sweep_stop = sweep_stop.clone();
        state
            .events
            .register(
                "shutdown",
                Arc::new(move |_event: &concerto_core::Event| {
                    sweep_stop.notify_waiters();
                }),
            )
            .await;
    }

    let mut tcp_listeners = Vec::new();
    for &port in &config.tcp_ports {
        let state = state.clone();
        let addr = format!("0.0.0.0:{port}");
        tcp_listeners.push(tokio::spawn(async move {
            if let Err(err) = tcp::listen(addr, state).await {
                tracing::error!(%err, "tcp listener exited");
            }
        }));
    }

    let http_state = state.clone();
    let http_addr = config.http_bind.clone();
    let http_task = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&http_addr)
            .await
            .expect("failed to bind http listener");
        info!(addr = %http_addr, "http listener bound");
        axum::serve(listener, http::router(http_state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .expect("http server error");
    });

    let jobs_task = tokio::spawn(jobs::run(state.clone(), sweep_stop));

    shutdown_signal().await;
    state.events.fire(concerto_core::Event::Shutdown).await;

    let _ = http_task.await;
    let _ = jobs_task.await;
    for listener in tcp_listeners {
        listener.abort();
    }
    info!("server shut down gracefully");
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
