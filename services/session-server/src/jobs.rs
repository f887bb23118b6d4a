//! The keepalive/timeout sweep: once a second, pings idle TCP sessions
//! and closes any session (TCP or HTTP) that has gone silent past the
//! configured timeout. Stopped by the `shutdown` event, relayed in by
//! the caller as a one-shot `Notify`.

use std::sync::Arc;
use std::time::Duration;

use concerto_core::{disconnect, Session};
use concerto_protocol::{ResponseId, ResponsePayload};
use tokio::sync::Notify;

use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run(state: AppState, stop: Arc<Notify>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => sweep_once(&state).await,
            _ = stop.notified() => {
                tracing::info!("job sweep stopped");
                return;
            }
        }
    }
}

async fn sweep_once(state: &AppState) {
    for session in state.sessions.tcp_clients().await {
        sweep_session(state, &session, true).await;
    }
    for session in state.sessions.http_clients().await {
        sweep_session(state, &session, false).await;
    }
}

async fn sweep_session(state: &AppState, session: &Arc<Session>, send_pings: bool) {
    let idle = session.seconds_since_response().await;
    if idle >= state.config.timeout.as_secs() {
        session.close().await;
        disconnect(&state.sessions, &state.chat, &state.spectators, &state.multiplayer, session).await;
    } else if send_pings && idle >= state.config.ping_interval.as_secs() {
        session.enqueue(ResponseId::Ping, &ResponsePayload::Empty).await;
    }
}
