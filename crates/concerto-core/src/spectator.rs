//! Spectator hub: start/stop spectating, frame fan-out, and the
//! private `#spec_<id>` channel each host owns while watched.

use std::sync::Arc;

use concerto_protocol::{FrameBundle, ResponseId, ResponsePayload};

use crate::channel::{Channel, ChatRouter};
use crate::ids::ChannelName;
use crate::registry::SessionRegistry;
use crate::session::Session;

pub struct SpectatorHub {
    sessions: SessionRegistry,
    chat: Arc<ChatRouter>,
}

impl SpectatorHub {
    pub fn new(sessions: SessionRegistry, chat: Arc<ChatRouter>) -> Self {
        Self { sessions, chat }
    }

    async fn spec_channel(&self, host_id: i32) -> Arc<Channel> {
        let name = ChannelName::spectator(host_id);
        if let Some(ch) = self.chat.get(&name).await {
            return ch;
        }
        self.chat
            .register(Channel::new(name, "spectator chat", 0, 0, false, "BanchoBot"))
            .await
    }

    pub async fn start_spectating(&self, watcher: &Arc<Session>, host: &Arc<Session>) {
        if *watcher.spectating.read().await == Some(host.id) {
            return;
        }
        if let Some(prev_host_id) = *watcher.spectating.read().await {
            if let Some(prev_host) = self.sessions.by_id(prev_host_id).await {
                self.stop_spectating(watcher, &prev_host).await;
            }
        }

        if watcher.protocol_version != host.protocol_version {
            watcher
                .enqueue(ResponseId::CantSpectate, &ResponsePayload::I32(host.id))
                .await;
            for spec_id in host.spectators.read().await.iter() {
                if let Some(spec) = self.sessions.by_id(*spec_id).await {
                    spec.enqueue(ResponseId::CantSpectate, &ResponsePayload::I32(host.id))
                        .await;
                }
            }
            return;
        }

        let existing = host.spectators.read().await.clone();
        host.spectators.write().await.insert(watcher.id);
        *watcher.spectating.write().await = Some(host.id);

        host.enqueue(ResponseId::SpectatorJoined, &ResponsePayload::I32(watcher.id))
            .await;
        for fellow_id in existing {
            if let Some(fellow) = self.sessions.by_id(fellow_id).await {
                fellow
                    .enqueue(
                        ResponseId::FellowSpectatorJoined,
                        &ResponsePayload::I32(watcher.id),
                    )
                    .await;
                watcher
                    .enqueue(
                        ResponseId::FellowSpectatorJoined,
                        &ResponsePayload::I32(fellow.id),
                    )
                    .await;
            }
        }

        let ch = self.spec_channel(host.id).await;
        let _ = self.chat.join(&ch, watcher).await;
        let _ = self.chat.join(&ch, host).await;
    }

    pub async fn stop_spectating(&self, watcher: &Arc<Session>, host: &Arc<Session>) {
        host.spectators.write().await.remove(&watcher.id);
        *watcher.spectating.write().await = None;

        host.enqueue(ResponseId::SpectatorLeft, &ResponsePayload::I32(watcher.id))
            .await;
        let remaining = host.spectators.read().await.clone();
        for fellow_id in &remaining {
            if let Some(fellow) = self.sessions.by_id(*fellow_id).await {
                fellow
                    .enqueue(
                        ResponseId::FellowSpectatorLeft,
                        &ResponsePayload::I32(watcher.id),
                    )
                    .await;
            }
        }

        let name = ChannelName::spectator(host.id);
        if let Some(ch) = self.chat.get(&name).await {
            self.chat.part(&ch, watcher).await;
            if remaining.is_empty() {
                self.chat.part(&ch, host).await;
                self.chat.remove(&name).await;
            }
        }
    }

    pub async fn frame(&self, host: &Arc<Session>, bundle: &FrameBundle) {
        for spec_id in host.spectators.read().await.iter() {
            if let Some(spec) = self.sessions.by_id(*spec_id).await {
                spec.enqueue(
                    ResponseId::SpectateFrames,
                    &ResponsePayload::Frame(bundle.clone()),
                )
                .await;
            }
        }
    }

    /// Tears down `host`'s spectator relationships on disconnect: every
    /// spectator is implicitly stopped and the channel is disposed.
    pub async fn host_disconnected(&self, host: &Arc<Session>) {
        let spectators = host.spectators.read().await.clone();
        for spec_id in spectators {
            if let Some(spec) = self.sessions.by_id(spec_id).await {
                self.stop_spectating(&spec, host).await;
            }
        }
        if let Some(watching_id) = *host.spectating.read().await {
            if let Some(watched) = self.sessions.by_id(watching_id).await {
                self.stop_spectating(host, &watched).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Token;
    use crate::session::{ClientFingerprint, Transport};
    use concerto_collab::memory::MemoryRepository;
    use std::collections::HashMap;

    fn fingerprint() -> ClientFingerprint {
        ClientFingerprint {
            version_date: 20_120_812,
            adapters_md5: String::new(),
            adapter_list: Vec::new(),
            utc_offset: 0,
            country: *b"US",
            city: false,
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    fn session(id: i32, name: &str) -> Arc<Session> {
        Arc::new(Session::new(
            id,
            name.to_owned(),
            Token::empty(),
            Transport::Tcp,
            "127.0.0.1:1".to_owned(),
            fingerprint(),
            20_120_812,
            i64::MAX,
            0,
            Arc::new(HashMap::new()),
        ))
    }

    async fn hub() -> (SpectatorHub, SessionRegistry) {
        let sessions = SessionRegistry::new();
        let repo = Arc::new(MemoryRepository::new());
        let chat = Arc::new(ChatRouter::new(sessions.clone(), repo));
        (SpectatorHub::new(sessions.clone(), chat), sessions)
    }

    #[tokio::test]
    async fn start_spectating_adds_to_host_set_and_joins_private_channel() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        let watcher = session(2, "Watcher");
        sessions.append(host.clone()).await;
        sessions.append(watcher.clone()).await;

        hub.start_spectating(&watcher, &host).await;

        assert!(host.spectators.read().await.contains(&2));
        assert_eq!(*watcher.spectating.read().await, Some(1));
        assert!(watcher
            .channels
            .read()
            .await
            .contains(&ChannelName::spectator(1)));
    }

    #[tokio::test]
    async fn stop_spectating_clears_state_and_disposes_empty_channel() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        let watcher = session(2, "Watcher");
        sessions.append(host.clone()).await;
        sessions.append(watcher.clone()).await;
        hub.start_spectating(&watcher, &host).await;

        hub.stop_spectating(&watcher, &host).await;

        assert!(!host.spectators.read().await.contains(&2));
        assert_eq!(*watcher.spectating.read().await, None);
        assert!(!host
            .channels
            .read()
            .await
            .contains(&ChannelName::spectator(1)));
    }

    #[tokio::test]
    async fn incompatible_protocol_version_sends_cant_spectate_and_does_not_attach() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        let watcher = session(2, "Watcher");
        sessions.append(host.clone()).await;
        sessions.append(watcher.clone()).await;

        // Force a version mismatch by constructing a second watcher manually
        // with a different protocol_version than host's 20_120_812.
        let mismatched = Arc::new(Session::new(
            3,
            "Old".to_owned(),
            Token::empty(),
            Transport::Tcp,
            "127.0.0.1:1".to_owned(),
            fingerprint(),
            504,
            i64::MAX,
            0,
            Arc::new(HashMap::new()),
        ));
        sessions.append(mismatched.clone()).await;

        hub.start_spectating(&mismatched, &host).await;

        assert!(!host.spectators.read().await.contains(&3));
        assert!(!mismatched.drain_outbound().await.is_empty());
    }
}
