//! Inbound dispatch: decoded `(RequestId, RequestPayload)` pairs land
//! here and are routed to the chat, spectator, and multiplayer hubs.
//! Handler errors are logged and never close the connection; only the
//! transport adapter's own read loop decides when a session ends.

use std::sync::Arc;

use concerto_protocol::{RequestId, RequestPayload, ResponseId, ResponsePayload};

use crate::channel::ChatRouter;
use crate::ids::{ChannelName, LOBBY_CHANNEL};
use crate::multiplayer::{MatchSettings, MultiplayerHub};
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::spectator::SpectatorHub;

/// Bundles the hubs an inbound packet may need to touch. Built once at
/// startup and shared (by reference) across every connection.
pub struct Dispatcher {
    pub sessions: SessionRegistry,
    pub chat: Arc<ChatRouter>,
    pub spectators: Arc<SpectatorHub>,
    pub multiplayer: Arc<MultiplayerHub>,
    pub bot: Arc<Session>,
}

fn match_settings_from_wire(wire: &concerto_protocol::MatchWire) -> MatchSettings {
    MatchSettings {
        name: wire.name.clone(),
        password: wire.password.clone(),
        beatmap_text: wire.beatmap_text.clone(),
        beatmap_checksum: wire.beatmap_checksum.clone(),
        beatmap_id: wire.beatmap_id,
        game_mode: wire.game_mode,
        scoring_type: wire.scoring_type,
        team_type: wire.team_type,
        freemod: wire.freemod,
        mods: wire.mods,
        seed: wire.seed,
    }
}

impl Dispatcher {
    /// Routes one decoded packet for `session`. Never returns an error
    /// to the caller — failures are either silently dropped (per the
    /// per-operation permission rules already enforced by the hubs) or
    /// logged here.
    pub async fn dispatch(&self, session: &Arc<Session>, request_id: RequestId, payload: RequestPayload) {
        session.touch().await;

        match (request_id, payload) {
            (RequestId::ChangeStatus, RequestPayload::Status(status)) => {
                let mut current = session.status.write().await;
                current.action = status.action;
                current.text = status.text;
                current.mods = status.mods;
                current.mode = status.mode;
                current.beatmap_checksum = status.beatmap_checksum;
                current.beatmap_id = status.beatmap_id;
            }
            (RequestId::SendPublicMessage, RequestPayload::Chat(chat)) => {
                let Some(channel) = self.chat.get(&ChannelName::new(chat.target.clone())).await else {
                    return;
                };
                if let Err(err) = self.chat.send(&channel, session, &chat.content, false).await {
                    tracing::debug!(?err, "public message rejected");
                }
            }
            (RequestId::SendPrivateMessage, RequestPayload::Chat(chat)) => {
                if let Err(err) = self
                    .chat
                    .private_message(session, &chat.target, &chat.content)
                    .await
                {
                    tracing::debug!(?err, "private message rejected");
                }
            }
            (RequestId::Logout, RequestPayload::Empty) => {
                crate::login::disconnect(
                    &self.sessions,
                    &self.chat,
                    &self.spectators,
                    &self.multiplayer,
                    session,
                )
                .await;
            }
            (RequestId::RequestStatusUpdate, RequestPayload::Empty) => {
                let status = session.status.read().await.clone();
                session
                    .enqueue(
                        ResponseId::UserStats,
                        &ResponsePayload::Stats(concerto_protocol::StatsWire {
                            presence: concerto_protocol::PresenceWire {
                                user_id: session.id,
                                name: session.name.clone(),
                                utc_offset: session.fingerprint.utc_offset,
                                country: session.fingerprint.country,
                                permissions: *session.permissions.read().await as u8,
                                mode: status.mode,
                                latitude: session.fingerprint.latitude,
                                longitude: session.fingerprint.longitude,
                                rank: 0,
                            },
                            action: status.action,
                            action_text: status.text,
                            beatmap_checksum: status.beatmap_checksum,
                            current_mods: status.mods,
                            beatmap_id: status.beatmap_id,
                            ranked_score: 0,
                            accuracy: 0.0,
                            playcount: 0,
                            total_score: 0,
                            pp: 0,
                        }),
                    )
                    .await;
            }
            (RequestId::Pong, RequestPayload::Empty) => {}

            (RequestId::StartSpectating, RequestPayload::UserId(host_id)) => {
                if let Some(host) = self.sessions.by_id(host_id).await {
                    self.spectators.start_spectating(session, &host).await;
                }
            }
            (RequestId::StopSpectating, RequestPayload::Empty) => {
                if let Some(host_id) = *session.spectating.read().await {
                    if let Some(host) = self.sessions.by_id(host_id).await {
                        self.spectators.stop_spectating(session, &host).await;
                    }
                }
            }
            (RequestId::SpectateFrames, RequestPayload::Frame(bundle)) => {
                self.spectators.frame(session, &bundle).await;
            }

            (RequestId::ToggleBlockNonFriendDms, RequestPayload::Empty) => {
                let mut block = session.block_non_friend_dms.write().await;
                *block = !*block;
            }

            (RequestId::JoinLobby, RequestPayload::Empty) => {
                *session.in_lobby.write().await = true;
                let Some(lobby) = self.chat.get(&ChannelName::new(LOBBY_CHANNEL)).await else {
                    return;
                };
                let _ = self.chat.join(&lobby, session).await;
            }
            (RequestId::PartLobby, RequestPayload::Empty) => {
                *session.in_lobby.write().await = false;
                if let Some(lobby) = self.chat.get(&ChannelName::new(LOBBY_CHANNEL)).await {
                    self.chat.part(&lobby, session).await;
                }
            }
            (RequestId::CreateMatch, RequestPayload::Match(wire)) => {
                self.multiplayer
                    .create(session, match_settings_from_wire(&wire))
                    .await;
            }
            (RequestId::JoinMatch, RequestPayload::Match(wire)) => {
                if let Some(room) = self.multiplayer.get(wire.match_id).await {
                    if let Err(err) = self.multiplayer.join(&room, session, &wire.password).await {
                        session
                            .enqueue(ResponseId::MatchJoinFail, &ResponsePayload::Empty)
                            .await;
                        tracing::debug!(?err, "match join rejected");
                    }
                } else {
                    session
                        .enqueue(ResponseId::MatchJoinFail, &ResponsePayload::Empty)
                        .await;
                }
            }
            (RequestId::PartMatch, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.leave(&room, session).await;
                    }
                }
            }
            (RequestId::MatchChangeSlot, RequestPayload::SlotIndex(index)) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        let _ = self
                            .multiplayer
                            .change_slot(&room, session, index as usize)
                            .await;
                    }
                }
            }
            (RequestId::MatchReady, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.ready(&room, session).await;
                    }
                }
            }
            (RequestId::MatchNotReady, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.not_ready(&room, session).await;
                    }
                }
            }
            (RequestId::MatchLock, RequestPayload::SlotIndex(index)) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        let _ = self
                            .multiplayer
                            .lock_slot(&room, session, index as usize)
                            .await;
                    }
                }
            }
            (RequestId::MatchChangeSettings, RequestPayload::Match(wire)) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        let _ = self
                            .multiplayer
                            .change_settings(&room, session, match_settings_from_wire(&wire))
                            .await;
                    }
                }
            }
            (RequestId::MatchChangePassword, RequestPayload::Password(password)) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        if *room.host_id.read().await == session.id {
                            room.settings.write().await.password = password;
                        }
                    }
                }
            }
            (RequestId::MatchStart, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        let _ = self.multiplayer.start(&room, session).await;
                    }
                }
            }
            (RequestId::MatchScoreUpdate, RequestPayload::Frame(bundle)) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.score_update(&room, session, bundle).await;
                    }
                }
            }
            (RequestId::MatchComplete, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.match_complete(&room, session).await;
                    }
                }
            }
            (RequestId::MatchChangeMods, RequestPayload::Mods(mods)) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.change_mods(&room, session, mods).await;
                    }
                }
            }
            (RequestId::MatchLoadComplete, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.load_complete(&room, session).await;
                    }
                }
            }
            (RequestId::MatchNoBeatmap, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.no_map(&room, session).await;
                    }
                }
            }
            (RequestId::MatchHasBeatmap, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.has_map(&room, session).await;
                    }
                }
            }
            (RequestId::MatchSkipRequest, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        self.multiplayer.skip(&room, session).await;
                    }
                }
            }
            (RequestId::MatchFailed, RequestPayload::Empty) => {}
            (RequestId::MatchTransferHost, RequestPayload::UserId(new_host_id)) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        let _ = self
                            .multiplayer
                            .transfer_host(&room, session, new_host_id)
                            .await;
                    }
                }
            }
            (RequestId::MatchChangeTeam, RequestPayload::Empty) => {
                if let Some(match_id) = *session.match_id.read().await {
                    if let Some(room) = self.multiplayer.get(match_id).await {
                        let current = room
                            .slots
                            .read()
                            .await
                            .iter()
                            .find(|s| s.player_id == Some(session.id))
                            .map(|s| s.team)
                            .unwrap_or(0);
                        self.multiplayer
                            .change_team(&room, session, 1 - current)
                            .await;
                    }
                }
            }

            (RequestId::ChannelJoin, RequestPayload::ChannelName(name)) => {
                if let Some(channel) = self.chat.get(&ChannelName::new(name)).await {
                    let _ = self.chat.join(&channel, session).await;
                }
            }
            (RequestId::ChannelPart, RequestPayload::ChannelName(name)) => {
                if let Some(channel) = self.chat.get(&ChannelName::new(name)).await {
                    self.chat.part(&channel, session).await;
                }
            }

            (RequestId::ErrorReport, RequestPayload::ErrorReport(_report)) => {
                tracing::warn!(user_id = session.id, "client reported an error");
            }

            (id, _) => {
                tracing::debug!(?id, "packet payload did not match its request id; dropped");
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

    async fn dispatcher() -> (Dispatcher, SessionRegistry) {
        let sessions = SessionRegistry::new();
        let repo = Arc::new(MemoryRepository::new());
        let chat = Arc::new(ChatRouter::new(sessions.clone(), repo));
        let spectators = Arc::new(SpectatorHub::new(sessions.clone(), chat.clone()));
        let multiplayer = Arc::new(MultiplayerHub::new(sessions.clone(), chat.clone()));
        let bot = Arc::new(Session::new_bot(
            crate::ids::BOT_ID,
            crate::ids::BOT_NAME.to_owned(),
            Arc::new(HashMap::new()),
        ));
        (
            Dispatcher {
                sessions: sessions.clone(),
                chat,
                spectators,
                multiplayer,
                bot,
            },
            sessions,
        )
    }

    #[tokio::test]
    async fn change_status_updates_session_status_in_place() {
        let (dispatcher, sessions) = dispatcher().await;
        let session = session(1, "Alice");
        sessions.append(session.clone()).await;

        dispatcher
            .dispatch(
                &session,
                RequestId::ChangeStatus,
                RequestPayload::Status(concerto_protocol::StatusWire {
                    action: 2,
                    text: "Playing".to_owned(),
                    mods: 0,
                    mode: 3,
                    beatmap_checksum: "abc".to_owned(),
                    beatmap_id: 7,
                }),
            )
            .await;

        let status = session.status.read().await;
        assert_eq!(status.action, 2);
        assert_eq!(status.mode, 3);
        assert_eq!(status.beatmap_id, 7);
    }

    #[tokio::test]
    async fn unmatched_payload_for_a_request_id_is_dropped_without_panic() {
        let (dispatcher, sessions) = dispatcher().await;
        let session = session(1, "Alice");
        sessions.append(session.clone()).await;

        dispatcher
            .dispatch(&session, RequestId::ChangeStatus, RequestPayload::Empty)
            .await;
    }

    #[tokio::test]
    async fn start_spectating_attaches_to_the_requested_host() {
        let (dispatcher, sessions) = dispatcher().await;
        let host = session(1, "Host");
        let watcher = session(2, "Watcher");
        sessions.append(host.clone()).await;
        sessions.append(watcher.clone()).await;

        dispatcher
            .dispatch(
                &watcher,
                RequestId::StartSpectating,
                RequestPayload::UserId(1),
            )
            .await;

        assert!(host.spectators.read().await.contains(&2));
    }

    #[tokio::test]
    async fn logout_removes_the_session_from_the_registry() {
        let (dispatcher, sessions) = dispatcher().await;
        let session = session(1, "Alice");
        sessions.append(session.clone()).await;

        dispatcher
            .dispatch(&session, RequestId::Logout, RequestPayload::Empty)
            .await;

        assert!(sessions.by_id(1).await.is_none());
    }
}
