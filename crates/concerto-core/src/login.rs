//! The login handshake: parse `client_data`, resolve a per-version
//! codec table, verify adapters/credentials through the collaborator
//! traits, and emit the full post-login packet sequence.

use std::sync::Arc;

use concerto_collab::{GeoResolver, PasswordVerifier, Ranking, Repository};
use concerto_protocol::client_data::parse_client_data;
use concerto_protocol::{
    EncodeFn, LoginFailure, PresenceWire, ProtocolVersion, ResponseId, ResponsePayload, StatsWire,
    VersionedRegistry,
};
use md5::{Digest, Md5};

use crate::channel::ChatRouter;
use crate::ids::{BOT_ID, BOT_NAME};
use crate::registry::SessionRegistry;
use crate::session::{ClientFingerprint, Session, Transport};

fn hex_digest(data: &[u8]) -> String {
    Md5::digest(data).iter().map(|b| format!("{b:02x}")).collect()
}

const PRESENCE_BUNDLE_SIZE: usize = 150;
const STAY_DISCONNECTED_MESSAGE: &str =
    "Another device just logged in with your account; this session has been disconnected.";

pub struct LoginRequest {
    pub username: String,
    pub password_md5: String,
    pub client_data_raw: String,
    pub transport: Transport,
    pub remote_addr: String,
}

pub enum LoginOutcome {
    /// Authenticated; the caller should now drain and send the
    /// session's outbound buffer.
    Success(Arc<Session>),
    /// The literal bytes to write back verbatim (the `"no.\r\n"`
    /// adapter-mismatch compatibility response), then close.
    Raw(Vec<u8>),
    Failure(LoginFailure),
}

pub struct Authenticator<'a> {
    pub sessions: &'a SessionRegistry,
    pub chat: &'a ChatRouter,
    pub repo: &'a (dyn Repository + Send + Sync),
    pub ranking: &'a (dyn Ranking + Send + Sync),
    pub password_verifier: &'a (dyn PasswordVerifier + Send + Sync),
    pub geo: &'a (dyn GeoResolver + Send + Sync),
    pub encoders: &'a VersionedRegistry<EncodeFn>,
    pub menu_icon_image: &'a str,
    pub menu_icon_url: &'a str,
}

impl<'a> Authenticator<'a> {
    pub async fn login(&self, req: LoginRequest) -> LoginOutcome {
        let client_data = match parse_client_data(&req.client_data_raw) {
            Ok(cd) => cd,
            Err(_) => return LoginOutcome::Failure(LoginFailure::ServerError),
        };

        let Some(encoder_table) = self
            .encoders
            .resolve(client_data.version_date as ProtocolVersion)
        else {
            return LoginOutcome::Failure(LoginFailure::UpdateNeeded);
        };

        let computed_adapters_md5 = hex_digest(client_data.adapters.adapter_list_csv.as_bytes());
        if computed_adapters_md5 != client_data.adapters.adapters_md5 {
            return LoginOutcome::Raw(b"no.\r\n".to_vec());
        }

        let Ok(user) = self.repo.user_by_name(&req.username).await else {
            return LoginOutcome::Failure(LoginFailure::Authentication);
        };

        if !self
            .password_verifier
            .check(&req.password_md5, &user.bcrypt_password)
        {
            return LoginOutcome::Failure(LoginFailure::Authentication);
        }

        if user.restricted {
            return LoginOutcome::Failure(LoginFailure::Banned);
        }
        if !user.activated {
            return LoginOutcome::Failure(LoginFailure::NotActivated);
        }

        if let Some(previous) = self.sessions.by_id(user.id).await {
            previous
                .enqueue(
                    ResponseId::Announce,
                    &ResponsePayload::Str(STAY_DISCONNECTED_MESSAGE.to_owned()),
                )
                .await;
            previous.close().await;
        }

        for mode in 0u8..4 {
            if self.repo.fetch_stats(user.id, mode).await.is_err() {
                let _ = self.repo.create_stats(user.id, mode).await;
            }
        }
        let stats = self
            .repo
            .fetch_stats(user.id, user.preferred_mode)
            .await
            .unwrap_or_else(|_| concerto_collab::StatsRecord::empty(user.preferred_mode));

        let geo = self.geo.resolve(&req.remote_addr);
        let fingerprint = ClientFingerprint {
            version_date: client_data.version_date,
            adapters_md5: client_data.adapters.adapters_md5.clone(),
            adapter_list: client_data
                .adapters
                .adapter_list_csv
                .split(',')
                .map(str::to_owned)
                .collect(),
            utc_offset: client_data.utc_offset,
            country: geo.country,
            city: client_data.display_city,
            latitude: geo.latitude,
            longitude: geo.longitude,
        };

        let session = Arc::new(Session::new(
            user.id,
            user.name.clone(),
            crate::ids::Token(uuid::Uuid::new_v4().simple().to_string()),
            req.transport,
            req.remote_addr,
            fingerprint,
            client_data.version_date as ProtocolVersion,
            user.permissions,
            user.preferred_mode,
            Arc::new(encoder_table.clone()),
        ));
        *session.block_non_friend_dms.write().await = user.friend_only_dms;
        *session.friends.write().await = user.friends.iter().copied().collect();

        self.ranking
            .update(user.id, user.preferred_mode, stats.pp, stats.ranked_score, geo.country)
            .await;
        self.sessions.append(session.clone()).await;

        self.emit_login_sequence(&session, &user, &stats, geo).await;
        LoginOutcome::Success(session)
    }

    async fn emit_login_sequence(
        &self,
        session: &Arc<Session>,
        user: &concerto_collab::UserRecord,
        stats: &concerto_collab::StatsRecord,
        geo: concerto_collab::GeoInfo,
    ) {
        session
            .enqueue(
                ResponseId::ProtocolVersion,
                &ResponsePayload::I32(concerto_protocol::SERVER_PROTOCOL_VERSION),
            )
            .await;
        session
            .enqueue(ResponseId::LoginReply, &ResponsePayload::I32(user.id))
            .await;
        session
            .enqueue(
                ResponseId::MenuIcon,
                &ResponsePayload::MenuIcon {
                    image: self.menu_icon_image.to_owned(),
                    url: self.menu_icon_url.to_owned(),
                },
            )
            .await;
        session
            .enqueue(
                ResponseId::LoginPermissions,
                &ResponsePayload::I32(user.permissions as i32),
            )
            .await;

        let rank = self
            .ranking
            .global_rank(user.id, user.preferred_mode)
            .await
            .unwrap_or(0);
        let self_presence = PresenceWire {
            user_id: user.id,
            name: user.name.clone(),
            utc_offset: session.fingerprint.utc_offset,
            country: geo.country,
            permissions: user.permissions as u8,
            mode: user.preferred_mode,
            latitude: geo.latitude,
            longitude: geo.longitude,
            rank: rank as i32,
        };
        session
            .enqueue(
                ResponseId::UserPresence,
                &ResponsePayload::Presence(self_presence.clone()),
            )
            .await;
        session
            .enqueue(
                ResponseId::UserStats,
                &ResponsePayload::Stats(StatsWire {
                    presence: self_presence,
                    action: 0,
                    action_text: String::new(),
                    beatmap_checksum: String::new(),
                    current_mods: 0,
                    beatmap_id: 0,
                    ranked_score: stats.ranked_score,
                    accuracy: stats.accuracy,
                    playcount: stats.playcount,
                    total_score: stats.total_score,
                    pp: stats.pp,
                }),
            )
            .await;

        session
            .enqueue(
                ResponseId::UserPresence,
                &ResponsePayload::Presence(PresenceWire {
                    user_id: BOT_ID,
                    name: BOT_NAME.to_owned(),
                    utc_offset: 0,
                    country: *b"XX",
                    permissions: 0,
                    mode: 0,
                    latitude: 0.0,
                    longitude: 0.0,
                    rank: 0,
                }),
            )
            .await;

        session
            .enqueue(ResponseId::FriendsList, &ResponsePayload::Empty)
            .await;

        let others: Vec<_> = self
            .sessions
            .all()
            .await
            .into_iter()
            .filter(|s| s.id != session.id)
            .collect();
        for chunk in others.chunks(PRESENCE_BUNDLE_SIZE) {
            for other in chunk {
                let other_rank = self
                    .ranking
                    .global_rank(other.id, other.status.read().await.mode)
                    .await
                    .unwrap_or(0);
                let presence = PresenceWire {
                    user_id: other.id,
                    name: other.name.clone(),
                    utc_offset: other.fingerprint.utc_offset,
                    country: other.fingerprint.country,
                    permissions: *other.permissions.read().await as u8,
                    mode: other.status.read().await.mode,
                    latitude: other.fingerprint.latitude,
                    longitude: other.fingerprint.longitude,
                    rank: other_rank as i32,
                };
                session
                    .enqueue(ResponseId::UserPresence, &ResponsePayload::Presence(presence))
                    .await;
            }
        }

        for channel in self.chat.public_channels().await {
            if session.can_read(channel.read_mask).await {
                session
                    .enqueue(
                        ResponseId::ChannelAvailable,
                        &ResponsePayload::Str(channel.name.as_str().to_owned()),
                    )
                    .await;
            }
        }
        session
            .enqueue(ResponseId::ChannelInfoComplete, &ResponsePayload::Empty)
            .await;
    }
}

/// Runs the disconnect chain: removes `session` from the registry,
/// parts every joined channel, tears down spectator and match
/// membership, and broadcasts `USER_QUIT`.
pub async fn disconnect(
    sessions: &SessionRegistry,
    chat: &ChatRouter,
    spectators: &crate::spectator::SpectatorHub,
    multiplayer: &crate::multiplayer::MultiplayerHub,
    session: &Arc<Session>,
) {
    sessions.remove(session.id).await;

    for channel_name in session.channels.read().await.clone() {
        if let Some(channel) = chat.get(&channel_name).await {
            chat.part(&channel, session).await;
        }
    }

    spectators.host_disconnected(session).await;

    if let Some(match_id) = *session.match_id.read().await {
        if let Some(room) = multiplayer.get(match_id).await {
            multiplayer.leave(&room, session).await;
        }
    }

    sessions
        .send_packet(ResponseId::UserQuit, &ResponsePayload::I32(session.id))
        .await;
}
