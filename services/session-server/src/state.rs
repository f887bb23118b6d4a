//! The process-wide application state: every hub and collaborator the
//! transports and the job sweep need, built once at startup and
//! cloned (cheaply, via `Arc`) into every connection task.

use std::sync::Arc;

use concerto_collab::memory::{MemoryRanking, MemoryRepository, NullGeoResolver, PlainPasswordVerifier};
use concerto_collab::{GeoResolver, PasswordVerifier, Ranking, Repository};
use concerto_core::{
    Authenticator, Channel, ChannelName, ChatRouter, Dispatcher, EventBus, MultiplayerHub, Session,
    SessionRegistry, SpectatorHub, BOT_ID, BOT_NAME, LOBBY_CHANNEL,
};
use concerto_protocol::{
    build_decoders, build_encoders, DecodeFn, EncodeFn, VersionedRegistry, KNOWN_VERSIONS,
};

use crate::config::Config;

/// Everything a connection handler or background job needs, grouped
/// behind cheap clones so each task owns its own handle.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub chat: Arc<ChatRouter>,
    pub spectators: Arc<SpectatorHub>,
    pub multiplayer: Arc<MultiplayerHub>,
    pub events: Arc<EventBus>,
    pub dispatcher: Arc<Dispatcher>,
    pub repo: Arc<dyn Repository + Send + Sync>,
    pub ranking: Arc<dyn Ranking + Send + Sync>,
    pub password_verifier: Arc<dyn PasswordVerifier + Send + Sync>,
    pub geo: Arc<dyn GeoResolver + Send + Sync>,
    pub decoders: Arc<VersionedRegistry<DecodeFn>>,
    pub encoders: Arc<VersionedRegistry<EncodeFn>>,
    pub config: Arc<Config>,
    pub bot: Arc<Session>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let sessions = SessionRegistry::new();
        let repo: Arc<dyn Repository + Send + Sync> = Arc::new(MemoryRepository::new());
        let ranking: Arc<dyn Ranking + Send + Sync> = Arc::new(MemoryRanking::new());
        let password_verifier: Arc<dyn PasswordVerifier + Send + Sync> = Arc::new(PlainPasswordVerifier);
        let geo: Arc<dyn GeoResolver + Send + Sync> = Arc::new(NullGeoResolver);

        let chat = Arc::new(ChatRouter::new(sessions.clone(), repo.clone()));
        let spectators = Arc::new(SpectatorHub::new(sessions.clone(), chat.clone()));
        let multiplayer = Arc::new(MultiplayerHub::new(sessions.clone(), chat.clone()));
        let events = Arc::new(EventBus::new());
        let decoders = Arc::new(build_decoders());
        let encoders = Arc::new(build_encoders());

        let bot_encoders = encoders
            .resolve(*KNOWN_VERSIONS.first().expect("at least one known protocol version"))
            .cloned()
            .unwrap_or_default();
        let bot = Arc::new(Session::new_bot(BOT_ID, BOT_NAME.to_owned(), Arc::new(bot_encoders)));

        let dispatcher = Arc::new(Dispatcher {
            sessions: sessions.clone(),
            chat: chat.clone(),
            spectators: spectators.clone(),
            multiplayer: multiplayer.clone(),
            bot: bot.clone(),
        });

        Self {
            sessions,
            chat,
            spectators,
            multiplayer,
            events,
            dispatcher,
            repo,
            ranking,
            password_verifier,
            geo,
            decoders,
            encoders,
            config: Arc::new(config),
            bot,
        }
    }

    /// Registers the channels every client expects to exist at login:
    /// a public default channel and the non-public multiplayer lobby.
    /// Both use a match-any-bit mask (`-1`) rather than a specific
    /// permission bit, since the bit layout itself is a `Repository`
    /// backend concern this workspace never pins down.
    pub async fn register_default_channels(&self) {
        self.chat
            .register(Channel::new(ChannelName::new("#osu"), "default channel", -1, -1, true, BOT_NAME))
            .await;
        self.chat
            .register(Channel::new(
                ChannelName::new(LOBBY_CHANNEL),
                "multiplayer lobby",
                -1,
                -1,
                false,
                BOT_NAME,
            ))
            .await;
    }

    pub fn authenticator(&self) -> Authenticator<'_> {
        Authenticator {
            sessions: &self.sessions,
            chat: self.chat.as_ref(),
            repo: self.repo.as_ref(),
            ranking: self.ranking.as_ref(),
            password_verifier: self.password_verifier.as_ref(),
            geo: self.geo.as_ref(),
            encoders: self.encoders.as_ref(),
            menu_icon_image: &self.config.menuicon_image,
            menu_icon_url: &self.config.menuicon_url,
        }
    }
}
