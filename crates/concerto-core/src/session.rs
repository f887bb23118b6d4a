//! The authenticated per-connection state holder. A `Session` is
//! only ever constructed once login has succeeded — until then the
//! transport adapter holds nothing but the raw handshake lines, so
//! `Session::id` never needs to change after construction.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use concerto_protocol::{encode_frame, EncodeFn, ResponseId, ResponsePayload};
use tokio::sync::{Mutex, RwLock};

use crate::ids::{ChannelName, ProtocolVersion, Token, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceFilter {
    Nobody,
    All,
    Friends,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub action: u8,
    pub text: String,
    pub mods: u32,
    pub mode: u8,
    pub beatmap_checksum: String,
    pub beatmap_id: i32,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            action: 0,
            text: String::new(),
            mods: 0,
            mode: 0,
            beatmap_checksum: String::new(),
            beatmap_id: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientFingerprint {
    pub version_date: i64,
    pub adapters_md5: String,
    pub adapter_list: Vec<String>,
    pub utc_offset: i32,
    pub country: [u8; 2],
    pub city: bool,
    pub latitude: f32,
    pub longitude: f32,
}

/// Authenticated connection state. Every mutable piece of presence
/// the rest of the system reads or writes lives behind its own lock,
/// so a fan-out caller touching one session's status never blocks on
/// another session's outbound write.
pub struct Session {
    pub id: UserId,
    pub name: String,
    pub token: RwLock<Token>,
    pub transport: Transport,
    pub remote_addr: String,
    pub fingerprint: ClientFingerprint,
    pub protocol_version: ProtocolVersion,

    pub status: RwLock<Status>,
    pub channels: RwLock<HashSet<ChannelName>>,
    pub spectating: RwLock<Option<UserId>>,
    pub spectators: RwLock<HashSet<UserId>>,
    pub match_id: RwLock<Option<u16>>,
    pub in_lobby: RwLock<bool>,
    pub presence_filter: RwLock<PresenceFilter>,
    pub permissions: RwLock<i64>,
    pub last_response: RwLock<Instant>,
    pub block_non_friend_dms: RwLock<bool>,
    pub friends: RwLock<HashSet<UserId>>,

    outbound: Mutex<Vec<u8>>,
    encoders: Arc<std::collections::HashMap<u16, EncodeFn>>,
    is_bot: bool,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: UserId,
        name: String,
        token: Token,
        transport: Transport,
        remote_addr: String,
        fingerprint: ClientFingerprint,
        protocol_version: ProtocolVersion,
        permissions: i64,
        preferred_mode: u8,
        encoders: Arc<std::collections::HashMap<u16, EncodeFn>>,
    ) -> Self {
        Self {
            id,
            name,
            token: RwLock::new(token),
            transport,
            remote_addr,
            fingerprint,
            protocol_version,
            status: RwLock::new(Status {
                mode: preferred_mode,
                ..Status::default()
            }),
            channels: RwLock::new(HashSet::new()),
            spectating: RwLock::new(None),
            spectators: RwLock::new(HashSet::new()),
            match_id: RwLock::new(None),
            in_lobby: RwLock::new(false),
            presence_filter: RwLock::new(PresenceFilter::All),
            permissions: RwLock::new(permissions),
            last_response: RwLock::new(Instant::now()),
            block_non_friend_dms: RwLock::new(false),
            friends: RwLock::new(HashSet::new()),
            outbound: Mutex::new(Vec::new()),
            encoders,
            is_bot: false,
        }
    }

    /// Builds a session for the platform bot. The bot never actually
    /// reads from a socket, so its transport is nominal and every
    /// outbound write on it is a no-op (see [`Session::enqueue`]).
    pub fn new_bot(id: UserId, name: String, encoders: Arc<std::collections::HashMap<u16, EncodeFn>>) -> Self {
        Self {
            id,
            name,
            token: RwLock::new(Token::empty()),
            transport: Transport::Tcp,
            remote_addr: String::new(),
            fingerprint: ClientFingerprint {
                version_date: 0,
                adapters_md5: String::new(),
                adapter_list: Vec::new(),
                utc_offset: 0,
                country: *b"XX",
                city: false,
                latitude: 0.0,
                longitude: 0.0,
            },
            protocol_version: 0,
            status: RwLock::new(Status::default()),
            channels: RwLock::new(HashSet::new()),
            spectating: RwLock::new(None),
            spectators: RwLock::new(HashSet::new()),
            match_id: RwLock::new(None),
            in_lobby: RwLock::new(false),
            presence_filter: RwLock::new(PresenceFilter::All),
            permissions: RwLock::new(0),
            last_response: RwLock::new(Instant::now()),
            block_non_friend_dms: RwLock::new(false),
            friends: RwLock::new(HashSet::new()),
            outbound: Mutex::new(Vec::new()),
            encoders,
            is_bot: true,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.is_bot
    }

    pub async fn touch(&self) {
        *self.last_response.write().await = Instant::now();
    }

    pub async fn seconds_since_response(&self) -> u64 {
        self.last_response.read().await.elapsed().as_secs()
    }

    /// Appends a framed packet to the outbound buffer. A no-op for the
    /// bot session (it has no transport to drain it).
    pub async fn enqueue(&self, response_id: ResponseId, payload: &ResponsePayload) {
        if self.is_bot() {
            return;
        }
        let Some(encode) = self.encoders.get(&response_id.as_u16()) else {
            return;
        };
        let mut writer = concerto_protocol::Writer::new();
        encode(&mut writer, payload);
        let bytes = writer.into_bytes();
        let framed = encode_frame(response_id.as_u16(), &bytes, false);
        self.outbound.lock().await.extend_from_slice(&framed);
    }

    /// Drains and returns the accumulated outbound buffer.
    pub async fn drain_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut *self.outbound.lock().await)
    }

    pub async fn can_read(&self, read_mask: i64) -> bool {
        *self.permissions.read().await & read_mask != 0
    }

    pub async fn can_write(&self, write_mask: i64) -> bool {
        *self.permissions.read().await & write_mask != 0
    }

    pub async fn close(&self) {
        *self.token.write().await = Token::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_session(id: UserId) -> Session {
        Session::new(
            id,
            "Alice".to_owned(),
            Token::empty(),
            Transport::Tcp,
            "127.0.0.1:1234".to_owned(),
            ClientFingerprint {
                version_date: 20_120_812,
                adapters_md5: String::new(),
                adapter_list: Vec::new(),
                utc_offset: 0,
                country: *b"US",
                city: false,
                latitude: 0.0,
                longitude: 0.0,
            },
            20_120_812,
            1,
            0,
            Arc::new(HashMap::new()),
        )
    }

    #[tokio::test]
    async fn enqueue_without_a_registered_encoder_is_a_silent_no_op() {
        let session = make_session(5);
        session
            .enqueue(ResponseId::LoginReply, &ResponsePayload::I32(5))
            .await;
        assert!(session.drain_outbound().await.is_empty());
    }

    #[tokio::test]
    async fn drain_outbound_empties_the_buffer() {
        let session = make_session(5);
        {
            let mut buf = session.outbound.lock().await;
            buf.extend_from_slice(b"hello");
        }
        let drained = session.drain_outbound().await;
        assert_eq!(drained, b"hello");
        assert!(session.drain_outbound().await.is_empty());
    }

    #[tokio::test]
    async fn closing_a_session_empties_its_token() {
        let session = make_session(5);
        *session.token.write().await = Token("abc".to_owned());
        session.close().await;
        assert!(session.token.read().await.is_empty());
    }

    #[tokio::test]
    async fn bot_session_enqueue_is_always_a_no_op() {
        let bot = Session::new_bot(1, "BanchoBot".to_owned(), Arc::new(HashMap::new()));
        bot.enqueue(ResponseId::SendMessage, &ResponsePayload::Empty)
            .await;
        assert!(bot.drain_outbound().await.is_empty());
    }
}
