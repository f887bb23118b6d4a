//! Multiplayer room + lobby: match/slot state machine, lobby
//! broadcast, and the per-match chat channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use concerto_protocol::{FrameBundle, MatchWire, ResponseId, ResponsePayload, SlotWire, SLOT_COUNT};
use tokio::sync::RwLock;

use crate::channel::{Channel, ChatRouter};
use crate::error::SessionError;
use crate::ids::{ChannelName, UserId, MULTIPLAYER_CHANNEL};
use crate::registry::SessionRegistry;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Open,
    Locked,
    NotReady,
    Ready,
    NoMap,
    Playing,
    Complete,
    Quit,
}

impl SlotStatus {
    fn wire_bits(self) -> u8 {
        match self {
            SlotStatus::Open => 0b0000_0001,
            SlotStatus::Locked => 0b0000_0010,
            SlotStatus::NotReady => 0b0000_0100,
            SlotStatus::Ready => 0b0000_1000,
            SlotStatus::NoMap => 0b0001_0000,
            SlotStatus::Playing => 0b0010_0000,
            SlotStatus::Complete => 0b0100_0000,
            SlotStatus::Quit => 0b1000_0000,
        }
    }

    fn has_player(self) -> bool {
        !matches!(self, SlotStatus::Open | SlotStatus::Locked)
    }
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub status: SlotStatus,
    pub team: u8,
    pub player_id: Option<UserId>,
    pub mods: u32,
    pub loaded: bool,
    pub skipped: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            status: SlotStatus::Open,
            team: 0,
            player_id: None,
            mods: 0,
            loaded: false,
            skipped: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub name: String,
    pub password: String,
    pub beatmap_text: String,
    pub beatmap_checksum: String,
    pub beatmap_id: i32,
    pub game_mode: u8,
    pub scoring_type: u8,
    pub team_type: u8,
    pub freemod: bool,
    pub mods: u32,
    pub seed: i32,
}

pub struct MatchRoom {
    pub id: u16,
    pub host_id: RwLock<UserId>,
    pub settings: RwLock<MatchSettings>,
    pub in_progress: RwLock<bool>,
    pub slots: RwLock<[Slot; SLOT_COUNT]>,
}

impl MatchRoom {
    pub async fn to_wire(&self) -> MatchWire {
        let settings = self.settings.read().await;
        let slots = self.slots.read().await;
        MatchWire {
            match_id: self.id,
            in_progress: *self.in_progress.read().await,
            match_type: 0,
            mods: settings.mods,
            name: settings.name.clone(),
            password: settings.password.clone(),
            beatmap_text: settings.beatmap_text.clone(),
            beatmap_checksum: settings.beatmap_checksum.clone(),
            beatmap_id: settings.beatmap_id,
            host_id: *self.host_id.read().await,
            game_mode: settings.game_mode,
            scoring_type: settings.scoring_type,
            team_type: settings.team_type,
            freemod: settings.freemod,
            seed: settings.seed,
            slots: slots
                .iter()
                .map(|s| SlotWire {
                    status: s.status.wire_bits(),
                    team: s.team,
                    player_id: s.player_id.unwrap_or(-1),
                    mods: s.mods,
                })
                .collect(),
        }
    }

    async fn occupant_ids(&self) -> Vec<UserId> {
        self.slots
            .read()
            .await
            .iter()
            .filter_map(|s| s.player_id)
            .collect()
    }

    async fn slot_of(&self, player_id: UserId) -> Option<usize> {
        self.slots
            .read()
            .await
            .iter()
            .position(|s| s.player_id == Some(player_id))
    }
}

pub struct MultiplayerHub {
    sessions: SessionRegistry,
    chat: Arc<ChatRouter>,
    matches: RwLock<HashMap<u16, Arc<MatchRoom>>>,
    next_id: AtomicU16,
}

impl MultiplayerHub {
    pub fn new(sessions: SessionRegistry, chat: Arc<ChatRouter>) -> Self {
        Self {
            sessions,
            chat,
            matches: RwLock::new(HashMap::new()),
            next_id: AtomicU16::new(1),
        }
    }

    pub async fn get(&self, id: u16) -> Option<Arc<MatchRoom>> {
        self.matches.read().await.get(&id).cloned()
    }

    async fn broadcast_lobby(&self, response_id: ResponseId, payload: ResponsePayload) {
        for session in self.sessions.all().await {
            if *session.in_lobby.read().await {
                session.enqueue(response_id, &payload).await;
            }
        }
    }

    async fn broadcast_match(&self, room: &Arc<MatchRoom>, response_id: ResponseId) {
        let wire = room.to_wire().await;
        for player_id in room.occupant_ids().await {
            if let Some(session) = self.sessions.by_id(player_id).await {
                session
                    .enqueue(response_id, &ResponsePayload::Match(wire.clone()))
                    .await;
            }
        }
    }

    pub async fn create(&self, host: &Arc<Session>, settings: MatchSettings) -> Arc<MatchRoom> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut slots: [Slot; SLOT_COUNT] = Default::default();
        slots[0] = Slot {
            status: SlotStatus::NotReady,
            player_id: Some(host.id),
            ..Default::default()
        };
        let room = Arc::new(MatchRoom {
            id,
            host_id: RwLock::new(host.id),
            settings: RwLock::new(settings),
            in_progress: RwLock::new(false),
            slots: RwLock::new(slots),
        });
        self.matches.write().await.insert(id, room.clone());
        *host.match_id.write().await = Some(id);

        let ch = self
            .chat
            .register(Channel::new(
                ChannelName::new(MULTIPLAYER_CHANNEL),
                "multiplayer",
                0,
                0,
                false,
                host.name.clone(),
            ))
            .await;
        let _ = self.chat.join(&ch, host).await;

        self.broadcast_lobby(
            ResponseId::MatchNew,
            ResponsePayload::Match(room.to_wire().await),
        )
        .await;
        room
    }

    pub async fn join(
        &self,
        room: &Arc<MatchRoom>,
        player: &Arc<Session>,
        password: &str,
    ) -> Result<(), SessionError> {
        if *room.in_progress.read().await {
            return Err(SessionError::MatchInProgress);
        }
        {
            let settings = room.settings.read().await;
            if !settings.password.is_empty() && settings.password != password {
                return Err(SessionError::MatchBadPassword);
            }
        }

        {
            let mut slots = room.slots.write().await;
            let idx = slots
                .iter()
                .position(|s| s.status == SlotStatus::Open)
                .ok_or(SessionError::MatchFull)?;
            slots[idx] = Slot {
                status: SlotStatus::NotReady,
                player_id: Some(player.id),
                ..Default::default()
            };
        }

        *player.match_id.write().await = Some(room.id);
        player
            .enqueue(
                ResponseId::MatchJoinSuccess,
                &ResponsePayload::Match(room.to_wire().await),
            )
            .await;
        self.broadcast_match(room, ResponseId::MatchUpdate).await;
        self.broadcast_lobby(
            ResponseId::MatchUpdate,
            ResponsePayload::Match(room.to_wire().await),
        )
        .await;
        Ok(())
    }

    /// Frees `player`'s slot. If `player` was host, transfers to the
    /// lowest-numbered occupied slot; disposes the room if it becomes
    /// empty.
    pub async fn leave(&self, room: &Arc<MatchRoom>, player: &Arc<Session>) {
        let was_host = *room.host_id.read().await == player.id;
        {
            let mut slots = room.slots.write().await;
            if let Some(idx) = slots.iter().position(|s| s.player_id == Some(player.id)) {
                slots[idx] = Slot::default();
            }
        }
        *player.match_id.write().await = None;

        let remaining = room.occupant_ids().await;
        if remaining.is_empty() {
            self.matches.write().await.remove(&room.id);
            self.chat.remove(&ChannelName::new(MULTIPLAYER_CHANNEL)).await;
            self.broadcast_lobby(ResponseId::MatchDisband, ResponsePayload::I32(room.id))
                .await;
            return;
        }

        if was_host {
            let new_host = remaining.iter().min().copied().unwrap();
            *room.host_id.write().await = new_host;
        }

        self.broadcast_match(room, ResponseId::MatchUpdate).await;
        self.broadcast_lobby(
            ResponseId::MatchUpdate,
            ResponsePayload::Match(room.to_wire().await),
        )
        .await;
    }

    pub async fn change_settings(
        &self,
        room: &Arc<MatchRoom>,
        requester: &Session,
        new: MatchSettings,
    ) -> Result<(), SessionError> {
        if *room.host_id.read().await != requester.id {
            return Err(SessionError::MatchNotHost);
        }
        let beatmap_changed = {
            let current = room.settings.read().await;
            current.beatmap_checksum != new.beatmap_checksum
        };
        *room.settings.write().await = new;

        if beatmap_changed {
            let mut slots = room.slots.write().await;
            for slot in slots.iter_mut() {
                if slot.status == SlotStatus::Ready {
                    slot.status = SlotStatus::NotReady;
                }
            }
        }
        self.broadcast_match(room, ResponseId::MatchUpdate).await;
        Ok(())
    }

    async fn set_own_slot_status(
        &self,
        room: &Arc<MatchRoom>,
        player: &Session,
        status: SlotStatus,
    ) {
        let mut slots = room.slots.write().await;
        if let Some(slot) = slots.iter_mut().find(|s| s.player_id == Some(player.id)) {
            slot.status = status;
        }
        drop(slots);
        self.broadcast_match(room, ResponseId::MatchUpdate).await;
    }

    pub async fn ready(&self, room: &Arc<MatchRoom>, player: &Session) {
        self.set_own_slot_status(room, player, SlotStatus::Ready).await;
    }

    pub async fn not_ready(&self, room: &Arc<MatchRoom>, player: &Session) {
        self.set_own_slot_status(room, player, SlotStatus::NotReady)
            .await;
    }

    pub async fn no_map(&self, room: &Arc<MatchRoom>, player: &Session) {
        self.set_own_slot_status(room, player, SlotStatus::NoMap).await;
    }

    pub async fn has_map(&self, room: &Arc<MatchRoom>, player: &Session) {
        self.set_own_slot_status(room, player, SlotStatus::NotReady)
            .await;
    }

    pub async fn change_slot(
        &self,
        room: &Arc<MatchRoom>,
        player: &Session,
        target_index: usize,
    ) -> Result<(), SessionError> {
        if target_index >= SLOT_COUNT {
            return Ok(());
        }
        {
            let mut slots = room.slots.write().await;
            if slots[target_index].status != SlotStatus::Open {
                return Ok(());
            }
            let Some(current_idx) = slots.iter().position(|s| s.player_id == Some(player.id))
            else {
                return Ok(());
            };
            let moved = slots[current_idx].clone();
            slots[target_index] = moved;
            slots[current_idx] = Slot::default();
        }
        self.broadcast_match(room, ResponseId::MatchUpdate).await;
        Ok(())
    }

    pub async fn lock_slot(
        &self,
        room: &Arc<MatchRoom>,
        requester: &Session,
        index: usize,
    ) -> Result<(), SessionError> {
        if *room.host_id.read().await != requester.id {
            return Err(SessionError::MatchNotHost);
        }
        if index >= SLOT_COUNT {
            return Ok(());
        }
        {
            let mut slots = room.slots.write().await;
            slots[index].status = match slots[index].status {
                SlotStatus::Open => SlotStatus::Locked,
                SlotStatus::Locked => SlotStatus::Open,
                other => other,
            };
        }
        self.broadcast_match(room, ResponseId::MatchUpdate).await;
        Ok(())
    }

    pub async fn transfer_host(
        &self,
        room: &Arc<MatchRoom>,
        requester: &Session,
        new_host_id: UserId,
    ) -> Result<(), SessionError> {
        if *room.host_id.read().await != requester.id {
            return Err(SessionError::MatchNotHost);
        }
        if room.slot_of(new_host_id).await.is_some() {
            *room.host_id.write().await = new_host_id;
            self.broadcast_match(room, ResponseId::MatchUpdate).await;
        }
        Ok(())
    }

    pub async fn change_team(&self, room: &Arc<MatchRoom>, player: &Session, team: u8) {
        let mut slots = room.slots.write().await;
        if let Some(slot) = slots.iter_mut().find(|s| s.player_id == Some(player.id)) {
            slot.team = team;
        }
        drop(slots);
        self.broadcast_match(room, ResponseId::MatchUpdate).await;
    }

    pub async fn change_mods(&self, room: &Arc<MatchRoom>, player: &Session, mods: u32) {
        let freemod = room.settings.read().await.freemod;
        if freemod {
            let mut slots = room.slots.write().await;
            if let Some(slot) = slots.iter_mut().find(|s| s.player_id == Some(player.id)) {
                slot.mods = mods;
            }
        } else {
            room.settings.write().await.mods = mods;
        }
        self.broadcast_match(room, ResponseId::MatchUpdate).await;
    }

    pub async fn start(&self, room: &Arc<MatchRoom>, requester: &Session) -> Result<(), SessionError> {
        if *room.host_id.read().await != requester.id {
            return Err(SessionError::MatchNotHost);
        }
        if *room.in_progress.read().await {
            return Err(SessionError::MatchInProgress);
        }
        {
            let mut slots = room.slots.write().await;
            for slot in slots.iter_mut() {
                if matches!(slot.status, SlotStatus::Ready | SlotStatus::NotReady) {
                    slot.status = SlotStatus::Playing;
                    slot.loaded = false;
                    slot.skipped = false;
                }
            }
        }
        *room.in_progress.write().await = true;
        self.broadcast_match(room, ResponseId::MatchStart).await;
        self.broadcast_lobby(
            ResponseId::MatchUpdate,
            ResponsePayload::Match(room.to_wire().await),
        )
        .await;
        Ok(())
    }

    /// Requires `player` to occupy a `Playing` slot; silently ignored
    /// otherwise (not one of the reported error categories).
    pub async fn score_update(&self, room: &Arc<MatchRoom>, player: &Session, frame: FrameBundle) {
        let Some(slot_index) = room
            .slots
            .read()
            .await
            .iter()
            .position(|s| s.player_id == Some(player.id) && s.status == SlotStatus::Playing)
        else {
            return;
        };

        for occupant_id in room.occupant_ids().await {
            if let Some(session) = self.sessions.by_id(occupant_id).await {
                session
                    .enqueue(
                        ResponseId::MatchScoreUpdate,
                        &ResponsePayload::SlotStampedFrame {
                            slot_index: slot_index as u8,
                            frame: frame.clone(),
                        },
                    )
                    .await;
            }
        }
    }

    pub async fn match_complete(&self, room: &Arc<MatchRoom>, player: &Session) {
        let all_done = {
            let mut slots = room.slots.write().await;
            if let Some(slot) = slots.iter_mut().find(|s| s.player_id == Some(player.id)) {
                slot.status = SlotStatus::Complete;
            }
            !slots
                .iter()
                .any(|s| s.player_id.is_some() && s.status == SlotStatus::Playing)
        };

        if all_done {
            {
                let mut slots = room.slots.write().await;
                for slot in slots.iter_mut() {
                    if slot.status == SlotStatus::Complete {
                        slot.status = SlotStatus::NotReady;
                    }
                }
            }
            *room.in_progress.write().await = false;
            self.broadcast_match(room, ResponseId::MatchComplete).await;
        }
    }

    async fn report_and_check(
        &self,
        room: &Arc<MatchRoom>,
        player: &Session,
        mark: impl Fn(&mut Slot),
        check: impl Fn(&Slot) -> bool,
        response_id: ResponseId,
    ) {
        let all_reported = {
            let mut slots = room.slots.write().await;
            if let Some(slot) = slots.iter_mut().find(|s| s.player_id == Some(player.id)) {
                mark(slot);
            }
            slots
                .iter()
                .filter(|s| s.player_id.is_some() && s.status == SlotStatus::Playing)
                .all(|s| check(s))
        };
        if all_reported {
            self.broadcast_match(room, response_id).await;
        }
    }

    pub async fn load_complete(&self, room: &Arc<MatchRoom>, player: &Session) {
        self.report_and_check(
            room,
            player,
            |s| s.loaded = true,
            |s| s.loaded,
            ResponseId::MatchAllPlayersLoaded,
        )
        .await;
    }

    pub async fn skip(&self, room: &Arc<MatchRoom>, player: &Session) {
        self.report_and_check(
            room,
            player,
            |s| s.skipped = true,
            |s| s.skipped,
            ResponseId::MatchSkip,
        )
        .await;
    }

    /// Forces the match out of progress, used both by an explicit host
    /// abort and by the `osu_error` event tearing down a match the
    /// reporting player was in.
    pub async fn abort(&self, room: &Arc<MatchRoom>) {
        {
            let mut slots = room.slots.write().await;
            for slot in slots.iter_mut() {
                if matches!(slot.status, SlotStatus::Playing | SlotStatus::Complete) {
                    slot.status = SlotStatus::NotReady;
                }
            }
        }
        *room.in_progress.write().await = false;
        self.broadcast_match(room, ResponseId::MatchAbort).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Token;
    use crate::session::{ClientFingerprint, Transport};
    use concerto_collab::memory::MemoryRepository;

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

    fn settings() -> MatchSettings {
        MatchSettings {
            name: "room".to_owned(),
            password: String::new(),
            beatmap_text: "Song".to_owned(),
            beatmap_checksum: "abc".to_owned(),
            beatmap_id: 1,
            game_mode: 0,
            scoring_type: 0,
            team_type: 0,
            freemod: false,
            mods: 0,
            seed: 0,
        }
    }

    async fn hub() -> (MultiplayerHub, SessionRegistry) {
        let sessions = SessionRegistry::new();
        let repo = Arc::new(MemoryRepository::new());
        let chat = Arc::new(ChatRouter::new(sessions.clone(), repo));
        (MultiplayerHub::new(sessions.clone(), chat), sessions)
    }

    #[tokio::test]
    async fn create_places_host_in_slot_zero() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        sessions.append(host.clone()).await;

        let room = hub.create(&host, settings()).await;
        let slots = room.slots.read().await;
        assert_eq!(slots[0].player_id, Some(1));
        assert_eq!(slots[0].status, SlotStatus::NotReady);
    }

    #[tokio::test]
    async fn join_fails_when_full() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        sessions.append(host.clone()).await;
        let room = hub.create(&host, settings()).await;

        for i in 0..15 {
            let p = session(10 + i, &format!("P{i}"));
            sessions.append(p.clone()).await;
            hub.join(&room, &p, "").await.unwrap();
        }

        let overflow = session(999, "Overflow");
        sessions.append(overflow.clone()).await;
        let result = hub.join(&room, &overflow, "").await;
        assert_eq!(result, Err(SessionError::MatchFull));
    }

    #[tokio::test]
    async fn leave_transfers_host_to_lowest_occupied_slot() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        let other = session(2, "Other");
        sessions.append(host.clone()).await;
        sessions.append(other.clone()).await;
        let room = hub.create(&host, settings()).await;
        hub.join(&room, &other, "").await.unwrap();

        hub.leave(&room, &host).await;

        assert_eq!(*room.host_id.read().await, 2);
    }

    #[tokio::test]
    async fn leave_disposes_room_when_empty() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        sessions.append(host.clone()).await;
        let room = hub.create(&host, settings()).await;

        hub.leave(&room, &host).await;

        assert!(hub.get(room.id).await.is_none());
    }

    #[tokio::test]
    async fn start_requires_host_and_sets_all_occupied_slots_playing() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        let other = session(2, "Other");
        sessions.append(host.clone()).await;
        sessions.append(other.clone()).await;
        let room = hub.create(&host, settings()).await;
        hub.join(&room, &other, "").await.unwrap();

        hub.start(&room, &host).await.unwrap();

        assert!(*room.in_progress.read().await);
        let slots = room.slots.read().await;
        assert_eq!(slots[0].status, SlotStatus::Playing);
        assert_eq!(slots[1].status, SlotStatus::Playing);
    }

    #[tokio::test]
    async fn match_complete_resets_to_not_ready_once_everyone_reports() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        sessions.append(host.clone()).await;
        let room = hub.create(&host, settings()).await;
        hub.start(&room, &host).await.unwrap();

        hub.match_complete(&room, &host).await;

        assert!(!*room.in_progress.read().await);
        assert_eq!(room.slots.read().await[0].status, SlotStatus::NotReady);
    }

    #[tokio::test]
    async fn abort_resets_playing_slots_and_clears_in_progress() {
        let (hub, sessions) = hub().await;
        let host = session(1, "Host");
        sessions.append(host.clone()).await;
        let room = hub.create(&host, settings()).await;
        hub.start(&room, &host).await.unwrap();

        hub.abort(&room).await;

        assert!(!*room.in_progress.read().await);
        assert_eq!(room.slots.read().await[0].status, SlotStatus::NotReady);
    }
}
