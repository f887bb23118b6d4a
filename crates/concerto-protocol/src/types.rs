//! Wire-level payload shapes shared by the decoder/encoder tables.
//!
//! These are deliberately simpler than the richer domain types in
//! `concerto-core` (e.g. `Status`, `MatchState`) — they exist only to be
//! decoded off, or encoded onto, the wire. `concerto-core` maps between
//! the two at the session boundary.

use crate::io::{CodecResult, Reader, Writer};

#[derive(Debug, Clone, PartialEq)]
pub struct StatusWire {
    pub action: u8,
    pub text: String,
    pub mods: u32,
    pub mode: u8,
    pub beatmap_checksum: String,
    pub beatmap_id: i32,
}

pub fn decode_status(r: &mut Reader) -> CodecResult<StatusWire> {
    Ok(StatusWire {
        action: r.u8()?,
        text: r.string()?,
        beatmap_checksum: r.string()?,
        mods: r.u32()?,
        mode: r.u8()?,
        beatmap_id: r.i32()?,
    })
}

pub fn encode_status(w: &mut Writer, s: &StatusWire) {
    w.write_u8(s.action);
    w.write_string(&s.text);
    w.write_string(&s.beatmap_checksum);
    w.write_u32(s.mods);
    w.write_u8(s.mode);
    w.write_i32(s.beatmap_id);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSendWire {
    pub content: String,
    pub target: String,
}

pub fn decode_chat_send(r: &mut Reader) -> CodecResult<ChatSendWire> {
    Ok(ChatSendWire {
        content: r.string()?,
        target: r.string()?,
    })
}

pub fn encode_chat_send(w: &mut Writer, c: &ChatSendWire) {
    w.write_string(&c.content);
    w.write_string(&c.target);
}

/// `SEND_MESSAGE` response payload: a fully addressed chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessageWire {
    pub sender_name: String,
    pub content: String,
    pub target: String,
    pub sender_id: i32,
}

pub fn encode_chat_message(w: &mut Writer, m: &ChatMessageWire) {
    w.write_string(&m.sender_name);
    w.write_string(&m.content);
    w.write_string(&m.target);
    w.write_i32(m.sender_id);
}

pub fn decode_chat_message(r: &mut Reader) -> CodecResult<ChatMessageWire> {
    Ok(ChatMessageWire {
        sender_name: r.string()?,
        content: r.string()?,
        target: r.string()?,
        sender_id: r.i32()?,
    })
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlotWire {
    pub status: u8,
    pub team: u8,
    pub player_id: i32,
    pub mods: u32,
}

pub const SLOT_COUNT: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchWire {
    pub match_id: u16,
    pub in_progress: bool,
    pub match_type: u8,
    pub mods: u32,
    pub name: String,
    pub password: String,
    pub beatmap_text: String,
    pub beatmap_checksum: String,
    pub beatmap_id: i32,
    pub host_id: i32,
    pub game_mode: u8,
    pub scoring_type: u8,
    pub team_type: u8,
    pub freemod: bool,
    pub seed: i32,
    pub slots: Vec<SlotWire>,
}

pub fn decode_match(r: &mut Reader) -> CodecResult<MatchWire> {
    let match_id = r.u16()?;
    let in_progress = r.bool()?;
    let match_type = r.u8()?;
    let mods = r.u32()?;
    let name = r.string()?;
    let password = r.string()?;
    let beatmap_text = r.string()?;
    let beatmap_checksum = r.string()?;
    let beatmap_id = r.i32()?;

    let slot_count = r.array_len()? as usize;
    let mut slots = Vec::with_capacity(slot_count);
    for _ in 0..slot_count {
        let status = r.u8()?;
        let team = r.u8()?;
        let player_id = if status & 0b0111_1100 != 0 {
            r.i32()?
        } else {
            -1
        };
        let mods = r.u32()?;
        slots.push(SlotWire {
            status,
            team,
            player_id,
            mods,
        });
    }

    let host_id = r.i32()?;
    let game_mode = r.u8()?;
    let scoring_type = r.u8()?;
    let team_type = r.u8()?;
    let freemod = r.bool()?;
    let seed = r.i32()?;

    Ok(MatchWire {
        match_id,
        in_progress,
        match_type,
        mods,
        name,
        password,
        beatmap_text,
        beatmap_checksum,
        beatmap_id,
        host_id,
        game_mode,
        scoring_type,
        team_type,
        freemod,
        seed,
        slots,
    })
}

pub fn encode_match(w: &mut Writer, m: &MatchWire) {
    w.write_u16(m.match_id);
    w.write_bool(m.in_progress);
    w.write_u8(m.match_type);
    w.write_u32(m.mods);
    w.write_string(&m.name);
    w.write_string(&m.password);
    w.write_string(&m.beatmap_text);
    w.write_string(&m.beatmap_checksum);
    w.write_i32(m.beatmap_id);

    w.write_array_len(m.slots.len() as u16);
    for slot in &m.slots {
        w.write_u8(slot.status);
        w.write_u8(slot.team);
        if slot.status & 0b0111_1100 != 0 {
            w.write_i32(slot.player_id);
        }
        w.write_u32(slot.mods);
    }

    w.write_i32(m.host_id);
    w.write_u8(m.game_mode);
    w.write_u8(m.scoring_type);
    w.write_u8(m.team_type);
    w.write_bool(m.freemod);
    w.write_i32(m.seed);
}

/// `USER_PRESENCE` response payload: identity and location, without
/// performance stats.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceWire {
    pub user_id: i32,
    pub name: String,
    pub utc_offset: i32,
    pub country: [u8; 2],
    pub permissions: u8,
    pub mode: u8,
    pub latitude: f32,
    pub longitude: f32,
    pub rank: i32,
}

pub fn encode_presence(w: &mut Writer, p: &PresenceWire) {
    w.write_i32(p.user_id);
    w.write_string(&p.name);
    w.write_i32(p.utc_offset);
    w.write_u8(p.country[0]);
    w.write_u8(p.country[1]);
    w.write_u8(p.permissions);
    w.write_u8(p.mode);
    w.write_f32(p.latitude);
    w.write_f32(p.longitude);
    w.write_i32(p.rank);
}

pub fn decode_presence(r: &mut Reader) -> CodecResult<PresenceWire> {
    Ok(PresenceWire {
        user_id: r.i32()?,
        name: r.string()?,
        utc_offset: r.i32()?,
        country: [r.u8()?, r.u8()?],
        permissions: r.u8()?,
        mode: r.u8()?,
        latitude: r.f32()?,
        longitude: r.f32()?,
        rank: r.i32()?,
    })
}

/// `USER_STATS` response payload: presence plus the performance fields
/// a client needs to render a scoreboard entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsWire {
    pub presence: PresenceWire,
    pub action: u8,
    pub action_text: String,
    pub beatmap_checksum: String,
    pub current_mods: u32,
    pub beatmap_id: i32,
    pub ranked_score: u64,
    pub accuracy: f32,
    pub playcount: u32,
    pub total_score: u64,
    pub pp: u32,
}

pub fn encode_user_stats(w: &mut Writer, s: &StatsWire) {
    encode_presence(w, &s.presence);
    w.write_u8(s.action);
    w.write_string(&s.action_text);
    w.write_string(&s.beatmap_checksum);
    w.write_u32(s.current_mods);
    w.write_i32(s.beatmap_id);
    w.write_u64(s.ranked_score);
    w.write_f32(s.accuracy);
    w.write_u32(s.playcount);
    w.write_u64(s.total_score);
    w.write_u32(s.pp);
}

pub fn decode_user_stats(r: &mut Reader) -> CodecResult<StatsWire> {
    Ok(StatsWire {
        presence: decode_presence(r)?,
        action: r.u8()?,
        action_text: r.string()?,
        beatmap_checksum: r.string()?,
        current_mods: r.u32()?,
        beatmap_id: r.i32()?,
        ranked_score: r.u64()?,
        accuracy: r.f32()?,
        playcount: r.u32()?,
        total_score: r.u64()?,
        pp: r.u32()?,
    })
}

/// Opaque replay/score frame bundle. The server never interprets
/// these bytes — it forwards them verbatim to spectators or stamps a
/// slot index onto them for match score updates.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBundle {
    pub raw: Vec<u8>,
}

pub fn decode_frame_bundle(r: &mut Reader) -> CodecResult<FrameBundle> {
    Ok(FrameBundle {
        raw: r.rest().to_vec(),
    })
}

pub fn encode_frame_bundle(w: &mut Writer, f: &FrameBundle) {
    w.write_bytes(&f.raw);
}

/// `MATCH_SCORE_UPDATE` response: a frame bundle stamped with the
/// originating slot index.
pub fn encode_slot_stamped_frame(w: &mut Writer, slot_index: u8, frame: &FrameBundle) {
    w.write_u8(slot_index);
    w.write_bytes(&frame.raw);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        let s = StatusWire {
            action: 2,
            text: "playing a beatmap".to_owned(),
            mods: 16,
            mode: 0,
            beatmap_checksum: "abc123".to_owned(),
            beatmap_id: 456,
        };
        let mut w = Writer::new();
        encode_status(&mut w, &s);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(decode_status(&mut r).unwrap(), s);
    }

    #[test]
    fn match_round_trips_with_mixed_slots() {
        let m = MatchWire {
            match_id: 7,
            in_progress: false,
            match_type: 0,
            mods: 0,
            name: "room".to_owned(),
            password: String::new(),
            beatmap_text: "Song - Artist".to_owned(),
            beatmap_checksum: "deadbeef".to_owned(),
            beatmap_id: 99,
            host_id: 5,
            game_mode: 0,
            scoring_type: 0,
            team_type: 0,
            freemod: false,
            seed: 0,
            slots: (0..SLOT_COUNT)
                .map(|i| {
                    if i == 0 {
                        SlotWire {
                            status: 0b0000_0010, // NotReady
                            team: 0,
                            player_id: 5,
                            mods: 0,
                        }
                    } else {
                        SlotWire {
                            status: 0b0000_0001, // Open
                            team: 0,
                            player_id: -1,
                            mods: 0,
                        }
                    }
                })
                .collect(),
        };
        let mut w = Writer::new();
        encode_match(&mut w, &m);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(decode_match(&mut r).unwrap(), m);
    }
}
