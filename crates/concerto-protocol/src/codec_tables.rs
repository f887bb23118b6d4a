//! The concrete per-version decoder/encoder tables, built once at
//! process start and shared read-only by every connection.

use crate::io::{CodecResult, Reader, Writer};
use crate::packets::{RequestId, ResponseId};
use crate::registry::{ProtocolVersion, VersionedRegistry};
use crate::types::*;

/// Everything a registered request decoder can produce. `Empty`
/// covers both "this packet genuinely carries no payload" and "the
/// resolved version has no decoder for this packet" — callers
/// distinguish the two by checking whether the `RequestId` itself was
/// recognized before consulting the table.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Empty,
    Status(StatusWire),
    Chat(ChatSendWire),
    UserId(i32),
    ChannelName(String),
    Password(String),
    SlotIndex(u8),
    Mods(u32),
    Match(MatchWire),
    Frame(FrameBundle),
    ErrorReport(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    I32(i32),
    Str(String),
    MenuIcon { image: String, url: String },
    Presence(PresenceWire),
    Stats(StatsWire),
    ChatMessage(ChatMessageWire),
    Match(MatchWire),
    SlotStampedFrame { slot_index: u8, frame: FrameBundle },
    Frame(FrameBundle),
    Empty,
}

pub type DecodeFn = fn(&mut Reader) -> CodecResult<RequestPayload>;
pub type EncodeFn = fn(&mut Writer, &ResponsePayload);

/// The protocol versions this server speaks, newest first. Kept here
/// so login (`concerto-core`) and the registry builders agree on what
/// "known" means.
pub const KNOWN_VERSIONS: &[ProtocolVersion] = &[20_120_812, 535, 504];

fn dec_status(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::Status(decode_status(r)?))
}

fn dec_chat(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::Chat(decode_chat_send(r)?))
}

fn dec_empty(_r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::Empty)
}

fn dec_user_id(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::UserId(r.i32()?))
}

fn dec_channel_name(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::ChannelName(r.string()?))
}

fn dec_password(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::Password(r.string()?))
}

fn dec_slot_index(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::SlotIndex(r.u8()?))
}

fn dec_mods(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::Mods(r.u32()?))
}

fn dec_match(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::Match(decode_match(r)?))
}

fn dec_frame(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::Frame(decode_frame_bundle(r)?))
}

fn dec_error_report(r: &mut Reader) -> CodecResult<RequestPayload> {
    Ok(RequestPayload::ErrorReport(r.rest().to_vec()))
}

/// Builds the request-decoder registry. `CHANGE_STATUS` only gained
/// its own decoder in `20120812`; `535` and `504` share one
/// registration for the match-settings family.
pub fn build_decoders() -> VersionedRegistry<DecodeFn> {
    let mut reg = VersionedRegistry::new();

    for &version in &[20_120_812i32] {
        reg.register(version, RequestId::ChangeStatus.as_u16(), dec_status as DecodeFn);
    }

    for &version in &[20_120_812i32, 535, 504] {
        reg.register(version, RequestId::SendPublicMessage.as_u16(), dec_chat as DecodeFn);
        reg.register(
            version,
            RequestId::SendPrivateMessage.as_u16(),
            dec_chat as DecodeFn,
        );
        reg.register(version, RequestId::Logout.as_u16(), dec_empty as DecodeFn);
        reg.register(
            version,
            RequestId::RequestStatusUpdate.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(version, RequestId::Pong.as_u16(), dec_empty as DecodeFn);
        reg.register(
            version,
            RequestId::StartSpectating.as_u16(),
            dec_user_id as DecodeFn,
        );
        reg.register(
            version,
            RequestId::StopSpectating.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(
            version,
            RequestId::SpectateFrames.as_u16(),
            dec_frame as DecodeFn,
        );
        reg.register(
            version,
            RequestId::ToggleBlockNonFriendDms.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(version, RequestId::JoinLobby.as_u16(), dec_empty as DecodeFn);
        reg.register(version, RequestId::PartLobby.as_u16(), dec_empty as DecodeFn);
        reg.register(version, RequestId::CreateMatch.as_u16(), dec_match as DecodeFn);
        reg.register(version, RequestId::JoinMatch.as_u16(), dec_match as DecodeFn);
        reg.register(version, RequestId::PartMatch.as_u16(), dec_empty as DecodeFn);
        reg.register(
            version,
            RequestId::MatchChangeSlot.as_u16(),
            dec_slot_index as DecodeFn,
        );
        reg.register(version, RequestId::MatchReady.as_u16(), dec_empty as DecodeFn);
        reg.register(
            version,
            RequestId::MatchNotReady.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchLock.as_u16(),
            dec_slot_index as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchChangeSettings.as_u16(),
            dec_match as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchChangePassword.as_u16(),
            dec_password as DecodeFn,
        );
        reg.register(version, RequestId::MatchStart.as_u16(), dec_empty as DecodeFn);
        reg.register(
            version,
            RequestId::MatchScoreUpdate.as_u16(),
            dec_frame as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchComplete.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchChangeMods.as_u16(),
            dec_mods as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchLoadComplete.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchNoBeatmap.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchHasBeatmap.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchSkipRequest.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(version, RequestId::MatchFailed.as_u16(), dec_empty as DecodeFn);
        reg.register(
            version,
            RequestId::MatchTransferHost.as_u16(),
            dec_user_id as DecodeFn,
        );
        reg.register(
            version,
            RequestId::MatchChangeTeam.as_u16(),
            dec_empty as DecodeFn,
        );
        reg.register(
            version,
            RequestId::ChannelJoin.as_u16(),
            dec_channel_name as DecodeFn,
        );
        reg.register(
            version,
            RequestId::ChannelPart.as_u16(),
            dec_channel_name as DecodeFn,
        );
        reg.register(
            version,
            RequestId::ErrorReport.as_u16(),
            dec_error_report as DecodeFn,
        );
    }

    reg
}

fn enc_i32(w: &mut Writer, p: &ResponsePayload) {
    if let ResponsePayload::I32(v) = p {
        w.write_i32(*v);
    }
}

fn enc_str(w: &mut Writer, p: &ResponsePayload) {
    if let ResponsePayload::Str(v) = p {
        w.write_string(v);
    }
}

fn enc_menu_icon(w: &mut Writer, p: &ResponsePayload) {
    if let ResponsePayload::MenuIcon { image, url } = p {
        w.write_string(image);
        w.write_string(url);
    }
}

fn enc_presence(w: &mut Writer, p: &ResponsePayload) {
    if let ResponsePayload::Presence(presence) = p {
        encode_presence(w, presence);
    }
}

fn enc_user_stats(w: &mut Writer, p: &ResponsePayload) {
    if let ResponsePayload::Stats(stats) = p {
        encode_user_stats(w, stats);
    }
}

fn enc_chat_message(w: &mut Writer, p: &ResponsePayload) {
    if let ResponsePayload::ChatMessage(m) = p {
        encode_chat_message(w, m);
    }
}

fn enc_match(w: &mut Writer, p: &ResponsePayload) {
    if let ResponsePayload::Match(m) = p {
        encode_match(w, m);
    }
}

fn enc_slot_stamped_frame(w: &mut Writer, p: &ResponsePayload) {
    if let ResponsePayload::SlotStampedFrame { slot_index, frame } = p {
        encode_slot_stamped_frame(w, *slot_index, frame);
    }
}

fn enc_frame(w: &mut Writer, p: &ResponsePayload) {
    if let ResponsePayload::Frame(f) = p {
        encode_frame_bundle(w, f);
    }
}

fn enc_empty(_w: &mut Writer, _p: &ResponsePayload) {}

/// Builds the response-encoder registry. All known versions share the
/// same encoders in this protocol generation; the per-version table
/// still exists so a future version could override one entry without
/// touching the others.
pub fn build_encoders() -> VersionedRegistry<EncodeFn> {
    let mut reg = VersionedRegistry::new();
    for &version in KNOWN_VERSIONS {
        reg.register(version, ResponseId::ProtocolVersion.as_u16(), enc_i32 as EncodeFn);
        reg.register(version, ResponseId::LoginReply.as_u16(), enc_i32 as EncodeFn);
        reg.register(version, ResponseId::MenuIcon.as_u16(), enc_menu_icon as EncodeFn);
        reg.register(version, ResponseId::LoginPermissions.as_u16(), enc_i32 as EncodeFn);
        reg.register(version, ResponseId::UserPresence.as_u16(), enc_presence as EncodeFn);
        reg.register(version, ResponseId::UserStats.as_u16(), enc_user_stats as EncodeFn);
        reg.register(version, ResponseId::FriendsList.as_u16(), enc_empty as EncodeFn);
        reg.register(
            version,
            ResponseId::ChannelAvailable.as_u16(),
            enc_str as EncodeFn,
        );
        reg.register(
            version,
            ResponseId::ChannelInfoComplete.as_u16(),
            enc_empty as EncodeFn,
        );
        reg.register(
            version,
            ResponseId::ChannelJoinSuccess.as_u16(),
            enc_str as EncodeFn,
        );
        reg.register(version, ResponseId::SendMessage.as_u16(), enc_chat_message as EncodeFn);
        reg.register(version, ResponseId::UserQuit.as_u16(), enc_i32 as EncodeFn);
        reg.register(version, ResponseId::Ping.as_u16(), enc_empty as EncodeFn);
        reg.register(version, ResponseId::Announce.as_u16(), enc_str as EncodeFn);
        reg.register(version, ResponseId::TargetIsSilenced.as_u16(), enc_empty as EncodeFn);
        reg.register(version, ResponseId::UserDmBlocked.as_u16(), enc_str as EncodeFn);
        reg.register(version, ResponseId::CantSpectate.as_u16(), enc_i32 as EncodeFn);
        reg.register(version, ResponseId::SpectatorJoined.as_u16(), enc_i32 as EncodeFn);
        reg.register(
            version,
            ResponseId::FellowSpectatorJoined.as_u16(),
            enc_i32 as EncodeFn,
        );
        reg.register(version, ResponseId::SpectatorLeft.as_u16(), enc_i32 as EncodeFn);
        reg.register(
            version,
            ResponseId::FellowSpectatorLeft.as_u16(),
            enc_i32 as EncodeFn,
        );
        reg.register(version, ResponseId::SpectateFrames.as_u16(), enc_frame as EncodeFn);
        reg.register(version, ResponseId::MatchNew.as_u16(), enc_match as EncodeFn);
        reg.register(
            version,
            ResponseId::MatchJoinSuccess.as_u16(),
            enc_match as EncodeFn,
        );
        reg.register(version, ResponseId::MatchJoinFail.as_u16(), enc_empty as EncodeFn);
        reg.register(version, ResponseId::MatchUpdate.as_u16(), enc_match as EncodeFn);
        reg.register(version, ResponseId::MatchStart.as_u16(), enc_match as EncodeFn);
        reg.register(
            version,
            ResponseId::MatchScoreUpdate.as_u16(),
            enc_slot_stamped_frame as EncodeFn,
        );
        reg.register(version, ResponseId::MatchComplete.as_u16(), enc_empty as EncodeFn);
        reg.register(
            version,
            ResponseId::MatchAllPlayersLoaded.as_u16(),
            enc_empty as EncodeFn,
        );
        reg.register(version, ResponseId::MatchSkip.as_u16(), enc_empty as EncodeFn);
        reg.register(version, ResponseId::MatchAbort.as_u16(), enc_empty as EncodeFn);
        reg.register(version, ResponseId::MatchDisband.as_u16(), enc_i32 as EncodeFn);
    }
    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_status_only_registered_for_modern_version() {
        let reg = build_decoders();
        assert!(reg
            .resolve(20_120_812)
            .unwrap()
            .contains_key(&RequestId::ChangeStatus.as_u16()));
        assert!(!reg
            .resolve(535)
            .unwrap()
            .contains_key(&RequestId::ChangeStatus.as_u16()));
    }

    #[test]
    fn shared_packets_are_registered_on_every_known_version() {
        let reg = build_decoders();
        for version in KNOWN_VERSIONS {
            assert!(reg
                .resolve(*version)
                .unwrap()
                .contains_key(&RequestId::SendPublicMessage.as_u16()));
        }
    }

    #[test]
    fn encoders_round_trip_through_resolved_table() {
        let reg = build_encoders();
        let table = reg.resolve(20_120_812).unwrap();
        let f = table.get(&ResponseId::LoginReply.as_u16()).unwrap();
        let mut w = Writer::new();
        f(&mut w, &ResponsePayload::I32(5));
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.i32().unwrap(), 5);
    }
}
