//! Error categories shared by the session core. Decode and auth
//! failures close the connection (or reply with a negative
//! `LOGIN_REPLY`); the rest are returned to the caller and reported to
//! the offending session via a dedicated response packet — they never
//! close the connection.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("packet payload ended before it was fully decoded")]
    DecodeTruncated,
    #[error("packet id {0} is not a known request")]
    DecodeUnknownPacket(u16),
    #[error("no user with that name")]
    AuthNoUser,
    #[error("password did not match")]
    AuthBadPassword,
    #[error("account is restricted")]
    AuthBanned,
    #[error("account is not activated")]
    AuthNotActivated,
    #[error("declared adapter hash did not match computed hash")]
    AuthBadAdapters,
    #[error("http session token is unknown")]
    HttpBadToken,
    #[error("sender is currently silenced")]
    ChatSilenced,
    #[error("recipient only accepts messages from friends")]
    ChatDmBlocked,
    #[error("match has no free slot")]
    MatchFull,
    #[error("match password did not match")]
    MatchBadPassword,
    #[error("only the match host may do that")]
    MatchNotHost,
    #[error("match is already in progress")]
    MatchInProgress,
    #[error("spectator's client version is incompatible with the host's")]
    SpecIncompatible,
    #[error("transport connection was lost")]
    TransportLost,
}
