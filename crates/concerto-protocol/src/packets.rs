//! Stable integer packet-id namespaces.
//!
//! `RequestId` is the client→server namespace, `ResponseId` is the
//! server→client namespace. Both are small integers drawn from disjoint
//! spaces; values are part of the wire contract and must never be
//! renumbered once shipped.

/// Client → server packet ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum RequestId {
    ChangeStatus = 0,
    SendPublicMessage = 1,
    Logout = 2,
    RequestStatusUpdate = 3,
    Pong = 4,

    StartSpectating = 10,
    StopSpectating = 11,
    SpectateFrames = 12,
    CantSpectate = 13,

    SendPrivateMessage = 20,
    ToggleBlockNonFriendDms = 21,

    JoinLobby = 30,
    PartLobby = 31,
    CreateMatch = 32,
    JoinMatch = 33,
    PartMatch = 34,
    MatchChangeSlot = 35,
    MatchReady = 36,
    MatchNotReady = 37,
    MatchLock = 38,
    MatchChangeSettings = 39,
    MatchChangePassword = 40,
    MatchStart = 41,
    MatchScoreUpdate = 42,
    MatchComplete = 43,
    MatchChangeMods = 44,
    MatchLoadComplete = 45,
    MatchNoBeatmap = 46,
    MatchHasBeatmap = 47,
    MatchSkipRequest = 48,
    MatchFailed = 49,
    MatchTransferHost = 50,
    MatchChangeTeam = 51,

    ChannelJoin = 60,
    ChannelPart = 61,

    ErrorReport = 70,
}

impl RequestId {
    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            0 => Self::ChangeStatus,
            1 => Self::SendPublicMessage,
            2 => Self::Logout,
            3 => Self::RequestStatusUpdate,
            4 => Self::Pong,
            10 => Self::StartSpectating,
            11 => Self::StopSpectating,
            12 => Self::SpectateFrames,
            13 => Self::CantSpectate,
            20 => Self::SendPrivateMessage,
            21 => Self::ToggleBlockNonFriendDms,
            30 => Self::JoinLobby,
            31 => Self::PartLobby,
            32 => Self::CreateMatch,
            33 => Self::JoinMatch,
            34 => Self::PartMatch,
            35 => Self::MatchChangeSlot,
            36 => Self::MatchReady,
            37 => Self::MatchNotReady,
            38 => Self::MatchLock,
            39 => Self::MatchChangeSettings,
            40 => Self::MatchChangePassword,
            41 => Self::MatchStart,
            42 => Self::MatchScoreUpdate,
            43 => Self::MatchComplete,
            44 => Self::MatchChangeMods,
            45 => Self::MatchLoadComplete,
            46 => Self::MatchNoBeatmap,
            47 => Self::MatchHasBeatmap,
            48 => Self::MatchSkipRequest,
            49 => Self::MatchFailed,
            50 => Self::MatchTransferHost,
            51 => Self::MatchChangeTeam,
            60 => Self::ChannelJoin,
            61 => Self::ChannelPart,
            70 => Self::ErrorReport,
            _ => return None,
        })
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Server → client packet ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum ResponseId {
    ProtocolVersion = 1000,
    LoginReply = 1001,
    MenuIcon = 1002,
    LoginPermissions = 1003,
    UserPresence = 1004,
    UserStats = 1005,
    FriendsList = 1006,
    ChannelAvailable = 1007,
    ChannelInfoComplete = 1008,
    ChannelJoinSuccess = 1009,
    SendMessage = 1010,
    UserQuit = 1011,
    Ping = 1012,
    Announce = 1013,

    TargetIsSilenced = 1020,
    UserDmBlocked = 1021,

    CantSpectate = 1030,
    SpectatorJoined = 1031,
    FellowSpectatorJoined = 1032,
    SpectatorLeft = 1033,
    FellowSpectatorLeft = 1034,
    SpectateFrames = 1035,

    MatchNew = 1040,
    MatchJoinSuccess = 1041,
    MatchJoinFail = 1042,
    MatchUpdate = 1043,
    MatchStart = 1044,
    MatchScoreUpdate = 1045,
    MatchComplete = 1046,
    MatchAllPlayersLoaded = 1047,
    MatchSkip = 1048,
    MatchAbort = 1049,
    MatchDisband = 1050,
}

impl ResponseId {
    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            1000 => Self::ProtocolVersion,
            1001 => Self::LoginReply,
            1002 => Self::MenuIcon,
            1003 => Self::LoginPermissions,
            1004 => Self::UserPresence,
            1005 => Self::UserStats,
            1006 => Self::FriendsList,
            1007 => Self::ChannelAvailable,
            1008 => Self::ChannelInfoComplete,
            1009 => Self::ChannelJoinSuccess,
            1010 => Self::SendMessage,
            1011 => Self::UserQuit,
            1012 => Self::Ping,
            1013 => Self::Announce,
            1020 => Self::TargetIsSilenced,
            1021 => Self::UserDmBlocked,
            1030 => Self::CantSpectate,
            1031 => Self::SpectatorJoined,
            1032 => Self::FellowSpectatorJoined,
            1033 => Self::SpectatorLeft,
            1034 => Self::FellowSpectatorLeft,
            1035 => Self::SpectateFrames,
            1040 => Self::MatchNew,
            1041 => Self::MatchJoinSuccess,
            1042 => Self::MatchJoinFail,
            1043 => Self::MatchUpdate,
            1044 => Self::MatchStart,
            1045 => Self::MatchScoreUpdate,
            1046 => Self::MatchComplete,
            1047 => Self::MatchAllPlayersLoaded,
            1048 => Self::MatchSkip,
            1049 => Self::MatchAbort,
            1050 => Self::MatchDisband,
            _ => return None,
        })
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// The server's own protocol constant, distinct from a client's
/// negotiated `ProtocolVersion`.
pub const SERVER_PROTOCOL_VERSION: i32 = 18;

/// Negative `LOGIN_REPLY` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LoginFailure {
    ServerError = -5,
    Authentication = -1,
    UpdateNeeded = -2,
    Banned = -3,
    NotActivated = -4,
}

impl LoginFailure {
    pub fn code(self) -> i32 {
        self as i32
    }
}
