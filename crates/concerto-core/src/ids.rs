//! Newtype identifiers for values that are otherwise easy to mix up
//! at call sites (a raw `i32` user id vs. a match id vs. a token).

use std::fmt;

pub type UserId = i32;
pub type ProtocolVersion = i32;

pub const BOT_NAME: &str = "BanchoBot";
pub const BOT_ID: UserId = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(pub String);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn spectator(host_id: UserId) -> Self {
        Self(format!("#spec_{host_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const MULTIPLAYER_CHANNEL: &str = "#multiplayer";
pub const LOBBY_CHANNEL: &str = "#lobby";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(pub String);

impl Token {
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
