//! Session/presence/chat/spectating/multiplayer domain state, sitting
//! between the wire codec in `concerto-protocol` and the external
//! collaborators in `concerto-collab`.

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ids;
pub mod login;
pub mod multiplayer;
pub mod registry;
pub mod session;
pub mod spectator;

pub use channel::{Channel, ChatRouter, Message};
pub use dispatch::Dispatcher;
pub use error::SessionError;
pub use events::{Event, EventBus, Handler};
pub use ids::{
    ChannelName, ProtocolVersion, Token, UserId, BOT_ID, BOT_NAME, LOBBY_CHANNEL,
    MULTIPLAYER_CHANNEL,
};
pub use login::{disconnect, Authenticator, LoginOutcome, LoginRequest};
pub use multiplayer::{MatchRoom, MatchSettings, MultiplayerHub, Slot, SlotStatus};
pub use registry::SessionRegistry;
pub use session::{ClientFingerprint, PresenceFilter, Session, Status, Transport};
pub use spectator::SpectatorHub;
