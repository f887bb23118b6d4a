//! Binary client/server packet protocol: byte-stream codec, frame
//! transport, stable packet-id namespaces, and per-version packet
//! tables.

pub mod client_data;
pub mod codec_tables;
pub mod frame;
pub mod io;
pub mod packets;
pub mod registry;
pub mod types;

pub use codec_tables::{
    build_decoders, build_encoders, DecodeFn, EncodeFn, RequestPayload, ResponsePayload,
    KNOWN_VERSIONS,
};
pub use frame::{encode_frame, try_parse_frame, FrameError, PacketFrame};
pub use io::{CodecError, CodecResult, Reader, Writer};
pub use packets::{LoginFailure, RequestId, ResponseId, SERVER_PROTOCOL_VERSION};
pub use registry::{CodecTables, ProtocolVersion, VersionedRegistry};
pub use types::{
    ChatMessageWire, ChatSendWire, FrameBundle, MatchWire, PresenceWire, SlotWire, StatsWire,
    StatusWire, SLOT_COUNT,
};
