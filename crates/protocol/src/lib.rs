//! Stream protocol: frames, event names, payload shapes, and the
//! `text/event-stream` wire codec shared by the relay server and clients.
//!
//! Every frame on the wire is two lines followed by a blank line:
//!
//! ```text
//! event: message_chunk
//! data: {"type":"chunk","content":"H","index":0,"timestamp":"..."}
//!
//! ```

pub mod codec;
pub mod events;
pub mod frame;

pub use codec::{decode_payload, encode, FrameDecoder};
pub use events::{
    ConnectedPayload, EventName, HeartbeatPayload, ReplyPayload, ServerEvent, ShutdownPayload,
};
pub use frame::{now_timestamp, Frame, ProtocolError};
