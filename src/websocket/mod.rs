mod handler;
mod message;

pub use handler::{admit, ws_handler, ConnectionState};
pub use message::{
    ChatEvent, EncodedFrame, Envelope, EnvelopeCodec, EnvelopeData, EventKind, OutboundFrame,
};
