mod connection;
mod media;
mod session;
mod signaling;

pub use connection::ConnectionId;
pub use media::{IceConnectivity, MediaKind, StreamKey};
pub use session::SessionId;
pub use signaling::{
    ClientMessage, EndReason, ErrorKind, IceServerConfig, ServerMessage, Signal, SignalKind,
};
