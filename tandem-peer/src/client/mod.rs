mod signaling_sink;
mod ws_client;

pub use signaling_sink::*;
pub use ws_client::*;
