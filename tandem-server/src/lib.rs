mod config;
mod lobby;
mod matchmaking;
mod relay;
mod server;
mod session;
mod signaling;

pub use config::*;
pub use lobby::*;
pub use matchmaking::*;
pub use relay::*;
pub use server::*;
pub use session::*;
pub use signaling::*;
