mod lobby;
mod lobby_command;

pub use lobby::*;
pub use lobby_command::*;
