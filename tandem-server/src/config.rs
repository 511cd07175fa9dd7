use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use tandem_core::IceServerConfig;

pub const DEFAULT_PORT: u16 = 3001;

pub const DEFAULT_STUN_URLS: [&str; 3] = [
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun.cloudflare.com:3478",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Handed to every client in the `ice_config` frame.
    pub ice_servers: Vec<IceServerConfig>,
    /// Capacity of the lobby command channel.
    pub lobby_buffer: usize,
}

impl ServerConfig {
    /// Read `TANDEM_*` variables, falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let bind_addr = match env::var("TANDEM_BIND") {
            Ok(value) => value
                .parse()
                .context("TANDEM_BIND is not a socket address")?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };

        let stun_urls = env::var("TANDEM_STUN_URLS")
            .map(|urls| {
                urls.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|_| DEFAULT_STUN_URLS.iter().map(|url| url.to_string()).collect());

        let mut ice_servers = Vec::new();
        if !stun_urls.is_empty() {
            ice_servers.push(IceServerConfig {
                urls: stun_urls,
                username: None,
                credential: None,
            });
        }
        if let Ok(turn_url) = env::var("TANDEM_TURN_URL") {
            ice_servers.push(IceServerConfig {
                urls: vec![turn_url],
                username: env::var("TANDEM_TURN_USERNAME").ok(),
                credential: env::var("TANDEM_TURN_CREDENTIAL").ok(),
            });
        }

        let lobby_buffer = match env::var("TANDEM_LOBBY_BUFFER") {
            Ok(value) => {
                let buffer = value
                    .parse()
                    .context("TANDEM_LOBBY_BUFFER is not a number")?;
                validate_lobby_buffer(buffer).context("TANDEM_LOBBY_BUFFER")?
            }
            Err(_) => 256,
        };

        Ok(Self {
            bind_addr,
            ice_servers,
            lobby_buffer,
        })
    }
}

/// The lobby command channel needs room for at least one command.
pub fn validate_lobby_buffer(buffer: usize) -> Result<usize> {
    if buffer == 0 {
        anyhow::bail!("lobby buffer must be at least 1");
    }
    Ok(buffer)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            ice_servers: vec![IceServerConfig {
                urls: DEFAULT_STUN_URLS.iter().map(|url| url.to_string()).collect(),
                username: None,
                credential: None,
            }],
            lobby_buffer: 256,
        }
    }
}
