use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::IceServerConfig;
use tandem_peer::{PeerClient, PeerConfig, PeerEvent, RtcNegotiatorFactory, TransportConfig};
use tandem_server::ServerConfig;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Random one-to-one video chat signaling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling server.
    Serve {
        /// Overrides TANDEM_BIND.
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// STUN url handed to clients. Repeatable; overrides TANDEM_STUN_URLS.
        #[arg(long = "stun")]
        stun_urls: Vec<String>,

        #[arg(long)]
        lobby_buffer: Option<usize>,
    },
    /// Join the lobby as a headless peer and print what happens.
    Probe {
        #[arg(long, default_value = "ws://127.0.0.1:3001/ws")]
        url: String,

        /// Skip to the next partner this many seconds after each match.
        #[arg(long)]
        skip_after: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve {
            bind,
            stun_urls,
            lobby_buffer,
        } => {
            let mut config = ServerConfig::from_env()?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if !stun_urls.is_empty() {
                config.ice_servers.retain(|server| server.username.is_some());
                config.ice_servers.insert(
                    0,
                    IceServerConfig {
                        urls: stun_urls,
                        username: None,
                        credential: None,
                    },
                );
            }
            if let Some(buffer) = lobby_buffer {
                config.lobby_buffer =
                    tandem_server::validate_lobby_buffer(buffer).context("--lobby-buffer")?;
            }

            println!(
                "{} {}",
                "Serving signaling on".green().bold(),
                config.bind_addr
            );
            tandem_server::serve(config).await
        }
        Commands::Probe { url, skip_after } => {
            probe(&url, skip_after.map(Duration::from_secs)).await
        }
    }
}

async fn probe(url: &str, skip_after: Option<Duration>) -> Result<()> {
    let mut client = PeerClient::connect(
        url,
        PeerConfig::default(),
        TransportConfig::default(),
        Arc::new(RtcNegotiatorFactory),
    )
    .await?;

    client
        .handle
        .request_match()
        .await
        .context("Controller stopped before matching")?;
    println!("{}", "Looking for a partner...".cyan());

    let mut skip_at: Option<Instant> = None;

    loop {
        let skip_timer = async move {
            match skip_at {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            event = client.events.recv() => {
                let Some(event) = event else {
                    println!("{}", "Connection to the signaling server closed".red());
                    break;
                };
                match event {
                    PeerEvent::Matched { .. } => {
                        skip_at = skip_after.map(|delay| Instant::now() + delay);
                    }
                    PeerEvent::SessionEnded(_) => skip_at = None,
                    _ => {}
                }
                print_event(&event);
            }
            _ = skip_timer => {
                skip_at = None;
                println!("{}", "Skipping to the next partner".yellow());
                client.handle.skip().await.context("Controller stopped")?;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Leaving".yellow());
                let _ = client.handle.end().await;
                break;
            }
        }
    }

    client.close().await;
    Ok(())
}

fn print_event(event: &PeerEvent) {
    match event {
        PeerEvent::Queued { position } => {
            println!("{} position {}", "Queued".cyan(), position);
        }
        PeerEvent::QueueLeft => println!("{}", "Left the queue".cyan()),
        PeerEvent::Matched {
            session_id,
            partner_id,
            is_initiator,
        } => {
            let role = if *is_initiator { "initiator" } else { "responder" };
            println!(
                "{} {} in {} as {}",
                "Matched with".green().bold(),
                partner_id,
                session_id,
                role
            );
        }
        PeerEvent::StreamReady { stream_key, kinds } => {
            let kinds: Vec<String> = kinds.iter().map(|kind| kind.to_string()).collect();
            println!(
                "{} {} [{}]",
                "Stream ready".green(),
                stream_key.0,
                kinds.join(", ")
            );
        }
        PeerEvent::ConnectivityChanged(state) => {
            println!("{} {:?}", "Connectivity".blue(), state);
        }
        PeerEvent::SessionEnded(reason) => {
            println!("{} ({:?})", "Session ended".yellow().bold(), reason);
        }
        PeerEvent::RecoverableError { kind, message } => {
            println!("{} {}: {}", "Warning".yellow(), kind, message);
        }
        PeerEvent::FatalError { kind, message } => {
            println!("{} {}: {}", "Error".red().bold(), kind, message);
        }
        PeerEvent::Renegotiating { attempt } => {
            println!("{} attempt {}", "Renegotiating".magenta(), attempt);
        }
    }
}
