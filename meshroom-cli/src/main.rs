use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use meshroom::client::{
    NoMedia, RelayClient, RtcTransportFactory, SessionConfig, SessionEvent, SessionOrchestrator,
};
use meshroom::model::{IceServerConfig, default_ice_servers};
use meshroom::server::{DEFAULT_BIND_ADDR, RelayConfig, serve};
use meshroom::{ParticipantId, RoomId};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshroom")]
#[command(about = "Mesh WebRTC signaling relay and test participant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Serve {
        #[arg(long, env = "MESHROOM_BIND", default_value = DEFAULT_BIND_ADDR)]
        bind: SocketAddr,

        #[command(flatten)]
        ice: IceArgs,
    },

    /// Join a room as a participant without local media.
    Join {
        /// Relay WebSocket URL.
        #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
        relay: String,

        #[arg(long)]
        room: String,

        /// Participant id; random when omitted.
        #[arg(long)]
        id: Option<String>,

        /// Offer to these participants right after joining.
        #[arg(long)]
        call: Vec<String>,

        #[command(flatten)]
        ice: IceArgs,
    },
}

#[derive(Args)]
struct IceArgs {
    /// STUN URLs, comma separated. Public Google STUN when empty.
    #[arg(long, env = "MESHROOM_STUN", value_delimiter = ',')]
    stun: Vec<String>,

    #[arg(long, env = "TURN_URL")]
    turn_url: Option<String>,

    #[arg(long, env = "TURN_USERNAME")]
    turn_username: Option<String>,

    #[arg(long, env = "TURN_CREDENTIAL")]
    turn_credential: Option<String>,
}

impl IceArgs {
    fn ice_servers(self) -> Vec<IceServerConfig> {
        let mut servers = if self.stun.is_empty() {
            default_ice_servers()
        } else {
            vec![IceServerConfig {
                urls: self.stun,
                username: None,
                credential: None,
            }]
        };

        if let Some(url) = self.turn_url {
            servers.push(IceServerConfig {
                urls: vec![url],
                username: self.turn_username,
                credential: self.turn_credential,
            });
        }
        servers
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve { bind, ice } => {
            let config = RelayConfig {
                bind_addr: bind,
                ice_servers: ice.ice_servers(),
            };
            println!("{}", format!("📡 Relay starting on {}", bind).green().bold());
            serve(config).await?;
        }

        Commands::Join {
            relay,
            room,
            id,
            call,
            ice,
        } => {
            let local_id = id.map(ParticipantId::from).unwrap_or_else(ParticipantId::random);
            run_participant(&relay, RoomId::from(room), local_id, call, ice).await?;
        }
    }

    Ok(())
}

async fn run_participant(
    relay_url: &str,
    room_id: RoomId,
    local_id: ParticipantId,
    call: Vec<String>,
    ice: IceArgs,
) -> Result<()> {
    info!("Connecting to relay at {}", relay_url);
    let (client, inbound) = RelayClient::connect(relay_url)
        .await
        .with_context(|| format!("Failed to connect to {}", relay_url))?;

    let config = SessionConfig {
        ice_servers: ice.ice_servers(),
        ..SessionConfig::default()
    };
    let factory = RtcTransportFactory::new().with_data_channel("meshroom");

    let mut session = SessionOrchestrator::new(
        local_id.clone(),
        room_id.clone(),
        config,
        Arc::new(factory),
        Arc::new(client),
        Arc::new(NoMedia::new()),
    );
    session.join().await?;
    println!(
        "{}",
        format!("🚪 Joined '{}' as {}", room_id, local_id).green().bold()
    );

    let handle = session.spawn(inbound);
    let mut events = handle.subscribe();
    for remote in call {
        handle.call(ParticipantId::from(remote)).await?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "👋 Leaving...".cyan());
                break;
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    println!("{}", format!("… skipped {} events", n).dimmed());
                }
                Err(broadcast::error::RecvError::Closed) => {
                    println!("{}", "Relay connection closed".red());
                    break;
                }
            },
        }
    }

    handle.leave().await?;
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::LinkStateChanged { remote_id, state } => {
            println!("   {} {} -> {}", "link".cyan(), remote_id, state);
        }
        SessionEvent::TrackReceived {
            remote_id, kind, ..
        } => {
            println!("   {} {} from {}", "track".cyan(), kind, remote_id);
        }
        SessionEvent::PeerUnreachable { remote_id } => {
            println!("   {} {}", "unreachable".red().bold(), remote_id);
        }
        SessionEvent::RelayError { code, message } => {
            println!("   {} {} ({})", "relay error".red().bold(), message, code);
        }
    }
}
