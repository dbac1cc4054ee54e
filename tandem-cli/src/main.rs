use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Password;
use std::net::SocketAddr;
use std::time::Duration;
use tandem::client::{ClientConfig, ClientHandle, LinkState, RolePolicy, start_webrtc};
use tandem::model::{Message, MessageKind};
use tandem::server::{RelayConfig, serve};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem", version, about = "Room-based peer-to-peer chat")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Serve {
        #[arg(long, default_value = "0.0.0.0:3000", env = "TANDEM_BIND")]
        bind: SocketAddr,

        /// Seconds an empty room is kept; 0 keeps rooms forever.
        #[arg(long, default_value_t = 300, env = "TANDEM_ROOM_TTL_SECS")]
        room_ttl_secs: u64,

        /// STUN servers announced to clients (comma-separated).
        #[arg(long, env = "STUN_URLS", value_delimiter = ',')]
        stun_urls: Vec<String>,

        #[arg(long, env = "TURN_URL")]
        turn_url: Option<String>,

        #[arg(long, env = "TURN_USERNAME")]
        turn_username: Option<String>,

        #[arg(long, env = "TURN_CREDENTIAL")]
        turn_credential: Option<String>,
    },
    /// Join a room and chat from the terminal.
    Chat {
        #[arg(long, default_value = "ws://localhost:3000/ws", env = "TANDEM_URL")]
        url: String,

        #[arg(short, long)]
        room: String,

        #[arg(short, long)]
        username: String,

        #[arg(long, env = "TANDEM_PASSWORD")]
        password: Option<String>,

        /// Prompt for the room password.
        #[arg(long)]
        ask_password: bool,

        /// Let the lower session id send the offer instead of the earlier member.
        #[arg(long)]
        session_order: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Commands::Serve { .. } => "tandem_server=info,tower_http=info",
        Commands::Chat { .. } => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            room_ttl_secs,
            stun_urls,
            turn_url,
            turn_username,
            turn_credential,
        } => {
            let config = RelayConfig {
                bind,
                ..Default::default()
            }
            .with_room_idle_ttl_secs(room_ttl_secs)
            .with_ice_servers(stun_urls, turn_url, turn_username, turn_credential);

            println!("{}", format!("Starting relay on {bind}").green().bold());
            serve(config).await
        }
        Commands::Chat {
            url,
            room,
            username,
            password,
            ask_password,
            session_order,
        } => {
            let password = if ask_password {
                Some(
                    Password::new()
                        .with_prompt("Room password")
                        .allow_empty_password(true)
                        .interact()
                        .context("Failed to read password")?,
                )
            } else {
                password
            };

            let policy = if session_order {
                RolePolicy::SessionIdOrder
            } else {
                RolePolicy::ArrivalOrder
            };
            let config = ClientConfig::new(url, room, username)
                .with_password(password)
                .with_role_policy(policy);

            chat(config).await
        }
    }
}

async fn chat(config: ClientConfig) -> Result<()> {
    let client = start_webrtc(config);
    let printer = tokio::spawn(print_messages(client.subscribe_messages()));

    println!(
        "{}",
        "Type a message and press enter. /peers lists peers, /quit leaves.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match line.trim() {
            "/quit" => break,
            "/peers" => print_peers(&client),
            "" => {}
            text => client.send_chat(text)?,
        }
    }

    client.leave().await?;
    // Let the printer show the final notifications.
    tokio::time::sleep(Duration::from_millis(100)).await;
    printer.abort();
    Ok(())
}

async fn print_messages(mut messages: watch::Receiver<Vec<Message>>) {
    let mut printed = 0;
    loop {
        {
            let log = messages.borrow_and_update();
            for message in log.iter().skip(printed) {
                println!("{}", render(message));
            }
            printed = log.len();
        }
        if messages.changed().await.is_err() {
            break;
        }
    }
}

fn render(message: &Message) -> String {
    let time = DateTime::from_timestamp_millis(message.timestamp)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_default();

    match message.kind {
        MessageKind::Notification => format!("{} {}", time.dimmed(), message.text.yellow()),
        MessageKind::Chat => format!(
            "{} {}: {}",
            time.dimmed(),
            message.sender.as_deref().unwrap_or("?").cyan().bold(),
            message.text
        ),
    }
}

fn print_peers(client: &ClientHandle) {
    let peers = client.peers();
    if peers.is_empty() {
        println!("{}", "No peers yet.".dimmed());
        return;
    }
    for peer in peers {
        let state = match (peer.state, peer.open) {
            (LinkState::Connected, true) => "open".green(),
            (state, _) => state.to_string().yellow(),
        };
        println!("  {} [{}] {}", peer.display_name().bold(), state, peer.id.to_string().dimmed());
    }
}
