use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

use crate::connection::Role;

#[derive(Debug, Parser)]
#[command(
    name = "signal-relay",
    author,
    version,
    about = "WebRTC signaling relay pairing one sender with one receiver"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub serve: ServeArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Connect to a running relay, declare a role and print every frame received
    DebugClient(DebugClientArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind the HTTP/WebSocket listener to.
    #[arg(long, env = "SIGNAL_RELAY_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Seconds to wait after the shutdown signal before exiting.
    #[arg(long, env = "SIGNAL_RELAY_SHUTDOWN_GRACE_SECS", default_value_t = 2)]
    pub shutdown_grace_secs: u64,

    /// Do not install the Prometheus recorder or serve `/metrics`.
    #[arg(long, env = "SIGNAL_RELAY_DISABLE_METRICS", default_value_t = false)]
    pub disable_metrics: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "SIGNAL_RELAY_LOG", default_value = "info")]
    pub log_filter: String,
}

#[derive(Debug, Clone, Args)]
pub struct DebugClientArgs {
    /// Relay endpoint, e.g. ws://127.0.0.1:8080/ws
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/ws")]
    pub url: String,

    /// Role to declare after connecting.
    #[arg(short, long, value_enum)]
    pub role: ClientRole,

    /// SDP string to send as `createOffer` once a partner is connected.
    #[arg(long)]
    pub offer: Option<String>,

    /// Exit after this many frames have been printed.
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClientRole {
    Sender,
    Receiver,
}

impl From<ClientRole> for Role {
    fn from(role: ClientRole) -> Self {
        match role {
            ClientRole::Sender => Role::Sender,
            ClientRole::Receiver => Role::Receiver,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub shutdown_grace: Duration,
    pub metrics_enabled: bool,
    pub log_filter: String,
}

impl TryFrom<ServeArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = args
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", args.listen_addr))?;
        if args.log_filter.trim().is_empty() {
            bail!("log filter must not be empty");
        }
        Ok(ServerConfig {
            listen_addr,
            shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
            metrics_enabled: !args.disable_metrics,
            log_filter: args.log_filter,
        })
    }
}
