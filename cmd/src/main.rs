//! MycoBrain MDP node binary.
//!
//! One binary, three roles: the origin (Side A) generates signed telemetry
//! and executes commands, the router (Side B) bridges the wired and radio
//! links, and the gateway surfaces radio traffic to a host over stdio.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod collaborators;
mod config;
mod gateway;
mod links;
mod origin;
mod router;

use config::NodeConfig;

/// Which node this process is
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Side A: sensing, actuation, durable telemetry
    Origin,
    /// Side B: wired ↔ radio forwarder
    Router,
    /// Radio gateway with a stdio host interface
    Gateway,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Origin => "origin",
            Role::Router => "router",
            Role::Gateway => "gateway",
        }
    }
}

/// MycoBrain MDP node
#[derive(Parser, Debug)]
#[command(name = "myco-node", version, about = "MycoBrain MDP node (origin, router, or gateway)")]
struct Args {
    /// Node role
    #[arg(long, value_enum)]
    role: Role,

    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Serial device for the wired link, e.g. /dev/ttyUSB0
    #[arg(long)]
    serial: Option<String>,

    /// Baud rate for the serial device
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// UDP bind address standing in for the wired link
    #[arg(long)]
    wired_listen: Option<SocketAddr>,

    /// UDP peer address standing in for the wired link
    #[arg(long)]
    wired_peer: Option<SocketAddr>,

    /// UDP bind address for the radio link
    #[arg(long)]
    radio_listen: Option<SocketAddr>,

    /// UDP peer address for the radio link
    #[arg(long)]
    radio_peer: Option<SocketAddr>,

    /// Directory for the durable kv namespaces
    #[arg(long, default_value = "./mdpdata")]
    storage_dir: PathBuf,

    /// Cooperative loop tick, e.g. 10ms
    #[arg(long, default_value = "10ms")]
    tick: humantime::Duration,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("myco_node={}", args.log_level).parse()?)
        .add_directive(format!("mdp_wire={}", args.log_level).parse()?)
        .add_directive(format!("mdp_link={}", args.log_level).parse()?)
        .add_directive(format!("mdp_reliability={}", args.log_level).parse()?)
        .add_directive(format!("mdp_routing={}", args.log_level).parse()?)
        .add_directive(format!("mdp_durable={}", args.log_level).parse()?);

    // Host JSON owns stdout at the gateway; logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let span = tracing::info_span!("node", role = args.role.as_str());
    let _guard = span.enter();

    info!("Starting MycoBrain node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load_from_file(&args.config)?;
    let tick: Duration = args.tick.into();

    match args.role {
        Role::Origin => {
            let link = links::wired_link(
                args.serial.as_deref(),
                args.baud,
                args.wired_listen,
                args.wired_peer,
            )
            .await?;
            origin::run(&config, &args.storage_dir, tick, link).await
        }
        Role::Router => {
            let wired = links::wired_link(
                args.serial.as_deref(),
                args.baud,
                args.wired_listen,
                args.wired_peer,
            )
            .await?;
            let radio = links::radio_link(args.radio_listen, args.radio_peer).await?;
            router::run(tick, wired, radio).await
        }
        Role::Gateway => {
            let radio = links::radio_link(args.radio_listen, args.radio_peer).await?;
            gateway::run(tick, radio).await
        }
    }
}
