use ansi_term::Colour::{Green, Red, Yellow};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use meshlink_common::SessionConfig;
use meshlink_core::MeshClient;

/// Environment variable holding the auth key for the connect self-test
pub const TEST_AUTH_KEY_VAR: &str = "TEST_CLIENT_AUTH_KEY";

/// meshlink subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authenticate and join the tailnet
    Up(UpArgs),
    /// Leave the tailnet
    Down,
    /// Print the tailnet IPv4 address of a node
    Ip(IpArgs),
    /// Show where the client and daemon binaries were found
    Locate(LocateArgs),
    /// Daemon management commands
    Daemon(DaemonArgs),
    /// Connect with TEST_CLIENT_AUTH_KEY, then disconnect
    Selftest(SelftestArgs),
}

impl Commands {
    pub fn execute(self) -> Result<()> {
        match self {
            Commands::Up(args) => cmd_up(args),
            Commands::Down => cmd_down(),
            Commands::Ip(args) => cmd_ip(args),
            Commands::Locate(args) => cmd_locate(args),
            Commands::Daemon(args) => cmd_daemon(args),
            Commands::Selftest(args) => cmd_selftest(args),
        }
    }
}

/// Arguments for the `up` command
#[derive(Debug, Args)]
pub struct UpArgs {
    /// Hostname to register in the tailnet
    #[clap(long)]
    pub hostname: String,

    /// Auth key; falls back to TEST_CLIENT_AUTH_KEY
    #[clap(long, value_name = "KEY")]
    pub auth_key: Option<String>,
}

/// Arguments for the `ip` command
#[derive(Debug, Args)]
pub struct IpArgs {
    /// Node hostname (first DNS label, case-insensitive)
    #[clap(value_name = "HOSTNAME")]
    pub hostname: String,

    /// Match the local node instead of peers
    #[clap(long = "self")]
    pub self_node: bool,
}

/// Arguments for the `locate` command
#[derive(Debug, Args)]
pub struct LocateArgs {
    /// Print as JSON
    #[clap(long)]
    pub json: bool,
}

/// Arguments for the `daemon` command
#[derive(Debug, Args)]
pub struct DaemonArgs {
    #[clap(subcommand)]
    pub subcommand: DaemonSubcommand,
}

/// Daemon management subcommands
#[derive(Debug, Subcommand)]
pub enum DaemonSubcommand {
    /// Start the daemon if it is not running
    Start,
    /// Stop a standalone daemon
    Stop,
    /// Check whether the daemon is live
    Status,
}

/// Arguments for the `selftest` command
#[derive(Debug, Args)]
pub struct SelftestArgs {
    /// Hostname used for the test connection
    #[clap(long, default_value = "test-client")]
    pub hostname: String,
}

fn client() -> Result<MeshClient> {
    MeshClient::from_env().context("Failed to load meshlink configuration")
}

/// Pick the explicit key, else the test key from the environment
pub fn resolve_auth_key(explicit: Option<String>, from_env: Option<String>) -> Result<String> {
    let usable = |key: &String| !key.trim().is_empty();
    explicit
        .filter(usable)
        .or_else(|| from_env.filter(usable))
        .with_context(|| {
            format!("{TEST_AUTH_KEY_VAR} is not set; pass --auth-key or export a tailnet auth key")
        })
}

fn connect(client: &MeshClient, hostname: &str, auth_key: String) -> Result<()> {
    println!("🔧 Starting Tailscale...");
    let config = SessionConfig::new(hostname, auth_key)?;
    client
        .connect(config)
        .with_context(|| format!("Tailscale start failed for {hostname}"))?;
    println!("{}", Green.paint("✅ Tailscale started."));
    Ok(())
}

fn disconnect(client: &MeshClient) -> Result<()> {
    println!("🔌 Disconnecting from Tailnet...");
    client.disconnect().context("Tailscale disconnect failed")?;
    println!("{}", Green.paint("✅ Tailscale VPN disconnected."));
    Ok(())
}

pub fn cmd_up(args: UpArgs) -> Result<()> {
    let auth_key = resolve_auth_key(args.auth_key, std::env::var(TEST_AUTH_KEY_VAR).ok())?;
    connect(&client()?, &args.hostname, auth_key)
}

pub fn cmd_down() -> Result<()> {
    disconnect(&client()?)
}

pub fn cmd_ip(args: IpArgs) -> Result<()> {
    let client = client()?;
    let resolved = if args.self_node {
        client.resolve_self(&args.hostname)
    } else {
        client.resolve_peer(&args.hostname)
    };
    let address = resolved.with_context(|| format!("Could not resolve {}", args.hostname))?;
    println!("{}", address.ip);
    Ok(())
}

pub fn cmd_locate(args: LocateArgs) -> Result<()> {
    let client = client()?;
    let paths = client.locate();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    let show = |path: Option<&std::path::Path>| match path {
        Some(path) => path.display().to_string(),
        None => Red.paint("not found").to_string(),
    };
    println!("platform: {}", client.platform());
    println!("flavor:   {}", paths.flavor);
    println!("client:   {}", show(paths.client()));
    println!("daemon:   {}", show(paths.daemon()));
    if !paths.is_complete() {
        println!("{}", Yellow.paint("⚠️ Installation is incomplete."));
    }
    Ok(())
}

pub fn cmd_daemon(args: DaemonArgs) -> Result<()> {
    let client = client()?;
    match args.subcommand {
        DaemonSubcommand::Start => {
            client.ensure_daemon().context("Could not start tailscaled")?;
            println!("{}", Green.paint("✅ tailscaled is running."));
        }
        DaemonSubcommand::Stop => {
            let stopped = client.stop_daemon().context("Could not stop tailscaled")?;
            if stopped == 0 {
                println!("{}", Yellow.paint("⚠️ tailscaled was not running."));
            } else {
                println!("🛑 tailscaled process stopped.");
            }
        }
        DaemonSubcommand::Status => {
            if client.daemon_is_live() {
                println!("Daemon is running");
            } else {
                println!("Daemon is not running");
            }
        }
    }
    Ok(())
}

pub fn cmd_selftest(args: SelftestArgs) -> Result<()> {
    // Check the key before touching any binary
    let auth_key = resolve_auth_key(None, std::env::var(TEST_AUTH_KEY_VAR).ok())?;
    let client = client()?;
    info!(hostname = %args.hostname, platform = %client.platform(), "running connect self-test");
    connect(&client, &args.hostname, auth_key)?;
    disconnect(&client)
}
