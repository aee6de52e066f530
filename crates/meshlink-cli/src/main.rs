use anyhow::Result;
use clap::Parser;
use commands::Commands;

mod commands;

/// meshlink - drive the local Tailscale client from the command line
#[derive(Parser, Debug)]
#[command(name = "meshlink")]
#[command(version)]
#[command(about = "Connect this machine to a tailnet and look up peers", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into());
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    cli.command.execute()
}
