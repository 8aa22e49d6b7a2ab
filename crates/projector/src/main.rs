//! `projector` command-line entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "projector")]
#[command(about = "Homelab projector - service manifests to nginx and DNS configuration")]
#[command(version)]
struct Cli {
    /// Settings file path (defaults to projector.yaml in the workspace)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the stream and http nginx configs for one network
    Nginx(commands::nginx::NginxArgs),

    /// Generate the DNS host list
    Records(commands::records::RecordsArgs),

    /// Show how services classify on a network without writing anything
    Classify(commands::classify::ClassifyArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Cli { settings, command, .. } = cli;
    smol::block_on(async move {
        let settings = settings.as_deref();
        match command {
            Commands::Nginx(args) => commands::nginx::run(settings, args).await,
            Commands::Records(args) => commands::records::run(settings, args),
            Commands::Classify(args) => commands::classify::run(settings, args),
        }
    })
}
