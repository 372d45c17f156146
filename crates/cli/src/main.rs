//! Ember CLI - Command-line interface for the Ember engine
//!
//! Usage:
//!   ember run [--duration <secs>]                       - Run the scheduler until Ctrl-C
//!   ember dispatch <trigger> --actor <id> [--subject <id>] - Run one workflow
//!   ember job list                                      - List scheduled jobs
//!   ember job trigger <name>                            - Run a job now
//!   ember config check                                  - Validate configuration

use clap::{Parser, Subcommand};
use cli::app::Sources;
use cli::commands::{ConfigCommand, DispatchCommand, JobCommand, RunCommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Ember - Scope-aware agent orchestration engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (.yaml, .yml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// World fixture (YAML); the bundled demo world when omitted
    #[arg(short, long, global = true)]
    world: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler
    Run(RunCommand),
    /// Dispatch one trigger for one actor
    Dispatch(DispatchCommand),
    /// Scheduled job management
    Job(JobCommand),
    /// Configuration checks
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let sources = Sources {
        config: cli.config,
        world: cli.world,
    };

    match cli.command {
        Commands::Run(cmd) => cmd.run(&sources, cli.json).await,
        Commands::Dispatch(cmd) => cmd.run(&sources, cli.json).await,
        Commands::Job(cmd) => cmd.run(&sources, cli.json).await,
        Commands::Config(cmd) => cmd.run(&sources),
    }
}
