//! DriveMirror command-line interface.
//!
//! Mirrors a folder tree between two cloud drive accounts. The `mirror`
//! subcommand does the actual work; `auth` manages the cached sign-ins for
//! the source and destination accounts and `config` manages the YAML
//! configuration file.

mod commands;
mod output;
mod progress;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use drivemirror_core::config::Config;
use tracing_subscriber::EnvFilter;

use crate::commands::{auth::AuthCommand, config::ConfigCommand, mirror::MirrorCommand};
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "drivemirror")]
#[command(about = "Mirror a folder tree between two cloud drive accounts")]
#[command(version)]
struct Cli {
    /// Emit machine-readable JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Suppress the live status line
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror a source folder into a destination folder
    Mirror(MirrorCommand),

    /// Manage the cached account sign-ins
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Mirror(cmd) => cmd.execute(&config_path, format, cli.quiet).await,
        Commands::Auth(cmd) => cmd.execute(&config_path, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format),
    }
}

/// Logs go to stderr so JSON output on stdout stays parseable.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
