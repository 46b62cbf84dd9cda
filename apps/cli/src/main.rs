//! Resumer CLI - resumable single-file downloader
//!
//! Downloads one URL at a time into a fixed directory. Interrupted
//! downloads pick up from the bytes already on disk.

mod commands;
mod output;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Resumer - resumable downloader
#[derive(Parser)]
#[command(name = "resumer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Data directory for Resumer settings
    #[arg(long, env = "RESUMER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "human")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a URL, resuming any partial file
    Get {
        /// URL to download
        url: String,

        /// Destination directory (overrides settings)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Delete the partial file of a URL
    Discard {
        /// URL whose file should be removed
        url: String,

        /// Destination directory (overrides settings)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show/update settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all config
    Show,

    /// Set a config value
    Set {
        /// Config key
        key: String,

        /// Config value
        value: String,
    },

    /// Reset to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,resumer_core=debug,resumer=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Determine data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .map(|d| d.join("resumer"))
            .unwrap_or_else(|| PathBuf::from(".resumer"))
    });
    let store = resumer_core::SettingsStore::new(data_dir);

    match cli.command {
        Commands::Get { url, dir } => commands::get(&store, &url, dir, cli.output).await?,

        Commands::Discard { url, dir, yes } => {
            commands::discard(&store, &url, dir, yes, cli.output).await?
        }

        Commands::Config { action } => commands::config_action(&store, action, cli.output).await?,

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            clap_complete::generate(shell, &mut Cli::command(), "resumer", &mut std::io::stdout());
        }
    }

    Ok(())
}
