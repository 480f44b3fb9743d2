//! brainmap CLI: browse, follow and edit incident playbooks from the terminal.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// brainmap: incident playbooks on a brain network
#[derive(Parser, Debug)]
#[command(name = "brainmap", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Remote playbook store URL (overrides storage.remote_url)
    #[arg(long)]
    remote: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List playbooks by node slot
    List,
    /// Print a playbook with its steps and branches
    Show {
        /// Playbook title
        title: String,
        /// Step to focus (1-based)
        #[arg(short, long)]
        step: Option<usize>,
    },
    /// Follow a condition or link from a step and print where it lands
    Follow {
        /// Playbook title
        title: String,
        /// Step holding the branch (1-based)
        #[arg(short, long)]
        step: usize,
        /// Condition to take (1-based)
        #[arg(long, conflicts_with = "link")]
        condition: Option<usize>,
        /// Link to take (1-based)
        #[arg(long)]
        link: Option<usize>,
    },
    /// Report cross-references that are broken or stale
    Check,
    /// Import playbooks from a JSON file
    Import {
        /// JSON file holding a playbook array
        file: PathBuf,
        /// Merge by title instead of replacing the collection
        #[arg(long)]
        merge: bool,
    },
    /// Export playbooks to a JSON file
    Export {
        /// Destination file
        file: PathBuf,
    },
    /// Add playbooks from a JSON file (one object or an array)
    Add {
        /// JSON file
        file: PathBuf,
    },
    /// Remove the playbook at a node slot
    Remove {
        /// Node slot index
        index: u32,
    },
    /// Print node positions for the brain network as JSON
    Nodes {
        /// Only the slots occupied by playbooks
        #[arg(long)]
        playbooks_only: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "brainmap", "brainmap")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "brainmap.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.remote).await
}
