//! zrepl operator CLI

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;

/// ZFS replication progress tooling
#[derive(Parser)]
#[command(name = "zrepl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage holds & step bookmarks
    Holds {
        #[command(subcommand)]
        command: HoldsCommands,
    },
}

#[derive(Subcommand)]
enum HoldsCommands {
    /// List all holds and bookmarks managed by replication jobs
    List {
        /// Only show markers owned by this job
        #[arg(long)]
        job: Option<String>,
        /// Emit the stable JSON document instead of human output
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Holds { command } => match command {
            HoldsCommands::List { job, json } => cmd::holds::list(job.as_deref(), json).await,
        },
    }
}
