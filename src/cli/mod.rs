//! CLI commands module.

mod scheduler;
mod web;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use scheduler::cmd_scheduler;
pub use web::cmd_web;

#[derive(Parser)]
#[command(name = "taskwheel", about = "taskwheel - database-driven cron scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cron scheduler daemon.
    Scheduler {
        /// Override the task API base URL (defaults to TASK_API_BASE_URL).
        #[arg(long)]
        base: Option<String>,

        /// Path of the SQLite task database (defaults to TASK_DB_PATH).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Run the admin web UI for viewing and creating task rows.
    Web {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,

        /// Path of the SQLite task database (defaults to TASK_DB_PATH).
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scheduler { base, db } => cmd_scheduler(base, db).await,
        Commands::Web { addr, db } => cmd_web(addr, db).await,
    }
}
