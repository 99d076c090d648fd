//! Inspect and act on dead-lettered jobs.
//!
//! ```bash
//! dlq list --status pending --limit 20
//! dlq show 42
//! dlq redrive 42
//! dlq discard 42 --reason "product removed"
//! dlq count
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use product_reviews_postgres::{DLQStatus, FailedJob};
use product_reviews_server::Config;
use product_reviews_server::bootstrap::{self, Resources};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dlq")]
#[command(about = "Manage dead-lettered queue jobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List entries in a status, oldest first
    List {
        /// pending, processing, resolved or discarded
        #[arg(long, default_value = "pending")]
        status: String,
        /// Most entries to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one entry with its payload
    Show {
        /// Entry id
        id: i64,
    },
    /// Put an entry's payload back on its queue
    Redrive {
        /// Entry id
        id: i64,
    },
    /// Drop an entry permanently
    Discard {
        /// Entry id
        id: i64,
        /// Note stored with the entry
        #[arg(long, default_value = "discarded by operator")]
        reason: String,
    },
    /// Number of pending entries
    Count,
}

fn print_entry(entry: &FailedJob) {
    println!(
        "{:>6}  {:<20} job={:<8} attempts={:<2} {}  {}",
        entry.id,
        entry.queue,
        entry.job_id,
        entry.attempts,
        entry.failed_at.format("%Y-%m-%d %H:%M:%S"),
        entry.error_message
    );
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    bootstrap::init_tracing("warn,product_reviews=info,sqlx=warn");

    let cli = Cli::parse();
    let config = Config::from_env();
    let resources = Resources::from_config(&config).await?;
    let dlq = resources.dead_letters();

    match cli.command {
        Command::List { status, limit } => {
            let status = DLQStatus::parse(&status)?;
            let entries = dlq.list_by_status(status, limit).await?;
            if entries.is_empty() {
                println!("No {} entries", status.as_str());
            }
            entries.iter().for_each(print_entry);
        }
        Command::Show { id } => {
            let Some(entry) = dlq.get_by_id(id).await? else {
                eprintln!("Dead-letter entry {id} not found");
                return Ok(ExitCode::FAILURE);
            };
            print_entry(&entry);
            println!("status: {}", entry.status.as_str());
            if let Some(notes) = &entry.resolution_notes {
                println!("notes:  {notes}");
            }
            let payload = serde_json::to_string_pretty(&entry.payload)
                .context("Failed to render payload")?;
            println!("{payload}");
        }
        Command::Redrive { id } => {
            let job_id = dlq.redrive(id).await?;
            println!("Entry {id} redriven as job {job_id}");
        }
        Command::Discard { id, reason } => {
            dlq.discard(id, &reason).await?;
            println!("Entry {id} discarded");
        }
        Command::Count => {
            println!("{}", dlq.count_pending().await?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
