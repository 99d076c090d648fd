//! Recompute product statistics in bulk.
//!
//! ```bash
//! # Every product, synchronously
//! backfill
//!
//! # Two products, through the statistics queue
//! backfill --product-id p-1 --product-id p-2 --queue
//! ```
//!
//! Exits non-zero when any product failed.

use anyhow::Result;
use clap::Parser;
use product_reviews_server::Config;
use product_reviews_server::bootstrap::{self, Resources};
use product_reviews_statistics::aggregator::PAGE_SIZE;
use product_reviews_statistics::{BackfillDriver, BackfillMode};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "backfill")]
#[command(about = "Recompute rating statistics for some or all products", long_about = None)]
struct Cli {
    /// Product to recompute; repeat for several. Omit to enumerate every product.
    #[arg(long = "product-id")]
    product_ids: Vec<String>,

    /// Page size of the product enumeration
    #[arg(long, default_value_t = PAGE_SIZE)]
    chunk_size: usize,

    /// Schedule recompute jobs instead of computing inline
    #[arg(long)]
    queue: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    bootstrap::init_tracing("info,product_reviews=info,sqlx=warn");

    let cli = Cli::parse();
    let config = Config::from_env();
    let resources = Resources::from_config(&config).await?;
    let deps = &resources.deps;

    let mode = if cli.queue {
        BackfillMode::Queued
    } else {
        BackfillMode::Sync
    };
    let driver = BackfillDriver::new(deps.reviews.clone(), deps.aggregator(), deps.producer())
        .with_chunk_size(cli.chunk_size);

    let report = driver.run(&cli.product_ids, mode).await?;

    println!("Processed: {}", report.processed);
    println!("Succeeded: {}", report.succeeded);
    println!("Failed:    {}", report.failed.len());
    for (product_id, error) in &report.failed {
        println!("  {product_id}: {error}");
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
