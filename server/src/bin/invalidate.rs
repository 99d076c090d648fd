//! Invalidate CDN paths by hand.
//!
//! ```bash
//! invalidate /api/reviews/r-1 /reviews/r-1/media-ab12cd34.jpg
//! invalidate --review r-1
//! invalidate --product p-1 --sync
//! invalidate --all
//! ```
//!
//! Without `--sync` the batch is queued for the invalidation worker. With
//! it, transient CDN failures are retried in-process on the invalidation
//! schedule.

use anyhow::Result;
use clap::Parser;
use product_reviews_core::paths;
use product_reviews_runtime::retry::RetryPolicy;
use product_reviews_server::Config;
use product_reviews_server::bootstrap::{self, Resources};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "invalidate")]
#[command(about = "Invalidate CDN cache paths", long_about = None)]
struct Cli {
    /// Explicit paths
    paths: Vec<String>,

    /// All media and every API resource
    #[arg(long)]
    all: bool,

    /// All media
    #[arg(long)]
    media: bool,

    /// Every API resource
    #[arg(long)]
    api: bool,

    /// One review's media and API resources
    #[arg(long)]
    review: Option<String>,

    /// One product's review listings
    #[arg(long)]
    product: Option<String>,

    /// Call the CDN now instead of queueing
    #[arg(long)]
    sync: bool,
}

impl Cli {
    fn collect_paths(&self) -> Vec<String> {
        let mut out = self.paths.clone();
        if self.all || self.media {
            out.extend(paths::all_media());
        }
        if self.all || self.api {
            out.extend(paths::all_api());
        }
        if let Some(review_id) = &self.review {
            out.extend(paths::review_media(review_id));
            out.extend(paths::review_api(review_id));
        }
        if let Some(product_id) = &self.product {
            out.extend(paths::product_reviews_api(product_id));
        }
        paths::normalize_all(out)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    bootstrap::init_tracing("info,product_reviews=info,sqlx=warn");

    let cli = Cli::parse();
    let batch = cli.collect_paths();
    if batch.is_empty() {
        eprintln!("No paths given. Pass paths or one of --all, --media, --api, --review, --product.");
        return Ok(ExitCode::FAILURE);
    }

    for path in &batch {
        println!("  {path}");
    }

    let config = Config::from_env();
    let resources = Resources::from_config(&config).await?;
    let deps = &resources.deps;

    if cli.sync {
        match deps
            .dispatcher()
            .dispatch_with_retry(&batch, &RetryPolicy::invalidation())
            .await?
        {
            Some(id) => println!("Invalidation {id} created for {} paths", batch.len()),
            None => println!("CDN not configured, nothing sent"),
        }
    } else {
        match deps.invalidator().invalidate(&batch).await? {
            Some(job_id) => println!("Queued invalidation job {job_id} for {} paths", batch.len()),
            None => println!("Nothing to queue"),
        }
    }

    Ok(ExitCode::SUCCESS)
}
