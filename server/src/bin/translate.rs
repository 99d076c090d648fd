//! Fill in missing review translations.
//!
//! ```bash
//! translate --limit 100 --status published
//! translate --status all
//! ```

use anyhow::{Result, bail};
use clap::Parser;
use product_reviews_core::review::PublicationStatus;
use product_reviews_server::Config;
use product_reviews_server::app::ReviewService;
use product_reviews_server::bootstrap::{self, Resources};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "translate")]
#[command(about = "Translate reviews that are missing a language", long_about = None)]
struct Cli {
    /// Most reviews to translate
    #[arg(long, default_value_t = 100)]
    limit: usize,

    /// Status to walk: pending, published, rejected or all
    #[arg(long, default_value = "published")]
    status: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    bootstrap::init_tracing("info,product_reviews=info,sqlx=warn");

    let cli = Cli::parse();
    let status = match cli.status.as_str() {
        "all" => None,
        other => match other.parse::<PublicationStatus>() {
            Ok(status) => Some(status),
            Err(e) => bail!(e),
        },
    };

    let config = Config::from_env();
    let resources = Resources::from_config(&config).await?;
    let service = ReviewService::new(resources.deps.clone());

    let report = service.translation().translate_missing(status, cli.limit).await?;

    println!("Attempted:  {}", report.attempted);
    println!("Translated: {}", report.translated);
    println!("Failed:     {}", report.failed);

    Ok(if report.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
