//! Startup wiring shared by every binary.
//!
//! ```rust,ignore
//! bootstrap::init_tracing("info,product_reviews=debug,sqlx=warn");
//! let config = Config::from_env();
//! let resources = Resources::from_config(&config).await?;
//! let state = AppState::new(resources.deps.clone());
//! ```

use crate::app::Deps;
use crate::clients::{GoogleTranslator, HttpCdnClient, ObjectStoreMedia};
use crate::config::Config;
use product_reviews_core::environment::SystemClock;
use product_reviews_core::error::ReviewError;
use product_reviews_postgres::{
    DeadLetterQueue, PostgresJobQueue, PostgresReviewStore, PostgresStatisticsStore,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber, honouring `RUST_LOG` over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Everything a process needs once connected.
#[derive(Clone)]
pub struct Resources {
    /// Database pool
    pub pool: PgPool,
    /// Postgres-backed queue, for depth and dead-letter access
    pub queue: Arc<PostgresJobQueue>,
    /// Service dependency bundle
    pub deps: Deps,
}

impl Resources {
    /// Connect to Postgres, run migrations and build the external clients.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Storage`] if the database is unreachable or a
    /// migration fails, and [`ReviewError::Configuration`] if a client cannot
    /// be built from `config`.
    pub async fn from_config(config: &Config) -> Result<Self, ReviewError> {
        let pool =
            product_reviews_postgres::connect(&config.postgres.url, config.postgres.max_connections)
                .await?;
        product_reviews_postgres::migrate(&pool).await?;
        tracing::info!(max_connections = config.postgres.max_connections, "Database ready");

        let queue = Arc::new(PostgresJobQueue::new(pool.clone()));
        let deps = Deps::new(
            Arc::new(PostgresReviewStore::new(pool.clone())),
            Arc::new(PostgresStatisticsStore::new(pool.clone())),
            queue.clone(),
            Arc::new(GoogleTranslator::new(&config.translation)?),
            Arc::new(HttpCdnClient::new(&config.cdn)?),
            Arc::new(ObjectStoreMedia::from_config(&config.media)?),
            Arc::new(SystemClock),
        )
        .with_caller_reference_prefix(config.cdn.caller_reference_prefix.clone())
        .with_queue_names(
            config.queue.statistics_queue.clone(),
            config.queue.invalidation_queue.clone(),
        );

        Ok(Self { pool, queue, deps })
    }

    /// Dead-letter table access.
    #[must_use]
    pub fn dead_letters(&self) -> DeadLetterQueue {
        DeadLetterQueue::new(self.pool.clone())
    }
}
