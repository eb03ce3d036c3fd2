use std::sync::Arc;

use anyhow::{Context, Result};
use gigboard_auth::Authenticator;
use gigboard_config::AppConfig;
use gigboard_database::initialize_database;
use gigboard_messaging::MessagingService;
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global `fmt` subscriber. `RUST_LOG` overrides the
    /// default `info` filter.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .with_target(true)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Process-wide services, created once at start-up.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub messaging: Arc<MessagingService>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let authenticator = Authenticator::new(db_pool.clone(), &config.auth);
        let messaging = Arc::new(MessagingService::new(db_pool.clone(), &config.messaging));

        info!(
            database = %config.database.url,
            max_message_length = config.messaging.max_message_length,
            max_page_size = config.messaging.max_page_size,
            "backend services ready"
        );

        Ok(Self {
            db_pool,
            authenticator,
            messaging,
        })
    }

    /// Tear down live connections, then close the pool.
    pub async fn shutdown(&self) {
        self.messaging.shutdown().await;
        self.db_pool.close().await;
        info!("backend services stopped");
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
