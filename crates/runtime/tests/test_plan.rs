use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use gigboard_auth::Identity;
use gigboard_config::AppConfig;
use gigboard_messaging::ServerEvent;
use gigboard_runtime::{self, BackendServices};
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    let table: String = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'conversations'",
    )
    .fetch_one(&services.db_pool)
    .await?;

    assert_eq!("conversations", table);
    assert!(db_path.exists(), "sqlite database file should be created");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_applies_pool_settings() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/pool.db");
    let config = build_config(sqlite_url(&db_path), 3);

    let services = initialise(&config).await?;

    assert_eq!(3, services.db_pool.options().get_max_connections());
    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(1, enabled, "foreign key enforcement must be enabled");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_supports_in_memory_database() -> Result<()> {
    let config = build_config("sqlite::memory:".into(), 4);
    let services = initialise(&config).await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(0, count);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_reports_database_failures_with_context() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let blocker = temp_dir.path().join("not-a-directory");
    fs::write(&blocker, b"occupied")?;
    let config = build_config(sqlite_url(&blocker.join("gigboard.db")), 1);

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected database initialisation to fail"),
        Err(error) => error,
    };
    assert!(
        error.to_string().contains("failed to initialise database"),
        "expected database failure context, got {error:#}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_closes_live_connections() -> Result<()> {
    let config = build_config("sqlite::memory:".into(), 1);
    let services = initialise(&config).await?;

    let (outbound, mut inbound) = services.messaging.outbound_channel();
    let identity = Identity {
        user_id: "u1".into(),
        username: "alice".into(),
        avatar_url: None,
    };
    let connection = services.messaging.connect(identity, outbound).await;
    assert!(matches!(inbound.recv().await, Some(ServerEvent::Hello { .. })));
    assert_eq!(services.messaging.router().connection_count(), 1);

    services.shutdown().await;

    assert_eq!(services.messaging.router().connection_count(), 0);
    assert!(services.db_pool.is_closed());
    drop(connection);
    assert!(inbound.recv().await.is_none());
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    gigboard_runtime::telemetry::init_tracing().expect("first initialisation should succeed");

    let second = gigboard_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { gigboard_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}
