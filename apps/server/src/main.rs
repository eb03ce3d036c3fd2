use anyhow::Context;
use clap::{Parser, Subcommand};
use gigboard_config::load as load_config;
use gigboard_database::{initialize_database, timestamp::from_optional_micros};
use gigboard_gateway::{create_router, GatewayState};
use gigboard_runtime::{shutdown_signal, telemetry, BackendServices};
use sqlx::Row;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "gigboard-server")]
#[command(about = "Gigboard messaging backend (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print stored conversations
    DumpConversations {
        /// Only show conversations this user takes part in
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::Migrate => migrate().await,
        Commands::DumpConversations { user } => dump_conversations(user).await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting Gigboard messaging backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::new(
        services.db_pool.clone(),
        services.authenticator.clone(),
        services.messaging.clone(),
        &config.auth,
    );
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    services.shutdown().await;
    info!("backend shut down");
    Ok(())
}

async fn migrate() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let pool = initialize_database(&config.database)
        .await
        .context("database migrations failed")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(&pool)
        .await
        .context("failed to read migration history")?;

    println!("Database at {} is up to date ({applied} migrations applied)", config.database.url);
    pool.close().await;
    Ok(())
}

async fn dump_conversations(user: Option<String>) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    match user {
        Some(user_id) => dump_for_user(&services, &user_id).await?,
        None => dump_all(&services).await?,
    }

    services.shutdown().await;
    Ok(())
}

async fn dump_for_user(services: &BackendServices, user_id: &str) -> anyhow::Result<()> {
    let summaries = services
        .messaging
        .list_conversations(user_id)
        .await
        .with_context(|| format!("failed to list conversations for {user_id}"))?;

    println!("=== CONVERSATIONS FOR {user_id} ===");
    if summaries.is_empty() {
        println!("No conversations found");
        return Ok(());
    }

    println!(
        "{:<28} {:<20} {:<8} {:<32} {}",
        "ID", "With", "Unread", "Last Message At", "Last Message"
    );
    println!("{}", "-".repeat(120));

    for summary in summaries {
        let with = summary
            .counterpart
            .map(|party| party.username)
            .unwrap_or_else(|| "<unknown>".to_string());
        let last_at = summary
            .conversation
            .last_message_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "NULL".to_string());
        let snippet = summary
            .last_message
            .map(|message| message.content.chars().take(40).collect::<String>())
            .unwrap_or_default();

        println!(
            "{:<28} {:<20} {:<8} {:<32} {}",
            summary.conversation.id, with, summary.is_unread, last_at, snippet
        );
    }
    Ok(())
}

async fn dump_all(services: &BackendServices) -> anyhow::Result<()> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.participant_low, c.participant_high, c.job_id, c.last_message_at,
               (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id) AS message_count
        FROM conversations c
        ORDER BY COALESCE(c.last_message_at, c.created_at) DESC
        "#,
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch conversations")?;

    println!("=== CONVERSATIONS ===");
    if rows.is_empty() {
        println!("No conversations found in database");
        return Ok(());
    }

    println!("Found {} conversations:", rows.len());
    println!(
        "{:<28} {:<16} {:<16} {:<16} {:<10} {}",
        "ID", "Participant", "Participant", "Job", "Messages", "Last Message At"
    );
    println!("{}", "-".repeat(120));

    for row in rows {
        let id: String = row.try_get("id")?;
        let low: String = row.try_get("participant_low")?;
        let high: String = row.try_get("participant_high")?;
        let job_id: Option<String> = row.try_get("job_id")?;
        let last_message_at: Option<i64> = row.try_get("last_message_at")?;
        let message_count: i64 = row.try_get("message_count")?;

        let last_message_at = from_optional_micros(last_message_at)?
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "NULL".to_string());

        println!(
            "{:<28} {:<16} {:<16} {:<16} {:<10} {}",
            id,
            low,
            high,
            job_id.as_deref().unwrap_or("NULL"),
            message_count,
            last_message_at
        );
    }
    Ok(())
}
