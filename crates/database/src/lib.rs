//! Gigboard Database Crate
//!
//! Connection management, embedded migrations and the repositories backing
//! the messaging core: conversations, participants, messages and read-only
//! directory lookups.

use gigboard_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod timestamp;
pub mod types;

pub use connection::{ping, prepare_database};
pub use migrations::run_migrations;

pub use repos::{ConversationRepository, MessageRepository, ParticipantRepository, PartyRepository};

pub use entities::{
    Conversation, ConversationSummary, Message, NewConversation, Participant, ParticipantPair,
    Party,
};

pub use types::{DatabaseError, DatabaseResult};

pub use sqlx::SqlitePool as Pool;

/// Open the pool and apply pending migrations.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn initialize_database_applies_migrations() {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("init.db").display()),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();
        let count = ConversationRepository::new(pool).count().await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn initialize_database_reports_connection_errors() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", blocker.join("db.sqlite").display()),
            max_connections: 1,
        };

        let error = initialize_database(&config).await.unwrap_err();
        assert!(matches!(error, DatabaseError::ConnectionError(_)));
    }
}
