//! Read-only access to the marketplace directory: users, jobs and applications.

use crate::entities::Party;
use crate::types::DatabaseResult;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Repository for directory lookups owned by collaborating services
#[derive(Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, user_id: &str) -> DatabaseResult<Option<Party>> {
        let row = sqlx::query("SELECT user_id, username, avatar_url FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(party_from_row).transpose()
    }

    pub async fn exists(&self, user_id: &str) -> DatabaseResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// The client who posted the job.
    pub async fn find_job_client(&self, job_id: &str) -> DatabaseResult<Option<String>> {
        let client = sqlx::query_scalar("SELECT client_id FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    /// The worker who submitted the application.
    pub async fn find_application_worker(
        &self,
        application_id: &str,
    ) -> DatabaseResult<Option<String>> {
        let worker =
            sqlx::query_scalar("SELECT worker_id FROM applications WHERE application_id = ?")
                .bind(application_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(worker)
    }
}

fn party_from_row(row: &SqliteRow) -> DatabaseResult<Party> {
    Ok(Party {
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        avatar_url: row.try_get("avatar_url")?,
    })
}
