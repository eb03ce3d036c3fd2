//! Repository for message data access operations.

use crate::entities::Message;
use crate::timestamp::{from_micros, to_micros};
use crate::types::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message and advance the conversation's activity timestamp.
    ///
    /// Both writes share one transaction. The conversation row is updated
    /// first so the transaction holds the write lock before `sent_at` is
    /// chosen, which keeps `sent_at` strictly increasing per conversation
    /// even when the wall clock stalls or steps back.
    pub async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Message> {
        let mut tx = self.pool.begin().await?;

        let sent_at: Option<i64> = sqlx::query_scalar(
            "UPDATE conversations
             SET last_message_at = MAX(?, COALESCE(last_message_at, 0) + 1)
             WHERE id = ?
             RETURNING last_message_at",
        )
        .bind(to_micros(now))
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(sent_at) = sent_at else {
            return Err(DatabaseError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        };

        let id = cuid2::cuid();
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, content, sent_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .bind(sent_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            message_id = %id,
            conversation_id,
            sender_id,
            sent_at,
            "appended message"
        );

        Ok(Message {
            id,
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            sent_at: from_micros(sent_at)?,
        })
    }

    pub async fn find_by_id(&self, message_id: &str) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(
            "SELECT id, conversation_id, sender_id, content, sent_at FROM messages WHERE id = ?",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    /// Newest-first page of messages strictly older than `before`.
    pub async fn find_before(
        &self,
        conversation_id: &str,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> DatabaseResult<Vec<Message>> {
        let rows = match before {
            Some(cursor) => {
                sqlx::query(
                    "SELECT id, conversation_id, sender_id, content, sent_at
                     FROM messages
                     WHERE conversation_id = ? AND sent_at < ?
                     ORDER BY sent_at DESC
                     LIMIT ?",
                )
                .bind(conversation_id)
                .bind(to_micros(cursor))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, conversation_id, sender_id, content, sent_at
                     FROM messages
                     WHERE conversation_id = ?
                     ORDER BY sent_at DESC
                     LIMIT ?",
                )
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(message_from_row).collect()
    }

    pub async fn count_for_conversation(&self, conversation_id: &str) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn message_from_row(row: &SqliteRow) -> DatabaseResult<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender_id: row.try_get("sender_id")?,
        content: row.try_get("content")?,
        sent_at: from_micros(row.try_get("sent_at")?)?,
    })
}
