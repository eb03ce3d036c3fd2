//! Repository for participant data access operations.

use crate::entities::Participant;
use crate::timestamp::{from_micros, from_optional_micros, to_micros};
use crate::types::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

/// Repository for participant database operations
#[derive(Clone)]
pub struct ParticipantRepository {
    pool: SqlitePool,
}

impl ParticipantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> DatabaseResult<Option<Participant>> {
        let row = sqlx::query(
            "SELECT conversation_id, user_id, joined_at, last_read_at
             FROM conversation_participants WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(participant_from_row).transpose()
    }

    pub async fn is_participant(&self, conversation_id: &str, user_id: &str) -> DatabaseResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM conversation_participants WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    pub async fn list_for_conversation(
        &self,
        conversation_id: &str,
    ) -> DatabaseResult<Vec<Participant>> {
        let rows = sqlx::query(
            "SELECT conversation_id, user_id, joined_at, last_read_at
             FROM conversation_participants WHERE conversation_id = ? ORDER BY user_id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(participant_from_row).collect()
    }

    /// Raise the read watermark to `at`, keeping it if already later.
    ///
    /// The watermark is also raised to the conversation's `last_message_at`
    /// in the same statement. A burst of appends can push `sent_at` ahead of
    /// the wall clock, and every message committed before this call counts
    /// as read.
    ///
    /// Returns the stored watermark. Fails with [`DatabaseError::NotFound`]
    /// when the user does not participate in the conversation.
    pub async fn mark_read(
        &self,
        conversation_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> DatabaseResult<DateTime<Utc>> {
        let stored: Option<i64> = sqlx::query_scalar(
            "UPDATE conversation_participants
             SET last_read_at = MAX(
                 COALESCE(last_read_at, 0),
                 ?,
                 COALESCE(
                     (SELECT c.last_message_at FROM conversations c
                      WHERE c.id = conversation_participants.conversation_id),
                     0
                 )
             )
             WHERE conversation_id = ? AND user_id = ?
             RETURNING last_read_at",
        )
        .bind(to_micros(at))
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let stored = stored.ok_or_else(|| {
            DatabaseError::NotFound(format!(
                "participant {user_id} in conversation {conversation_id}"
            ))
        })?;

        debug!(conversation_id, user_id, last_read_at = stored, "read watermark updated");
        from_micros(stored)
    }

    /// Whether any message is newer than the participant's read watermark.
    pub async fn is_unread(&self, conversation_id: &str, user_id: &str) -> DatabaseResult<bool> {
        let unread: Option<i64> = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM messages m
                 WHERE m.conversation_id = p.conversation_id
                   AND m.sent_at > COALESCE(p.last_read_at, -1)
             )
             FROM conversation_participants p
             WHERE p.conversation_id = ? AND p.user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match unread {
            Some(flag) => Ok(flag != 0),
            None => Err(DatabaseError::NotFound(format!(
                "participant {user_id} in conversation {conversation_id}"
            ))),
        }
    }
}

fn participant_from_row(row: &SqliteRow) -> DatabaseResult<Participant> {
    Ok(Participant {
        conversation_id: row.try_get("conversation_id")?,
        user_id: row.try_get("user_id")?,
        joined_at: from_micros(row.try_get("joined_at")?)?,
        last_read_at: from_optional_micros(row.try_get("last_read_at")?)?,
    })
}
