//! Repository for conversation data access operations.

use crate::entities::{
    Conversation, ConversationSummary, Message, NewConversation, ParticipantPair, Party,
};
use crate::timestamp::{from_micros, from_optional_micros, now_micros};
use crate::types::DatabaseResult;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

const CONVERSATION_COLUMNS: &str = "c.id, c.job_id, c.application_id, c.client_id, c.worker_id, \
     c.created_at, c.last_message_at";

/// Repository for conversation database operations
#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, conversation_id: &str) -> DatabaseResult<Option<Conversation>> {
        let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = ?");
        let row = sqlx::query(&sql)
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    /// Find the conversation whose participant set is exactly the given pair.
    pub async fn find_between(
        &self,
        participants: &ParticipantPair,
    ) -> DatabaseResult<Option<Conversation>> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c
             WHERE c.participant_low = ? AND c.participant_high = ?"
        );
        let row = sqlx::query(&sql)
            .bind(participants.low())
            .bind(participants.high())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    /// Insert a conversation together with both participant rows.
    ///
    /// Returns [`DatabaseError::Duplicate`](crate::DatabaseError::Duplicate) when
    /// a conversation for the pair already exists; nothing is written in that case.
    pub async fn create(&self, request: &NewConversation) -> DatabaseResult<Conversation> {
        let id = cuid2::cuid();
        let now = now_micros();
        let pair = &request.participants;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO conversations
                (id, job_id, application_id, client_id, worker_id,
                 participant_low, participant_high, created_at, last_message_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(&id)
        .bind(&request.job_id)
        .bind(&request.application_id)
        .bind(&request.client_id)
        .bind(&request.worker_id)
        .bind(pair.low())
        .bind(pair.high())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for user_id in [pair.low(), pair.high()] {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, joined_at, last_read_at)
                 VALUES (?, ?, ?, NULL)",
            )
            .bind(&id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            conversation_id = %id,
            participant_low = pair.low(),
            participant_high = pair.high(),
            "created new conversation"
        );

        Ok(Conversation {
            id,
            job_id: request.job_id.clone(),
            application_id: request.application_id.clone(),
            client_id: request.client_id.clone(),
            worker_id: request.worker_id.clone(),
            created_at: from_micros(now)?,
            last_message_at: None,
        })
    }

    /// All conversations of a user, most recently active first.
    pub async fn list_for_user(&self, user_id: &str) -> DatabaseResult<Vec<ConversationSummary>> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS},
                    other.user_id AS counterpart_id,
                    u.username AS counterpart_username,
                    u.avatar_url AS counterpart_avatar_url,
                    m.id AS last_message_id,
                    m.sender_id AS last_message_sender_id,
                    m.content AS last_message_content,
                    m.sent_at AS last_message_sent_at,
                    EXISTS (
                        SELECT 1 FROM messages unread
                        WHERE unread.conversation_id = c.id
                          AND unread.sent_at > COALESCE(me.last_read_at, -1)
                    ) AS is_unread
             FROM conversation_participants me
             JOIN conversations c ON c.id = me.conversation_id
             LEFT JOIN conversation_participants other
                    ON other.conversation_id = c.id AND other.user_id != me.user_id
             LEFT JOIN users u ON u.user_id = other.user_id
             LEFT JOIN messages m ON m.id = (
                    SELECT latest.id FROM messages latest
                    WHERE latest.conversation_id = c.id
                    ORDER BY latest.sent_at DESC
                    LIMIT 1
             )
             WHERE me.user_id = ?
             ORDER BY COALESCE(c.last_message_at, c.created_at) DESC, c.id"
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(summary_from_row).collect()
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn conversation_from_row(row: &SqliteRow) -> DatabaseResult<Conversation> {
    Ok(Conversation {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        application_id: row.try_get("application_id")?,
        client_id: row.try_get("client_id")?,
        worker_id: row.try_get("worker_id")?,
        created_at: from_micros(row.try_get("created_at")?)?,
        last_message_at: from_optional_micros(row.try_get("last_message_at")?)?,
    })
}

fn summary_from_row(row: &SqliteRow) -> DatabaseResult<ConversationSummary> {
    let conversation = conversation_from_row(row)?;

    let counterpart_id: Option<String> = row.try_get("counterpart_id")?;
    let counterpart = match counterpart_id {
        Some(user_id) => {
            let username: Option<String> = row.try_get("counterpart_username")?;
            Some(Party {
                username: username.unwrap_or_else(|| user_id.clone()),
                avatar_url: row.try_get("counterpart_avatar_url")?,
                user_id,
            })
        }
        None => None,
    };

    let last_message_id: Option<String> = row.try_get("last_message_id")?;
    let last_message = match last_message_id {
        Some(id) => Some(Message {
            id,
            conversation_id: conversation.id.clone(),
            sender_id: row.try_get("last_message_sender_id")?,
            content: row.try_get("last_message_content")?,
            sent_at: from_micros(row.try_get("last_message_sent_at")?)?,
        }),
        None => None,
    };

    Ok(ConversationSummary {
        conversation,
        counterpart,
        last_message,
        is_unread: row.try_get::<i64, _>("is_unread")? != 0,
    })
}
